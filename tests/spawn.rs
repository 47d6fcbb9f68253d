use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use flowvisor::TaskError;
use flowvisor::spawn::{JoinBarrier, spawn_group, spawn_group_with_stop, spawn_report};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stopped_group_drains_jobs_and_reaches_zero() -> anyhow::Result<()> {
    let sum = Arc::new(AtomicUsize::new(0));
    let (jobs, group) = {
        let sum = sum.clone();
        spawn_group_with_stop(4, 8, move |_worker, n: usize| {
            let sum = sum.clone();
            async move {
                if n % 10 == 0 {
                    return Err(TaskError::fail("multiple of ten"));
                }
                sum.fetch_add(n, Ordering::SeqCst);
                Ok(())
            }
        })
    };

    for n in 1..=100 {
        jobs.send(n).await?;
    }
    assert_eq!(group.active(), 4);

    let done = group.done();
    let handle = group.stop();
    handle.wait_timeout(Duration::from_secs(5)).await?;

    assert!(done.is_fired());
    assert_eq!(handle.active(), 0);
    let skipped: usize = (10..=100).step_by(10).sum();
    assert_eq!(sum.load(Ordering::SeqCst), 5050 - skipped);
    assert!(jobs.send(0).await.is_err());
    Ok(())
}

#[tokio::test]
async fn group_reports_every_worker_result() {
    let group = spawn_group(3, |i| async move {
        match i {
            0 => Ok(()),
            1 => Err(TaskError::fail("one")),
            _ => panic!("two"),
        }
    });
    let results = group.join().await;
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert_eq!(results[1], Err(TaskError::fail("one")));
    assert_eq!(results[2].as_ref().unwrap_err().as_label(), "task_panicked");
}

#[tokio::test]
async fn barrier_signal_fires_at_zero() {
    let barrier = JoinBarrier::new(3);
    let signal = barrier.signal();

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let guard = barrier.guard();
            spawn_report(async move {
                let _guard = guard;
                tokio::task::yield_now().await;
                Ok::<_, TaskError>(())
            })
        })
        .collect();

    barrier.wait().await;
    assert!(signal.is_fired());
    assert_eq!(barrier.count(), 0);
    for h in handles {
        h.join().await.unwrap();
    }
}

#[tokio::test]
async fn aborted_worker_reports_cancellation() {
    let handle = spawn_report(async {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok::<_, TaskError>(())
    });
    let done = handle.done();
    handle.abort();
    assert_eq!(handle.join().await, Err(TaskError::Canceled));
    assert!(done.is_fired());
}
