use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use flowvisor::TaskError;
use flowvisor::channel::bounded;
use flowvisor::pool::{Sequence, WorkerPool};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_task_is_processed_exactly_once() -> anyhow::Result<()> {
    const TASKS: u64 = 500;

    let (tx, rx) = bounded::<u64>(8);
    let (pool, results) = WorkerPool::builder("square")
        .workers(6)
        .output_capacity(8)
        .start(rx, |n| async move { Ok::<_, TaskError>(n * n) });

    let producer = tokio::spawn(async move {
        for n in 0..TASKS {
            tx.send(n).await?;
        }
        tx.close();
        Ok::<_, flowvisor::SendError<u64>>(())
    });

    let mut seen = HashSet::new();
    let mut workers = HashSet::new();
    while let Some(out) = results.recv().await {
        workers.insert(out.worker);
        assert!(seen.insert(out.result?), "duplicate result");
    }
    producer.await??;

    let expected: HashSet<u64> = (0..TASKS).map(|n| n * n).collect();
    assert_eq!(seen, expected);
    assert!(workers.iter().all(|w| *w < 6));

    let done = pool.done();
    let stats = pool.join().await;
    assert!(done.is_fired());
    assert_eq!(stats.workers, 6);
    assert_eq!(stats.processed, TASKS);
    assert_eq!(stats.failed, 0);
    Ok(())
}

#[tokio::test]
async fn join_fires_only_after_every_worker_exits() {
    let (tx, rx) = bounded::<u32>(4);
    let pool = WorkerPool::builder("slow")
        .workers(3)
        .start_detached(rx, |ms| async move {
            tokio::time::sleep(Duration::from_millis(ms.into())).await;
            Ok::<_, TaskError>(())
        });

    for ms in [5, 30, 60] {
        tx.send(ms).await.unwrap();
    }
    tx.close();

    let done = pool.done();
    assert!(!done.is_fired());
    let stats = pool.join().await;
    assert_eq!(stats.processed, 3);
    assert!(done.is_fired());
}

#[tokio::test]
async fn failing_tasks_are_reported_per_task() {
    let (tx, rx) = bounded::<i32>(16);
    let (pool, results) = WorkerPool::builder("checked")
        .workers(2)
        .start(rx, |n| async move {
            match n {
                n if n < 0 => Err(TaskError::fail(format!("negative {n}"))),
                0 => panic!("zero"),
                n => Ok(n),
            }
        });

    for n in [1, -1, 0, 2, -3, 4] {
        tx.send(n).await.unwrap();
    }
    tx.close();

    let mut ok = Vec::new();
    let mut errors = Vec::new();
    while let Some(out) = results.recv().await {
        match out.result {
            Ok(n) => ok.push(n),
            Err(e) => errors.push(e.as_label()),
        }
    }
    ok.sort();
    errors.sort();
    assert_eq!(ok, vec![1, 2, 4]);
    assert_eq!(errors, vec!["task_failed", "task_failed", "task_panicked"]);

    let stats = pool.join().await;
    assert_eq!(stats.processed, 6);
    assert_eq!(stats.failed, 3);
}

#[tokio::test]
async fn stop_ends_a_pool_fed_by_an_open_channel() {
    let hits = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = bounded::<()>(4);
    let pool = {
        let hits = hits.clone();
        WorkerPool::builder("idle")
            .workers(4)
            .start_detached(rx, move |()| {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TaskError>(())
                }
            })
    };

    tx.send(()).await.unwrap();
    pool.stop();
    pool.stop();
    assert!(pool.is_stopped());
    pool.join_timeout(Duration::from_secs(5)).await.unwrap();
    assert_eq!(pool.active_workers(), 0);
    assert!(hits.load(Ordering::SeqCst) <= 1);
    assert!(!tx.is_closed());
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_tasks_that_are_still_running() {
    let running = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = bounded::<u64>(2);
    let pool = {
        let running = running.clone();
        WorkerPool::builder("long")
            .workers(2)
            .start_detached(rx, move |secs| {
                let running = running.clone();
                async move {
                    running.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                    Ok::<_, TaskError>(())
                }
            })
    };
    tx.send(3600).await.unwrap();
    tx.send(3600).await.unwrap();
    while running.load(Ordering::SeqCst) < 2 {
        tokio::task::yield_now().await;
    }

    pool.stop();
    pool.join_timeout(Duration::from_secs(30)).await.unwrap();
    let stats = pool.join().await;
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.failed, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sequence_hands_out_gap_free_numbers() {
    let seq = Sequence::start(100, 4);
    let mut tasks = Vec::new();
    for _ in 0..10 {
        let seq = seq.clone();
        tasks.push(tokio::spawn(async move {
            let mut got = Vec::new();
            for _ in 0..20 {
                got.push(seq.next().await.unwrap());
            }
            got
        }));
    }

    let mut all = Vec::new();
    for t in tasks {
        all.extend(t.await.unwrap());
    }
    all.sort_unstable();
    assert_eq!(all, (100..300).collect::<Vec<_>>());

    seq.close();
    seq.done().fired().await;
    assert_eq!(seq.next().await, None);
}
