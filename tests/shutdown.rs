use std::sync::Arc;
use std::time::Duration;

use flowvisor::channel::bounded;
use flowvisor::pool::WorkerPool;
use flowvisor::shutdown::{
    RoundOutcome, RoundState, ShutdownController, ShutdownMode, UnitFn, UnitRef, UnitStatus,
};
use flowvisor::{Config, Orchestrator, RuntimeError, TaskError};
use tokio::time::Instant;

fn sleeper(name: &'static str, secs: u64) -> UnitRef {
    UnitFn::arc(name, move |_| async move {
        tokio::time::sleep(Duration::from_secs(secs)).await;
        Ok::<_, TaskError>(())
    })
}

#[tokio::test(start_paused = true)]
async fn sequential_round_runs_units_in_order() {
    let ctl = ShutdownController::new(ShutdownMode::Sequential);
    for name in ["db", "cache", "http"] {
        ctl.register(sleeper(name, 1));
    }
    assert_eq!(ctl.units(), vec!["db", "cache", "http"]);
    assert_eq!(ctl.state(), RoundState::Pending);

    let started = Instant::now();
    let report = ctl.run(Duration::from_secs(5)).await;

    assert_eq!(report.outcome, RoundOutcome::Completed);
    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert!(report.units.iter().all(|u| u.status == UnitStatus::Completed));
    assert_eq!(ctl.state(), RoundState::Completed);
    assert!(report.into_result().is_ok());
}

#[tokio::test(start_paused = true)]
async fn sequential_round_skips_units_after_the_deadline() {
    let ctl = ShutdownController::new(ShutdownMode::Sequential);
    for name in ["db", "cache", "http"] {
        ctl.register(sleeper(name, 1));
    }

    let report = ctl.run(Duration::from_secs(2)).await;

    assert_eq!(report.outcome, RoundOutcome::TimedOut);
    assert_eq!(report.unit("db").unwrap().status, UnitStatus::Completed);
    assert_eq!(report.unit("http").unwrap().status, UnitStatus::Skipped);
    assert!(report.unfinished().any(|u| u.name == "http"));
    assert_eq!(ctl.state(), RoundState::TimedOut);

    match report.into_result() {
        Err(RuntimeError::ShutdownTimedOut { timeout, stuck }) => {
            assert_eq!(timeout, Duration::from_secs(2));
            assert!(stuck.contains(&"http".to_string()));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn parallel_round_returns_at_the_deadline() {
    let ctl = ShutdownController::new(ShutdownMode::Parallel);
    ctl.register(sleeper("fast", 1));
    ctl.register(sleeper("stuck", 10));

    let started = Instant::now();
    let report = ctl.run(Duration::from_secs(3)).await;

    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert_eq!(report.outcome, RoundOutcome::TimedOut);
    assert_eq!(report.unit("fast").unwrap().status, UnitStatus::Completed);
    assert_eq!(
        report.unit("fast").unwrap().elapsed,
        Some(Duration::from_secs(1))
    );
    assert_eq!(report.unit("stuck").unwrap().status, UnitStatus::Abandoned);

    let late = ctl.join_abandoned(Duration::from_secs(10)).await;
    assert_eq!(late.len(), 1);
    assert_eq!(late[0].status, UnitStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn empty_round_completes_immediately() {
    let ctl = ShutdownController::new(ShutdownMode::Parallel);
    let started = Instant::now();
    let report = ctl.run(Duration::from_secs(1)).await;
    assert_eq!(report.outcome, RoundOutcome::Completed);
    assert!(report.units.is_empty());
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn orchestrator_stops_a_pool_and_custom_units() {
    let orch = Orchestrator::builder(Config {
        workers: 3,
        shutdown_timeout: Duration::from_secs(5),
        ..Config::default()
    })
    .build();

    let (tx, rx) = orch.channel::<u32>();
    let pool = Arc::new(
        orch.pool("ingest")
            .start_detached(rx, |_| async { Ok::<_, TaskError>(()) }),
    );
    for n in 0..10 {
        tx.send(n).await.unwrap();
    }

    let flushed = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flush = {
        let flushed = flushed.clone();
        UnitFn::arc("flush", move |deadline| {
            let flushed = flushed.clone();
            async move {
                assert!(!deadline.is_expired());
                flushed.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok::<_, TaskError>(())
            }
        })
    };

    let report = orch
        .run_until(tokio::task::yield_now(), vec![pool.clone() as UnitRef, flush])
        .await;

    assert!(report.is_completed());
    assert!(pool.is_stopped());
    assert_eq!(pool.active_workers(), 0);
    assert!(flushed.load(std::sync::atomic::Ordering::SeqCst));
    orch.close().await;
}

#[tokio::test]
async fn failing_units_yield_partial_failure() {
    let ctl = ShutdownController::new(ShutdownMode::Parallel);
    ctl.register(UnitFn::arc("broken", |_| async {
        Err::<(), _>(TaskError::fail("disk gone"))
    }));
    ctl.register(sleeper("fine", 0));

    let report = ctl.run(Duration::from_secs(1)).await;
    assert_eq!(report.outcome, RoundOutcome::PartialFailure);
    let failed: Vec<_> = report.failed().collect();
    assert_eq!(failed, vec![("broken", "execution failed: disk gone")]);

    // A pool that already drained is still a valid unit.
    let (jobs, rx) = bounded::<()>(1);
    jobs.close();
    let pool = WorkerPool::builder("drained")
        .start_detached(rx, |()| async { Ok::<_, TaskError>(()) });
    pool.join_timeout(Duration::from_secs(1)).await.unwrap();
    let ctl = ShutdownController::new(ShutdownMode::Sequential);
    ctl.register(Arc::new(pool));
    assert!(ctl.run(Duration::from_secs(1)).await.is_completed());
}
