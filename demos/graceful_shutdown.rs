//! # Example: graceful_shutdown
//!
//! A long-running service made of a worker pool, a ticker and a flush step,
//! torn down by a termination signal within a shared deadline.
//!
//! ## Flow
//! ```text
//! ticker ──► [jobs] ──► pool "render" (3 workers)
//!
//! Ctrl+C / SIGTERM ──► Orchestrator::run_until_signal
//!                        └─► sequential round (deadline 4s):
//!                              1. "ticker"  stop producing, close jobs
//!                              2. "render"  stop workers, wait for them
//!                              3. "flush"   write out state (gets what is left)
//! ```
//!
//! Events are rendered by the built-in `LogWriter` through `tracing`.
//!
//! ## Run
//! ```bash
//! RUST_LOG=flowvisor=debug cargo run --example graceful_shutdown --features logging
//! # then press Ctrl+C
//! ```

use std::sync::Arc;
use std::time::Duration;

use flowvisor::shutdown::{ShutdownMode, UnitFn, UnitRef};
use flowvisor::spawn::spawn_signal;
use flowvisor::{Config, LogWriter, Orchestrator, TaskError};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let orch = Orchestrator::builder(Config {
        workers: 3,
        shutdown_timeout: Duration::from_secs(4),
        shutdown_mode: ShutdownMode::Sequential,
        ..Config::default()
    })
    .with_subscribers(vec![Arc::new(LogWriter::new())])
    .build();

    let (jobs, work) = orch.channel::<u64>();
    let pool = Arc::new(orch.pool("render").start_detached(work, |frame| async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        if frame % 7 == 0 {
            return Err(TaskError::fail(format!("frame {frame} corrupted")));
        }
        Ok(())
    }));

    let stop_ticker = CancellationToken::new();
    let ticker_done = {
        let stop = stop_ticker.clone();
        let jobs = jobs.clone();
        spawn_signal(async move {
            let mut frame = 0u64;
            let mut every = tokio::time::interval(Duration::from_millis(50));
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = every.tick() => {
                        frame += 1;
                        if jobs.send(frame).await.is_err() {
                            break;
                        }
                    }
                }
            }
        })
    };

    let ticker: UnitRef = UnitFn::arc("ticker", move |_| {
        let stop = stop_ticker.clone();
        let done = ticker_done.clone();
        let jobs = jobs.clone();
        async move {
            stop.cancel();
            done.fired().await;
            if !jobs.is_closed() {
                jobs.close();
            }
            Ok::<_, TaskError>(())
        }
    });

    let flush: UnitRef = {
        let pool = pool.clone();
        UnitFn::arc("flush", move |deadline| {
            let pool = pool.clone();
            async move {
                tracing::info!(
                    processed = pool.processed(),
                    failed = pool.failed(),
                    budget_ms = deadline.remaining().as_millis() as u64,
                    "flushing state"
                );
                Ok::<_, TaskError>(())
            }
        })
    };

    tracing::info!("running; press Ctrl+C to stop");
    let report = orch.run_until_signal(vec![ticker, pool as UnitRef, flush]).await?;

    for unit in &report.units {
        tracing::info!(
            unit = %unit.name,
            status = ?unit.status,
            elapsed = ?unit.elapsed,
            "unit report"
        );
    }
    orch.close().await;
    report.into_result()?;
    Ok(())
}
