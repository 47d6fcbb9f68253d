//! # Example: producer_consumer
//!
//! Several producers feed one bounded work channel; a worker pool consumes it.
//!
//! Shows how to:
//! - Share one [`Sender`](flowvisor::channel::Sender) between producers and close it once.
//! - Run a pool through the [`Orchestrator`] so its events reach a custom subscriber.
//! - Read per-task results, failures included.
//!
//! ## Flow
//! ```text
//! producer 0..3 ──► [work, cap 8] ──► pool "hash" (4 workers) ──► [results] ──► main
//!                                           │
//!                                           └─► Bus ──► ConsoleSubscriber
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example producer_consumer
//! ```

use std::time::Duration;

use flowvisor::spawn::{JoinBarrier, spawn_signal};
use flowvisor::{Config, Event, EventKind, Orchestrator, Subscribe, TaskError};

/// Prints pool lifecycle events.
struct ConsoleSubscriber;

#[async_trait::async_trait]
impl Subscribe for ConsoleSubscriber {
    async fn on_event(&self, ev: &Event) {
        let name = ev.name.as_deref().unwrap_or("<none>");
        match ev.kind {
            EventKind::WorkerStarted => {
                println!("[sub] worker up:   pool={name} worker={:?}", ev.worker)
            }
            EventKind::WorkerStopped => println!(
                "[sub] worker down: pool={name} worker={:?} handled={:?}",
                ev.worker, ev.count
            ),
            EventKind::TaskFailed => println!(
                "[sub] task failed: pool={name} reason={}",
                ev.reason.as_deref().unwrap_or("")
            ),
            EventKind::PoolDrained => {
                println!("[sub] drained:     pool={name} processed={:?}", ev.count)
            }
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

fn checksum(payload: &str) -> Result<u32, TaskError> {
    if payload.ends_with("13") {
        return Err(TaskError::fail(format!("unlucky payload {payload}")));
    }
    Ok(payload.bytes().fold(17u32, |h, b| h.wrapping_mul(31).wrapping_add(b.into())))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let orch = Orchestrator::builder(Config {
        channel_capacity: 8,
        workers: 4,
        ..Config::default()
    })
    .with_subscribers(vec![std::sync::Arc::new(ConsoleSubscriber)])
    .build();

    let (work_tx, work_rx) = orch.channel::<String>();
    let (pool, results) = orch.pool("hash").start(work_rx, |payload: String| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        checksum(&payload).map(|sum| (payload, sum))
    });

    // Producers share the sender; the barrier tells main when all of them are done.
    let producers = JoinBarrier::new(3);
    for id in 0..3 {
        let tx = work_tx.clone();
        let guard = producers.guard();
        spawn_signal(async move {
            let _guard = guard;
            for n in 0..20 {
                if tx.send(format!("p{id}-item{n}")).await.is_err() {
                    return;
                }
            }
        });
    }

    // Single designated closer: main closes once every producer returned.
    let closer = {
        let done = producers.signal();
        spawn_signal(async move {
            done.fired().await;
            work_tx.close();
        })
    };

    let (mut ok, mut failed) = (0, 0);
    while let Some(outcome) = results.recv().await {
        match outcome.result {
            Ok((payload, sum)) => {
                ok += 1;
                println!("worker {} -> {payload}: {sum:08x}", outcome.worker);
            }
            Err(e) => {
                failed += 1;
                println!("worker {} -> error: {e}", outcome.worker);
            }
        }
    }
    closer.fired().await;

    let stats = pool.join().await;
    println!("\nprocessed={} ok={ok} failed={failed}", stats.processed);
    assert_eq!(stats.processed, 60);
    assert_eq!(stats.failed, failed);

    orch.close().await;
    Ok(())
}
