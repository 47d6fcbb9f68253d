//! # flowvisor
//!
//! **Flowvisor** is a toolkit of message-passing primitives for running many
//! units of work inside one process: bounded channels, worker pools,
//! fan-out/fan-in pipelines, spawn/join helpers and a supervised shutdown
//! controller that tears everything down under a deadline.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   producers                                                   consumers
//!      │                                                            ▲
//!      ▼                                                            │
//! ┌──────────────┐   ┌──────────────────────────┐   ┌──────────────┴──┐
//! │ BoundedChan  │──►│ WorkerPool / Stage(s)    │──►│ BoundedChan     │
//! │ (work, cap C)│   │ N workers, JoinBarrier   │   │ (results)       │
//! └──────────────┘   └────────────┬─────────────┘   └─────────────────┘
//!                                 │ publish(Event)
//!                                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                     Bus (broadcast channel)                       │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       Orchestrator listener ──► SubscriberSet ──► LogWriter, ...
//!
//! Shutdown (out of band):
//!   termination signal ──► ShutdownController ──┬─► unit 0.shutdown(deadline)
//!                          (parallel|sequential)├─► unit 1.shutdown(deadline)
//!                                               └─► ... ──► ShutdownReport
//! ```
//!
//! ### Round lifecycle
//! ```text
//! Pending ──run(timeout)──► Running ──┬──► Completed        (all units Ok in time)
//!                                     ├──► PartialFailure   (in time, some Err)
//!                                     └──► TimedOut         (deadline first)
//! ```
//!
//! ## Features
//! | Area               | Description                                              | Key types / functions                          |
//! |--------------------|----------------------------------------------------------|------------------------------------------------|
//! | **Channels**       | Bounded MPMC FIFO with one-shot close; completion signals | [`channel::bounded`], [`channel::Signal`]      |
//! | **Spawn/Join**     | Signal, report and group spawns; join barriers            | [`spawn::spawn_report`], [`spawn::spawn_group`] |
//! | **Pools**          | N workers over one work channel, per-task error capture   | [`pool::WorkerPool`], [`pool::Sequence`]       |
//! | **Pipelines**      | Source, transform, fan-out, fan-in, first-success race    | [`pipeline::Stage`], [`pipeline::race`]        |
//! | **Shutdown**       | Deadline-bounded parallel/sequential teardown             | [`shutdown::ShutdownController`]               |
//! | **Subscriber API** | Hook into pool and shutdown events                        | [`Subscribe`], [`SubscriberSet`]               |
//! | **Errors**         | Typed errors for tasks, channels and the runtime          | [`TaskError`], [`RuntimeError`]                |
//! | **Configuration**  | Centralized runtime settings                              | [`Config`], [`Orchestrator`]                   |
//!
//! ## Optional features
//! - `logging`: exports a built-in [`LogWriter`] that renders events through `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use flowvisor::{TaskError, channel::bounded, pool::WorkerPool};
//! use flowvisor::shutdown::{RoundOutcome, ShutdownController, ShutdownMode};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let (jobs, work) = bounded::<String>(16);
//!     let (pool, results) = WorkerPool::builder("upper")
//!         .workers(4)
//!         .start(work, |s| async move { Ok::<_, TaskError>(s.to_uppercase()) });
//!
//!     for word in ["tick", "tock"] {
//!         jobs.send(word.to_string()).await.unwrap();
//!     }
//!     jobs.close();
//!
//!     let mut got = Vec::new();
//!     while let Some(out) = results.recv().await {
//!         got.push(out.result.unwrap());
//!     }
//!     got.sort();
//!     assert_eq!(got, ["TICK", "TOCK"]);
//!
//!     let ctl = ShutdownController::new(ShutdownMode::Parallel);
//!     ctl.register(Arc::new(pool));
//!     let report = ctl.run(Duration::from_secs(1)).await;
//!     assert_eq!(report.outcome, RoundOutcome::Completed);
//! }
//! ```
mod core;
mod error;

pub mod channel;
pub mod events;
pub mod pipeline;
pub mod pool;
pub mod shutdown;
pub mod spawn;
mod subscribers;

// ---- Public re-exports ----

pub use crate::core::{Config, Orchestrator, OrchestratorBuilder, TerminationSignal};
pub use error::{
    Elapsed, PipelineError, RaceError, RuntimeError, SendError, TaskError, TryRecvError,
    TrySendError,
};
pub use events::{Bus, Event, EventKind};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a built-in tracing subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
