//! # Orchestrator: shared configuration, event delivery and shutdown rounds.
//!
//! The [`Orchestrator`] owns the event [`Bus`] and a listener that fans events out
//! to the configured subscribers. It hands out channels, pool builders and
//! shutdown controllers preset from [`Config`], and can drive a shutdown round
//! when the process receives a termination signal.
//!
//! ## Architecture
//! ```text
//! Orchestrator::builder(cfg).with_subscribers(subs).build()
//!      │
//!      ├─► channel()      bounded(cfg.channel_capacity)
//!      ├─► pool(name)     PoolBuilder{ workers, output_capacity, task_timeout, bus }
//!      ├─► controller()   ShutdownController{ cfg.shutdown_mode, bus }
//!      │
//!      └─► listener: Bus.subscribe() ─► SubscriberSet::emit(&Event)
//!
//! Shutdown path:
//!   wait_for_termination() / trigger future
//!        └─► Bus.publish(ShutdownRequested)
//!        └─► controller.run(cfg.shutdown_timeout)
//!               └─► RoundCompleted | RoundTimedOut | RoundPartialFailure
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use flowvisor::{Config, Orchestrator, TaskError};
//! use flowvisor::shutdown::{RoundOutcome, UnitFn, UnitRef};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let orch = Orchestrator::builder(Config::default()).build();
//!
//! let (tx, rx) = orch.channel::<u32>();
//! let (pool, results) = orch
//!     .pool("double")
//!     .workers(2)
//!     .start(rx, |n| async move { Ok::<_, TaskError>(n * 2) });
//!
//! tx.send(21).await.unwrap();
//! assert_eq!(results.recv().await.unwrap().result, Ok(42));
//!
//! let cache = UnitFn::arc("cache", |_| async { Ok::<_, TaskError>(()) });
//! let report = orch
//!     .shutdown(vec![Arc::new(pool) as UnitRef, cache], Duration::from_secs(1))
//!     .await;
//! assert_eq!(report.outcome, RoundOutcome::Completed);
//! orch.close().await;
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::builder::OrchestratorBuilder;
use super::config::Config;
use super::signals::wait_for_termination;
use crate::channel::{Receiver, Sender, Signal, bounded};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::pool::{PoolBuilder, WorkerPool};
use crate::shutdown::{ShutdownController, ShutdownReport, UnitRef};

/// Entry point tying configuration, events and shutdown together.
pub struct Orchestrator {
    cfg: Config,
    bus: Bus,
    token: CancellationToken,
    listener: Signal,
}

impl Orchestrator {
    pub(super) fn new_internal(
        cfg: Config,
        bus: Bus,
        token: CancellationToken,
        listener: Signal,
    ) -> Self {
        Self {
            cfg,
            bus,
            token,
            listener,
        }
    }

    /// Starts building an orchestrator from `cfg`.
    pub fn builder(cfg: Config) -> OrchestratorBuilder {
        OrchestratorBuilder::new(cfg)
    }

    /// Configuration this orchestrator was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Event bus shared by every component created here.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Bounded channel with `cfg.channel_capacity`.
    pub fn channel<T>(&self) -> (Sender<T>, Receiver<T>) {
        bounded(self.cfg.channel_capacity)
    }

    /// Pool builder preset with worker count, result capacity, task timeout and bus.
    pub fn pool(&self, name: impl Into<Arc<str>>) -> PoolBuilder {
        WorkerPool::builder(name)
            .workers(self.cfg.worker_count())
            .output_capacity(self.cfg.output_capacity_clamped())
            .task_timeout(self.cfg.task_timeout)
            .bus(self.bus.clone())
    }

    /// Fresh shutdown controller in `cfg.shutdown_mode`, publishing on the bus.
    pub fn controller(&self) -> ShutdownController {
        ShutdownController::new(self.cfg.shutdown_mode).with_bus(self.bus.clone())
    }

    /// Runs one shutdown round over `units` with a deadline `timeout` from now.
    pub async fn shutdown(&self, units: Vec<UnitRef>, timeout: Duration) -> ShutdownReport {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.round(units, timeout).await
    }

    /// Waits for `trigger`, then runs a round with `cfg.shutdown_timeout`.
    pub async fn run_until<F>(&self, trigger: F, units: Vec<UnitRef>) -> ShutdownReport
    where
        F: Future<Output = ()>,
    {
        trigger.await;
        self.shutdown(units, self.cfg.shutdown_timeout).await
    }

    /// Waits for a termination signal, then runs a round with `cfg.shutdown_timeout`.
    ///
    /// Returns [`RuntimeError::Signal`] if the signal listeners cannot be registered.
    pub async fn run_until_signal(
        &self,
        units: Vec<UnitRef>,
    ) -> Result<ShutdownReport, RuntimeError> {
        let which = wait_for_termination().await?;
        self.bus.publish(
            Event::new(EventKind::ShutdownRequested).with_reason(which.as_label()),
        );
        Ok(self.round(units, self.cfg.shutdown_timeout).await)
    }

    /// Stops the event listener after delivering what is already on the bus.
    pub async fn close(&self) {
        self.token.cancel();
        self.listener.fired().await;
    }

    async fn round(&self, units: Vec<UnitRef>, timeout: Duration) -> ShutdownReport {
        let controller = self.controller();
        for unit in units {
            controller.register(unit);
        }
        controller.run(timeout).await
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
