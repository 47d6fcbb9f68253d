//! # LogWriter: renders events through `tracing`.
//!
//! Worker and unit failures are logged at `warn`, round timeouts and subscriber
//! trouble at `error`, everything else at `info` (`debug` for per-worker chatter).
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  flowvisor: unit starting unit="db" budget_ms=5000
//! WARN  flowvisor: task failed pool="resize" worker=2 reason="execution failed: decode"
//! ERROR flowvisor: shutdown round timed out elapsed_ms=3000 unfinished=1
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let name = e.name.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::WorkerStarted => {
                debug!(target: "flowvisor", pool = name, worker = e.worker, "worker started");
            }
            EventKind::WorkerStopped => {
                debug!(target: "flowvisor", pool = name, worker = e.worker, handled = e.count, "worker stopped");
            }
            EventKind::TaskFailed => {
                warn!(target: "flowvisor", pool = name, worker = e.worker, reason, "task failed");
            }
            EventKind::TaskTimedOut => {
                warn!(target: "flowvisor", pool = name, worker = e.worker, timeout_ms = e.timeout_ms, "task timed out");
            }
            EventKind::PoolStopRequested => {
                info!(target: "flowvisor", pool = name, "pool stop requested");
            }
            EventKind::PoolDrained => {
                info!(target: "flowvisor", pool = name, processed = e.count, elapsed_ms = e.elapsed_ms, "pool drained");
            }
            EventKind::ShutdownRequested => {
                info!(target: "flowvisor", "shutdown requested");
            }
            EventKind::UnitStarting => {
                info!(target: "flowvisor", unit = name, budget_ms = e.timeout_ms, "unit starting");
            }
            EventKind::UnitStopped => {
                info!(target: "flowvisor", unit = name, elapsed_ms = e.elapsed_ms, "unit stopped");
            }
            EventKind::UnitFailed => {
                warn!(target: "flowvisor", unit = name, reason, elapsed_ms = e.elapsed_ms, "unit failed");
            }
            EventKind::UnitTimedOut => {
                warn!(target: "flowvisor", unit = name, "unit timed out");
            }
            EventKind::UnitSkipped => {
                warn!(target: "flowvisor", unit = name, "unit skipped, no budget left");
            }
            EventKind::RoundCompleted => {
                info!(target: "flowvisor", elapsed_ms = e.elapsed_ms, units = e.count, "shutdown round completed");
            }
            EventKind::RoundTimedOut => {
                error!(target: "flowvisor", elapsed_ms = e.elapsed_ms, timeout_ms = e.timeout_ms, unfinished = e.count, "shutdown round timed out");
            }
            EventKind::RoundPartialFailure => {
                warn!(target: "flowvisor", elapsed_ms = e.elapsed_ms, failed = e.count, "shutdown round finished with failures");
            }
            EventKind::SubscriberOverflow => {
                error!(target: "flowvisor", subscriber = name, reason, "subscriber dropped an event");
            }
            EventKind::SubscriberPanicked => {
                error!(target: "flowvisor", subscriber = name, info = reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
