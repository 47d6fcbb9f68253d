//! # Runtime events emitted by pools and the shutdown controller.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Worker events**: pool worker lifecycle and per-task failures
//! - **Shutdown events**: per-unit progress and the round outcome
//! - **Subscriber events**: overflow and panics inside subscriber workers
//!
//! The [`Event`] struct carries metadata such as timestamps, component name,
//! worker index, reasons and durations.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use flowvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_name("resize-pool")
//!     .with_worker(3)
//!     .with_reason("decode error")
//!     .with_timeout(Duration::from_secs(5));
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.name.as_deref(), Some("resize-pool"));
//! assert_eq!(ev.worker, Some(3));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Worker events ===
    /// A pool worker started its loop.
    ///
    /// Sets: `name` (pool), `worker`.
    WorkerStarted,

    /// A worker loop exited (input exhausted or stop observed).
    ///
    /// Sets: `name`, `worker`, `count` (tasks processed by this worker).
    WorkerStopped,

    /// Applying one task failed; the worker continues.
    ///
    /// Sets: `name`, `worker`, `reason`.
    TaskFailed,

    /// One task exceeded the per-task timeout; the worker continues.
    ///
    /// Sets: `name`, `worker`, `timeout_ms`.
    TaskTimedOut,

    /// Stop was requested on a pool.
    ///
    /// Sets: `name`.
    PoolStopRequested,

    /// Every pool worker exited and the results channel was closed.
    ///
    /// Sets: `name`, `count` (tasks processed), `elapsed_ms`.
    PoolDrained,

    // === Shutdown events ===
    /// Shutdown requested (OS signal observed or explicit call).
    ShutdownRequested,

    /// A unit's shutdown procedure is starting.
    ///
    /// Sets: `name` (unit), `timeout_ms` (remaining budget).
    UnitStarting,

    /// A unit finished its shutdown successfully.
    ///
    /// Sets: `name`, `elapsed_ms`.
    UnitStopped,

    /// A unit's shutdown returned an error.
    ///
    /// Sets: `name`, `reason`, `elapsed_ms`.
    UnitFailed,

    /// A unit did not finish before the round deadline.
    ///
    /// Sets: `name`, `timeout_ms`.
    UnitTimedOut,

    /// A unit was never attempted because the budget was exhausted.
    ///
    /// Sets: `name`.
    UnitSkipped,

    /// Round finished: every unit completed in time without error.
    ///
    /// Sets: `elapsed_ms`, `count` (units).
    RoundCompleted,

    /// Round hit its deadline.
    ///
    /// Sets: `elapsed_ms`, `timeout_ms`, `count` (units not finished).
    RoundTimedOut,

    /// Round finished in time but some units failed.
    ///
    /// Sets: `elapsed_ms`, `count` (failed units).
    RoundPartialFailure,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `name` (subscriber), `reason` (panic info).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `name` (subscriber), `reason`.
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Pool, unit or subscriber name.
    pub name: Option<Arc<str>>,
    /// Worker index inside a pool.
    pub worker: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Timeout or remaining budget in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Elapsed time in milliseconds (compact).
    pub elapsed_ms: Option<u32>,
    /// Kind-specific counter (tasks processed, units failed, ...).
    pub count: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            name: None,
            worker: None,
            reason: None,
            timeout_ms: None,
            elapsed_ms: None,
            count: None,
        }
    }

    /// Attaches a component name.
    #[inline]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches a worker index.
    #[inline]
    pub fn with_worker(mut self, worker: usize) -> Self {
        self.worker = Some(worker.min(u32::MAX as usize) as u32);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a timeout / remaining budget (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches an elapsed duration (stored as milliseconds).
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        self.elapsed_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a counter.
    #[inline]
    pub fn with_count(mut self, n: u64) -> Self {
        self.count = Some(n);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_name(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_name(subscriber)
            .with_reason(info)
    }

    /// Returns `true` for round outcome events.
    #[inline]
    pub fn is_round_outcome(&self) -> bool {
        matches!(
            self.kind,
            EventKind::RoundCompleted | EventKind::RoundTimedOut | EventKind::RoundPartialFailure
        )
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
