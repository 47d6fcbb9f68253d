//! Error types used by the flowvisor primitives.
//!
//! This module defines the main error enums:
//!
//! - [`TaskError`]: errors raised while applying one unit of work (a task, a stage
//!   transform, a shutdown unit). Recorded per task, never fatal to a worker.
//! - [`RuntimeError`]: errors raised by the orchestration layer itself, such as a
//!   shutdown round that exceeded its deadline.
//! - [`SendError`], [`TrySendError`], [`TryRecvError`]: channel contract failures.
//! - [`PipelineError`]: element failures collected from a pipeline chain.
//! - [`RaceError`]: outcome of [`race`](crate::pipeline::race) when no candidate won.
//! - [`Elapsed`]: a bounded wait ran out of time.
//!
//! All enums provide `as_label` (stable snake_case label for logs/metrics).
//!
//! Usage errors (closing a closed channel, decrementing a barrier below zero,
//! re-running a shutdown round) are programming errors and panic instead of
//! returning one of these types.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the orchestration runtime.
///
/// These represent failures of the coordination layer itself,
/// such as a shutdown round exceeding its deadline.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The shutdown round exceeded its deadline; `stuck` lists the units that did not finish.
    #[error("shutdown timeout {timeout:?} exceeded; stuck: {stuck:?}")]
    ShutdownTimedOut {
        /// The configured round deadline.
        timeout: Duration,
        /// Names of the units that were abandoned or skipped.
        stuck: Vec<String>,
    },

    /// Every unit finished in time but some of them reported an error.
    #[error("shutdown finished with failures: {failed:?}")]
    PartialFailure {
        /// `(unit name, error message)` for every failed unit.
        failed: Vec<(String, String)>,
    },

    /// Registering OS signal listeners failed.
    #[error("signal listener failed: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use flowvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::ShutdownTimedOut { timeout: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_shutdown_timed_out");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::ShutdownTimedOut { .. } => "runtime_shutdown_timed_out",
            RuntimeError::PartialFailure { .. } => "runtime_partial_failure",
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}

/// # Errors produced while applying one unit of work.
///
/// A `TaskError` is always scoped to the task that produced it: workers record it
/// and move on to the next task.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Execution exceeded its time bound.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// Execution failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The work panicked; the panic was caught at the worker boundary.
    #[error("panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// Execution observed a cancellation signal and unwound.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use flowvisor::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Builds a [`TaskError::Panicked`] from a `catch_unwind` payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let info = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        TaskError::Panicked { info }
    }
}

/// Returned by [`Sender::send`](crate::channel::Sender::send) when the value could not be delivered.
///
/// The channel is closed, or every receiver is gone. The undelivered value is handed back.
#[derive(Error, PartialEq, Eq, Clone, Copy)]
#[error("sending on a closed channel")]
pub struct SendError<T>(pub T);

impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendError").finish_non_exhaustive()
    }
}

impl<T> SendError<T> {
    /// Returns the value that was not sent.
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Returned by [`Sender::try_send`](crate::channel::Sender::try_send).
#[derive(Error, PartialEq, Eq, Clone, Copy)]
pub enum TrySendError<T> {
    /// No free slot (or, for a rendezvous channel, no receiver waiting).
    #[error("channel full")]
    Full(T),
    /// The channel is closed or has no receivers.
    #[error("channel closed")]
    Closed(T),
}

impl<T> fmt::Debug for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySendError::Full(_) => f.write_str("Full(..)"),
            TrySendError::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

impl<T> TrySendError<T> {
    /// Returns the value that was not sent.
    pub fn into_inner(self) -> T {
        match self {
            TrySendError::Full(v) | TrySendError::Closed(v) => v,
        }
    }
}

/// Returned by [`Receiver::try_recv`](crate::channel::Receiver::try_recv).
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum TryRecvError {
    /// Nothing buffered right now, but the channel is still open.
    #[error("channel empty")]
    Empty,
    /// Closed and fully drained.
    #[error("channel closed")]
    Closed,
}

/// A bounded wait ran out of time before its signal fired.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
#[error("deadline elapsed")]
pub struct Elapsed;

/// Returned by [`Stage::try_collect`](crate::pipeline::Stage::try_collect) when elements failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("pipeline finished with {} failure(s)", .failures.len())]
pub struct PipelineError {
    /// Every recorded failure, upstream stages first.
    pub failures: Vec<TaskError>,
}

impl PipelineError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        "pipeline_failed"
    }
}

/// Returned by [`race`](crate::pipeline::race) when no candidate produced a value.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RaceError<E> {
    /// The deadline fired before any candidate succeeded.
    #[error("no candidate finished before the deadline")]
    Timeout,
    /// Every candidate finished with an error.
    #[error("all {} candidates failed", .0.len())]
    AllFailed(Vec<E>),
    /// The candidate list was empty.
    #[error("no candidates")]
    Empty,
}

impl<E> RaceError<E> {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RaceError::Timeout => "race_timeout",
            RaceError::AllFailed(_) => "race_all_failed",
            RaceError::Empty => "race_empty",
        }
    }
}
