//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings used by the [`Orchestrator`](crate::Orchestrator)
//! when it builds channels, worker pools and shutdown controllers.
//!
//! ## Sentinel values
//! - `workers = 0` → one worker per available CPU
//! - `task_timeout = 0s` → no per-task timeout
//! - `channel_capacity = 0` → rendezvous channels

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::shutdown::ShutdownMode;

/// Global configuration for the orchestration runtime.
///
/// ## Field semantics
/// - `channel_capacity`: default capacity for work channels (`0` = rendezvous)
/// - `workers`: default pool size (`0` = available parallelism)
/// - `output_capacity`: capacity of pool result channels (min 1; clamped)
/// - `task_timeout`: default per-task timeout for pools (`0s` = none)
/// - `shutdown_timeout`: deadline of one shutdown round
/// - `shutdown_mode`: parallel or sequential shutdown rounds
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Default capacity for work channels created by the orchestrator.
    pub channel_capacity: usize,

    /// Default number of workers per pool.
    ///
    /// - `0` = one per available CPU (falls back to 1)
    /// - `n > 0` = exactly `n` workers
    pub workers: usize,

    /// Capacity of the results channel of each pool.
    pub output_capacity: usize,

    /// Default per-task timeout.
    ///
    /// - `Duration::ZERO` = no timeout
    /// - `> 0` = a task running longer yields `TaskError::Timeout` for that task only
    pub task_timeout: Duration,

    /// Deadline of a shutdown round.
    ///
    /// When it expires, unfinished units are abandoned and the round is `TimedOut`.
    pub shutdown_timeout: Duration,

    /// How shutdown units are traversed.
    pub shutdown_mode: ShutdownMode,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,
}

impl Config {
    /// Returns the effective number of pool workers.
    #[inline]
    pub fn worker_count(&self) -> usize {
        match self.workers {
            0 => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            n => n,
        }
    }

    /// Returns the default per-task timeout as an `Option`.
    ///
    /// - `None` → no timeout
    /// - `Some(d)` → timeout applied per task
    #[inline]
    pub fn default_task_timeout(&self) -> Option<Duration> {
        if self.task_timeout == Duration::ZERO {
            None
        } else {
            Some(self.task_timeout)
        }
    }

    /// Returns the results channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn output_capacity_clamped(&self) -> usize {
        self.output_capacity.max(1)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `channel_capacity = 64`
    /// - `workers = 0` (available parallelism)
    /// - `output_capacity = 64`
    /// - `task_timeout = 0s` (no timeout)
    /// - `shutdown_timeout = 30s`
    /// - `shutdown_mode = ShutdownMode::Parallel`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            workers: 0,
            output_capacity: 64,
            task_timeout: Duration::ZERO,
            shutdown_timeout: Duration::from_secs(30),
            shutdown_mode: ShutdownMode::Parallel,
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_resolve() {
        let cfg = Config {
            workers: 0,
            output_capacity: 0,
            bus_capacity: 0,
            ..Config::default()
        };
        assert!(cfg.worker_count() >= 1);
        assert_eq!(cfg.default_task_timeout(), None);
        assert_eq!(cfg.output_capacity_clamped(), 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn explicit_values_pass_through() {
        let cfg = Config {
            workers: 3,
            task_timeout: Duration::from_millis(250),
            ..Config::default()
        };
        assert_eq!(cfg.worker_count(), 3);
        assert_eq!(cfg.default_task_timeout(), Some(Duration::from_millis(250)));
    }
}
