//! # Outcome of one shutdown round.
//!
//! A [`ShutdownReport`] keeps per-unit detail next to the aggregate outcome, so a
//! timed-out round still shows which units finished and which did not.
//!
//! ## Classification
//! ```text
//! any unit TimedOut | Abandoned | Skipped  → RoundOutcome::TimedOut
//! else any unit Failed                    → RoundOutcome::PartialFailure
//! else                                    → RoundOutcome::Completed
//! ```

use std::time::Duration;

use crate::error::{RuntimeError, TaskError};
use crate::shutdown::ShutdownMode;

/// Aggregate outcome of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Every unit finished in time without error.
    Completed,
    /// The deadline passed before every unit finished.
    TimedOut,
    /// Every unit finished in time but at least one reported an error.
    PartialFailure,
}

impl RoundOutcome {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RoundOutcome::Completed => "completed",
            RoundOutcome::TimedOut => "timed_out",
            RoundOutcome::PartialFailure => "partial_failure",
        }
    }
}

/// What happened to one unit during the round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    /// Shutdown returned `Ok` before the deadline.
    Completed,
    /// Shutdown returned an error (or panicked) before the deadline.
    Failed(String),
    /// Sequential mode: the unit was running when the deadline passed and was dropped.
    TimedOut,
    /// Parallel mode: the unit was still running at the deadline; its task was left behind.
    Abandoned,
    /// Sequential mode: never attempted because the budget was exhausted.
    Skipped,
}

impl UnitStatus {
    /// Returns `true` for statuses caused by the deadline.
    pub fn is_unfinished(&self) -> bool {
        matches!(
            self,
            UnitStatus::TimedOut | UnitStatus::Abandoned | UnitStatus::Skipped
        )
    }
}

/// Per-unit line of a [`ShutdownReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    /// Unit name.
    pub name: String,
    /// Terminal status.
    pub status: UnitStatus,
    /// Time spent in the unit's shutdown; `None` when it never ran or never finished.
    pub elapsed: Option<Duration>,
}

impl UnitReport {
    pub(crate) fn new(name: impl Into<String>, status: UnitStatus) -> Self {
        Self {
            name: name.into(),
            status,
            elapsed: None,
        }
    }

    /// Records the result of a unit that returned in time.
    pub(crate) fn settle(&mut self, res: Result<(), TaskError>, elapsed: Duration) {
        self.status = match res {
            Ok(()) => UnitStatus::Completed,
            Err(e) => UnitStatus::Failed(e.to_string()),
        };
        self.elapsed = Some(elapsed);
    }
}

/// Result of [`ShutdownController::run`](super::ShutdownController::run).
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    /// Traversal mode used for the round.
    pub mode: ShutdownMode,
    /// Aggregate outcome.
    pub outcome: RoundOutcome,
    /// Budget the round started with.
    pub timeout: Duration,
    /// Wall-clock time the round took.
    pub elapsed: Duration,
    /// Per-unit detail, in registration order.
    pub units: Vec<UnitReport>,
}

impl ShutdownReport {
    pub(crate) fn new(
        mode: ShutdownMode,
        timeout: Duration,
        elapsed: Duration,
        units: Vec<UnitReport>,
    ) -> Self {
        let outcome = if units.iter().any(|u| u.status.is_unfinished()) {
            RoundOutcome::TimedOut
        } else if units
            .iter()
            .any(|u| matches!(u.status, UnitStatus::Failed(_)))
        {
            RoundOutcome::PartialFailure
        } else {
            RoundOutcome::Completed
        };
        Self {
            mode,
            outcome,
            timeout,
            elapsed,
            units,
        }
    }

    /// Returns `true` if every unit completed in time.
    pub fn is_completed(&self) -> bool {
        self.outcome == RoundOutcome::Completed
    }

    /// Looks a unit up by name.
    pub fn unit(&self, name: &str) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.name == name)
    }

    /// Units that did not finish (timed out, abandoned or skipped).
    pub fn unfinished(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(|u| u.status.is_unfinished())
    }

    /// Units whose shutdown returned an error.
    pub fn failed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.units.iter().filter_map(|u| match &u.status {
            UnitStatus::Failed(e) => Some((u.name.as_str(), e.as_str())),
            _ => None,
        })
    }

    /// Classifies the report as a [`RuntimeError`] unless the round completed.
    pub fn into_result(self) -> Result<(), RuntimeError> {
        match self.outcome {
            RoundOutcome::Completed => Ok(()),
            RoundOutcome::TimedOut => Err(RuntimeError::ShutdownTimedOut {
                timeout: self.timeout,
                stuck: self.unfinished().map(|u| u.name.clone()).collect(),
            }),
            RoundOutcome::PartialFailure => Err(RuntimeError::PartialFailure {
                failed: self
                    .failed()
                    .map(|(n, e)| (n.to_string(), e.to_string()))
                    .collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &str, status: UnitStatus) -> UnitReport {
        UnitReport::new(name, status)
    }

    #[test]
    fn timeout_wins_over_failure() {
        let r = ShutdownReport::new(
            ShutdownMode::Parallel,
            Duration::from_secs(3),
            Duration::from_secs(3),
            vec![
                unit("a", UnitStatus::Failed("boom".into())),
                unit("b", UnitStatus::Abandoned),
            ],
        );
        assert_eq!(r.outcome, RoundOutcome::TimedOut);
        match r.into_result() {
            Err(RuntimeError::ShutdownTimedOut { stuck, timeout }) => {
                assert_eq!(stuck, vec!["b".to_string()]);
                assert_eq!(timeout, Duration::from_secs(3));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn failures_are_listed() {
        let r = ShutdownReport::new(
            ShutdownMode::Sequential,
            Duration::from_secs(1),
            Duration::from_millis(10),
            vec![
                unit("a", UnitStatus::Completed),
                unit("b", UnitStatus::Failed("disk".into())),
            ],
        );
        assert_eq!(r.outcome, RoundOutcome::PartialFailure);
        assert_eq!(r.failed().collect::<Vec<_>>(), vec![("b", "disk")]);
        let err = r.into_result().unwrap_err();
        assert_eq!(err.as_label(), "runtime_partial_failure");
    }

    #[test]
    fn empty_round_completes() {
        let r = ShutdownReport::new(
            ShutdownMode::Parallel,
            Duration::ZERO,
            Duration::ZERO,
            Vec::new(),
        );
        assert!(r.is_completed());
        assert!(r.into_result().is_ok());
    }
}
