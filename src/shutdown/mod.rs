//! Supervised shutdown: units, deadlines, the round controller and its report.
//!
//! ## Contents
//! - [`ShutdownUnit`], [`UnitFn`], [`UnitRef`] components with a deadline-bounded teardown
//! - [`Deadline`] absolute bound shared by every unit of a round
//! - [`ShutdownController`] runs one round in [`ShutdownMode::Parallel`] or
//!   [`ShutdownMode::Sequential`] and tracks its [`RoundState`]
//! - [`ShutdownReport`] aggregate [`RoundOutcome`] plus per-unit [`UnitReport`]

mod controller;
mod deadline;
mod report;
mod unit;

pub use controller::{RoundState, ShutdownController, ShutdownMode};
pub use deadline::Deadline;
pub use report::{RoundOutcome, ShutdownReport, UnitReport, UnitStatus};
pub use unit::{ShutdownUnit, UnitFn, UnitRef};
