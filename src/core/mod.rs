//! Runtime core: configuration, the orchestrator façade and task execution.
//!
//! The public API from this module is [`Orchestrator`] (plus its builder),
//! [`Config`] and [`TerminationSignal`].
//!
//! Internal modules:
//! - [`runner`]: executes one unit of work with timeout and panic capture;
//! - [`signals`]: cross-platform termination signal handling;
//! - [`orchestrator`] / [`builder`]: event wiring and shutdown rounds.

mod builder;
mod config;
mod orchestrator;
pub(crate) mod runner;
mod signals;

pub use builder::OrchestratorBuilder;
pub use config::Config;
pub use orchestrator::Orchestrator;
pub use signals::TerminationSignal;
