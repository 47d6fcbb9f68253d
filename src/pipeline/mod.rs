//! Fan-out / fan-in pipeline stages over bounded channels.
//!
//! - [`source`] generator stage from any iterator
//! - [`stage`] single-worker transform/filter
//! - [`fan_out`] K workers partitioning one input
//! - [`fan_in`] merge with close-after-all-collectors
//! - [`Stage`] chaining (`then`, `fan_out`, `merge`, `collect`, `try_collect`, `stop`)
//! - [`race`] first successful candidate under a time bound

mod race;
mod stage;

pub use race::race;
pub use stage::{Stage, fan_in, fan_out, source, stage};
