//! Worker pools and the single-owner [`Sequence`] actor.
//!
//! - [`WorkerPool`] N workers draining one work channel into a results channel
//! - [`PoolBuilder`] worker count, results capacity, per-task timeout, event bus
//! - [`TaskOutcome`] per-task result tagged with the worker index
//! - [`Sequence`] request/response counter owned by one task

mod sequence;
mod worker_pool;

pub use sequence::Sequence;
pub use worker_pool::{PoolBuilder, PoolStats, TaskOutcome, WorkerPool};
