//! Spawn/join building blocks.
//!
//! Every helper here launches work on the tokio runtime and returns a handle with
//! a discoverable completion [`Signal`](crate::channel::Signal); nothing is
//! fire-and-forget.
//!
//! | Flavor              | Function                  | Handle                          |
//! |---------------------|---------------------------|---------------------------------|
//! | fire-and-signal     | [`spawn_signal`]          | [`Signal`](crate::channel::Signal) |
//! | fire-and-report     | [`spawn_report`]          | [`WorkerHandle`]                |
//! | fire-a-group        | [`spawn_group`]           | [`GroupHandle`]                 |
//! | group + stop        | [`spawn_group_with_stop`] | [`StoppableGroup`] + job sender |
//!
//! [`JoinBarrier`] is the counter behind group completion.

mod barrier;
mod group;
mod handle;

pub use barrier::{DoneGuard, JoinBarrier};
pub use group::{GroupHandle, StoppableGroup, spawn_group, spawn_group_with_stop};
pub use handle::{WorkerHandle, spawn_report, spawn_signal};
