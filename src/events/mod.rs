//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by worker pools and the shutdown
//! controller.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `WorkerPool` workers and coordinator,
//!   `ShutdownController`, `Orchestrator`, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the `Orchestrator` listener (fans out to `SubscriberSet`), or any
//!   caller holding [`Bus::subscribe`].

mod bus;
mod event;

pub use bus::Bus;
pub(crate) use bus::publish;
pub use event::{Event, EventKind};
