//! Message-passing transport.
//!
//! - [`bounded`] creates a fixed-capacity FIFO channel ([`Sender`] / [`Receiver`]),
//!   the handoff every other component is built on.
//! - [`Signal`] is a one-shot, cloneable completion signal.
//! - [`select_first`] / [`select_first_timeout`] wait for the first of N signals.
//!
//! ## Quick reference
//! ```text
//! producers ──► Sender<T> ──► [ VecDeque<T>, cap C ] ──► Receiver<T> ──► consumers
//!                   │                                         │
//!                   └── close() (once) ───► closed ───► drain, then recv() = None
//! ```

mod bounded;
mod signal;

pub use bounded::{Receiver, Sender, bounded};
pub use signal::{Signal, select_first, select_first_timeout};
