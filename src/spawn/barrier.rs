//! # Join barrier: completes once a tracked count reaches zero.
//!
//! ```text
//! JoinBarrier::new(3) ──► done() ──► done() ──► done() ──► signal fires
//!                                                            │
//!                          wait() / signal().fired() ◄───────┘
//! ```
//!
//! ## Rules
//! - The count is fixed at construction and only decreases.
//! - Decrementing below zero is a usage error and panics.
//! - `new(0)` starts already completed.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::channel::Signal;

/// Counts outstanding workers and fires a [`Signal`] when none remain.
#[derive(Clone, Debug)]
pub struct JoinBarrier {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    remaining: AtomicUsize,
    zero: Signal,
}

impl JoinBarrier {
    /// Creates a barrier tracking `count` outstanding participants.
    pub fn new(count: usize) -> Self {
        let zero = Signal::new();
        if count == 0 {
            zero.fire();
        }
        Self {
            inner: Arc::new(Inner {
                remaining: AtomicUsize::new(count),
                zero,
            }),
        }
    }

    /// Marks one participant as finished.
    ///
    /// # Panics
    /// Panics if every participant already reported.
    pub fn done(&self) {
        let prev = self
            .inner
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match prev {
            Ok(1) => self.inner.zero.fire(),
            Ok(_) => {}
            Err(_) => panic!("flowvisor: join barrier decremented below zero"),
        }
    }

    /// Returns a guard calling [`done`](Self::done) when dropped (panics included).
    pub fn guard(&self) -> DoneGuard {
        DoneGuard {
            barrier: self.clone(),
        }
    }

    /// Outstanding participants.
    pub fn count(&self) -> usize {
        self.inner.remaining.load(Ordering::Acquire)
    }

    /// Returns `true` once the count reached zero.
    pub fn is_done(&self) -> bool {
        self.inner.zero.is_fired()
    }

    /// Suspends until the count reaches zero.
    pub async fn wait(&self) {
        self.inner.zero.fired().await;
    }

    /// Completion as a signal that can be raced against others.
    pub fn signal(&self) -> Signal {
        self.inner.zero.clone()
    }
}

/// Reports one participant finished when dropped.
#[must_use = "dropping the guard immediately marks the participant done"]
#[derive(Debug)]
pub struct DoneGuard {
    barrier: JoinBarrier,
}

impl Drop for DoneGuard {
    fn drop(&mut self) {
        self.barrier.done();
    }
}
