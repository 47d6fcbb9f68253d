//! # Single-owner sequence generator.
//!
//! The counter lives inside one actor task; callers never touch it directly.
//! Each [`Sequence::next`] sends a reply slot over a bounded request channel and
//! waits for the actor to fill it.
//!
//! ```text
//! caller A ──┐  (oneshot reply)
//! caller B ──┼──► Sender<Reply> ──► actor { next += 1 } ──► reply.send(n)
//! caller C ──┘
//! ```
//!
//! ## Rules
//! - Numbers handed out are unique and gap-free: a number is consumed only when
//!   the caller is still waiting for it.
//! - The actor exits once every `Sequence` clone is dropped or [`Sequence::close`] was called.

use tokio::sync::oneshot;

use crate::channel::{Sender, Signal, bounded};
use crate::spawn::spawn_signal;

type Reply = oneshot::Sender<u64>;

/// Cloneable handle to a sequence actor.
#[derive(Clone, Debug)]
pub struct Sequence {
    requests: Sender<Reply>,
    done: Signal,
}

impl Sequence {
    /// Starts an actor handing out `start, start + 1, ...`.
    ///
    /// `capacity` bounds the number of queued requests.
    ///
    /// # Example
    /// ```rust
    /// use flowvisor::pool::Sequence;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let seq = Sequence::start(1, 16);
    /// assert_eq!(seq.next().await, Some(1));
    /// assert_eq!(seq.next().await, Some(2));
    /// # }
    /// ```
    pub fn start(start: u64, capacity: usize) -> Self {
        let (requests, rx) = bounded::<Reply>(capacity);
        let done = spawn_signal(async move {
            let mut next = start;
            while let Some(reply) = rx.recv().await {
                if reply.send(next).is_ok() {
                    next += 1;
                }
            }
        });
        Self { requests, done }
    }

    /// Returns the next number, or `None` once the actor stopped.
    pub async fn next(&self) -> Option<u64> {
        let (tx, rx) = oneshot::channel();
        self.requests.send(tx).await.ok()?;
        rx.await.ok()
    }

    /// Stops the actor after it answered the requests already queued.
    ///
    /// # Panics
    /// Panics if the sequence was already closed.
    pub fn close(&self) {
        self.requests.close();
    }

    /// Fires once the actor exited.
    pub fn done(&self) -> Signal {
        self.done.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_get_unique_gap_free_numbers() {
        let seq = Sequence::start(0, 8);
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let seq = seq.clone();
            tasks.push(tokio::spawn(async move {
                let mut got = Vec::new();
                for _ in 0..25 {
                    got.push(seq.next().await.unwrap());
                }
                got
            }));
        }

        let mut all = Vec::new();
        for t in tasks {
            all.extend(t.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..200).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn close_stops_actor() {
        let seq = Sequence::start(10, 1);
        assert_eq!(seq.next().await, Some(10));
        seq.close();
        seq.done().fired().await;
        assert_eq!(seq.next().await, None);
    }

    #[tokio::test]
    async fn abandoned_request_does_not_burn_a_number() {
        let seq = Sequence::start(0, 4);
        {
            let (tx, rx) = oneshot::channel();
            drop(rx);
            seq.requests.send(tx).await.unwrap();
        }
        assert_eq!(seq.next().await, Some(0));
    }
}
