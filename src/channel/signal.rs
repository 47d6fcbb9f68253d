//! # One-shot completion signals and first-of-N waiting.
//!
//! [`Signal`] is a cloneable, fire-once event backed by a [`CancellationToken`].
//! Every spawned unit of work in this crate exposes one so that callers can
//! race it against other signals or a deadline.
//!
//! [`select_first`] waits until any of several signals fired. When more than one
//! is ready at the same time, the winner is picked **pseudo-randomly** among the
//! ready ones rather than by position, so no signal is starved by list order.

use std::time::Duration;

use futures::future::select_all;
use rand::seq::{IndexedRandom, SliceRandom};
use tokio_util::sync::CancellationToken;

/// Fire-once completion signal.
///
/// - Clones observe the same underlying event.
/// - Firing is idempotent; waiting after the signal fired returns immediately.
#[derive(Clone, Debug, Default)]
pub struct Signal {
    token: CancellationToken,
}

impl Signal {
    /// Creates an unfired signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal, waking every waiter.
    pub fn fire(&self) {
        self.token.cancel();
    }

    /// Returns `true` if the signal has fired.
    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the signal fired.
    pub async fn fired(&self) {
        self.token.cancelled().await;
    }

    /// Returns a guard that fires the signal when dropped.
    ///
    /// Used by spawned workers so the signal fires on every exit path, panics included.
    pub(crate) fn fire_on_drop(&self) -> tokio_util::sync::DropGuard {
        self.token.clone().drop_guard()
    }
}

/// Waits for the first of `signals` to fire and returns its index.
///
/// Returns `None` for an empty slice. If several signals are ready together,
/// one of them is chosen at random.
///
/// # Example
/// ```rust
/// use flowvisor::channel::{Signal, select_first};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let a = Signal::new();
/// let b = Signal::new();
/// b.fire();
/// assert_eq!(select_first(&[a, b]).await, Some(1));
/// # }
/// ```
pub async fn select_first(signals: &[Signal]) -> Option<usize> {
    if signals.is_empty() {
        return None;
    }
    if let Some(i) = pick_ready(signals) {
        return Some(i);
    }

    let order = {
        let mut order: Vec<usize> = (0..signals.len()).collect();
        order.shuffle(&mut rand::rng());
        order
    };
    let waits = order.iter().map(|&i| Box::pin(signals[i].fired()));
    let (_, pos, _) = select_all(waits).await;

    // Others may have fired in the same instant; re-pick among all of them.
    Some(pick_ready(signals).unwrap_or(order[pos]))
}

/// Like [`select_first`], bounded by `timeout`.
///
/// Returns `None` when the timeout elapsed first (or the slice is empty).
pub async fn select_first_timeout(signals: &[Signal], timeout: Duration) -> Option<usize> {
    tokio::time::timeout(timeout, select_first(signals))
        .await
        .ok()
        .flatten()
}

/// Picks a random index among the signals that already fired.
fn pick_ready(signals: &[Signal]) -> Option<usize> {
    let ready: Vec<usize> = signals
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_fired())
        .map(|(i, _)| i)
        .collect();
    ready.choose(&mut rand::rng()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn fire_is_idempotent_and_shared_by_clones() {
        let s = Signal::new();
        let c = s.clone();
        assert!(!c.is_fired());
        s.fire();
        s.fire();
        assert!(c.is_fired());
        c.fired().await;
    }

    #[tokio::test]
    async fn empty_selection_is_none() {
        assert_eq!(select_first(&[]).await, None);
    }

    #[tokio::test]
    async fn selects_the_signal_that_fires() {
        let signals = vec![Signal::new(), Signal::new(), Signal::new()];
        let late = signals[2].clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            late.fire();
        });
        assert_eq!(select_first(&signals).await, Some(2));
    }

    #[tokio::test]
    async fn ties_are_broken_randomly() {
        let signals = vec![Signal::new(), Signal::new(), Signal::new()];
        for s in &signals {
            s.fire();
        }
        let mut seen = HashSet::new();
        for _ in 0..200 {
            seen.insert(select_first(&signals).await.unwrap());
        }
        assert_eq!(seen.len(), 3, "every ready signal should win sometimes");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_branch() {
        let signals = vec![Signal::new()];
        let got = select_first_timeout(&signals, Duration::from_millis(10)).await;
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn drop_guard_fires() {
        let s = Signal::new();
        {
            let _guard = s.fire_on_drop();
        }
        assert!(s.is_fired());
    }
}
