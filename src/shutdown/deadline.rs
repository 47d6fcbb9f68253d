//! # Absolute deadline shared by every unit of a shutdown round.

use std::time::Duration;

use tokio::time::{self, Instant};

/// Upper bound used when `Instant + Duration` would overflow.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// An absolute point in time after which pending shutdown work is abandoned.
///
/// Backed by [`tokio::time::Instant`], so paused test clocks apply.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use flowvisor::shutdown::Deadline;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let d = Deadline::after(Duration::from_secs(5));
/// assert!(!d.is_expired());
/// assert!(d.remaining() <= Duration::from_secs(5));
/// # }
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline at an absolute instant.
    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    /// Deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        let now = Instant::now();
        let at = now
            .checked_add(budget)
            .unwrap_or_else(|| now + FAR_FUTURE);
        Self { at }
    }

    /// The absolute instant.
    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Time left before the deadline; zero once it passed.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Returns `true` once no budget is left.
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Suspends until the deadline passed.
    pub async fn expired(&self) {
        time::sleep_until(self.at).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn remaining_saturates() {
        let d = Deadline::after(Duration::from_secs(2));
        assert_eq!(d.remaining(), Duration::from_secs(2));

        time::advance(Duration::from_secs(1)).await;
        assert_eq!(d.remaining(), Duration::from_secs(1));

        time::advance(Duration::from_secs(5)).await;
        assert_eq!(d.remaining(), Duration::ZERO);
        assert!(d.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn huge_budget_does_not_overflow() {
        let d = Deadline::after(Duration::MAX);
        assert!(!d.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_wakes_at_instant() {
        let d = Deadline::after(Duration::from_millis(300));
        let start = Instant::now();
        d.expired().await;
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }
}
