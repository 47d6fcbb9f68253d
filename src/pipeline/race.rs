//! # First successful result wins.
//!
//! [`race`] polls every candidate concurrently on the calling task and returns
//! the first `Ok`. Losers are dropped (cancelled at their current suspension point)
//! as soon as a winner is known or the time bound passed.

use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::time;

use crate::error::RaceError;

/// Runs `candidates` concurrently and returns the first successful value.
///
/// - every candidate failed → [`RaceError::AllFailed`] with errors in completion order
/// - `within` elapsed first → [`RaceError::Timeout`]
/// - no candidates → [`RaceError::Empty`]
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use flowvisor::{TaskError, pipeline::race};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mirrors = ["a", "b"].map(|m| async move {
///     if m == "a" { Err(TaskError::fail("unreachable")) } else { Ok(m) }
/// });
/// assert_eq!(race(mirrors, Duration::from_secs(1)).await, Ok("b"));
/// # }
/// ```
pub async fn race<I, F, T, E>(candidates: I, within: Duration) -> Result<T, RaceError<E>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    let mut pending: FuturesUnordered<F> = candidates.into_iter().collect();
    if pending.is_empty() {
        return Err(RaceError::Empty);
    }

    let mut errors = Vec::with_capacity(pending.len());
    let first_ok = async {
        while let Some(res) = pending.next().await {
            match res {
                Ok(v) => return Some(v),
                Err(e) => errors.push(e),
            }
        }
        None
    };

    let winner = time::timeout(within, first_ok).await;
    match winner {
        Ok(Some(v)) => Ok(v),
        Ok(None) => Err(RaceError::AllFailed(errors)),
        Err(_) => Err(RaceError::Timeout),
    }
}
