//! # Run a single unit of work.
//!
//! Executes one future (a pool task, a shutdown procedure) with an optional
//! timeout and panic isolation, always returning a [`TaskError`]-typed result.
//!
//! ## Flow
//! ```text
//! Success:  fut → Ok(v)                         → Ok(v)
//! Failure:  fut → Err(e)                        → Err(e)
//! Panic:    fut → panic (caught, AssertUnwindSafe) → Err(Panicked)
//! Timeout:  deadline reached first → fut dropped → Err(Timeout)
//! ```
//!
//! ## Rules
//! - A zero timeout is treated as "no timeout".
//! - The future is dropped on timeout; it observes cancellation at its current
//!   suspension point.
//! - **Warning**: `AssertUnwindSafe` is used; state shared with the panicking
//!   future (e.g. an `Arc<Mutex<T>>`) may be left inconsistent.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time;

use crate::error::TaskError;

/// Runs `make()` once, bounded by `timeout`, converting panics into [`TaskError::Panicked`].
///
/// `make` is invoked inside the guarded section so that a panic while *building*
/// the future is caught as well.
pub(crate) async fn run_once<M, Fut, R>(make: M, timeout: Option<Duration>) -> Result<R, TaskError>
where
    M: FnOnce() -> Fut,
    Fut: Future<Output = Result<R, TaskError>>,
{
    let guarded = AssertUnwindSafe(async move { make().await }).catch_unwind();

    let res = match timeout.filter(|d| *d > Duration::ZERO) {
        Some(dur) => match time::timeout(dur, guarded).await {
            Ok(r) => r,
            Err(_elapsed) => return Err(TaskError::Timeout { timeout: dur }),
        },
        None => guarded.await,
    };

    res.unwrap_or_else(|payload| Err(TaskError::from_panic(payload)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_results() {
        let ok = run_once(|| async { Ok::<_, TaskError>(7) }, None).await;
        assert_eq!(ok, Ok(7));

        let err = run_once(|| async { Err::<(), _>(TaskError::fail("x")) }, None).await;
        assert_eq!(err, Err(TaskError::fail("x")));
    }

    #[tokio::test]
    async fn catches_panics_in_builder_and_future() {
        let built = run_once::<_, futures::future::Ready<Result<(), TaskError>>, ()>(
            || panic!("while building"),
            None,
        )
        .await;
        assert_eq!(built.unwrap_err().as_label(), "task_panicked");

        let polled = run_once(
            || async {
                if true {
                    panic!("while polling");
                }
                Ok::<(), TaskError>(())
            },
            None,
        )
        .await;
        assert_eq!(
            polled,
            Err(TaskError::Panicked {
                info: "while polling".into()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn applies_timeout() {
        let res = run_once(
            || async {
                time::sleep(Duration::from_secs(10)).await;
                Ok::<(), TaskError>(())
            },
            Some(Duration::from_secs(1)),
        )
        .await;
        assert_eq!(
            res,
            Err(TaskError::Timeout {
                timeout: Duration::from_secs(1)
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_means_unbounded() {
        let res = run_once(
            || async {
                time::sleep(Duration::from_secs(10)).await;
                Ok::<u8, TaskError>(1)
            },
            Some(Duration::ZERO),
        )
        .await;
        assert_eq!(res, Ok(1));
    }
}
