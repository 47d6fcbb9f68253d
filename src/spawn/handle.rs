//! # Single-worker spawn helpers.
//!
//! - [`spawn_signal`]: run a future, get a [`Signal`] that fires when it exits.
//! - [`spawn_report`]: run a fallible future, get a [`WorkerHandle`] that also yields
//!   the terminal result.
//!
//! ## Rules
//! - The completion signal fires on **every** exit path: success, error, panic, abort.
//! - A panic inside the worker is reported as [`TaskError::Panicked`], never propagated.
//! - [`WorkerHandle::join`] consumes the handle; a handle is read at most once.

use std::future::Future;

use tokio::task::{JoinError, JoinHandle};

use crate::channel::Signal;
use crate::error::TaskError;

/// Spawns `fut` and returns a signal that fires once it finished.
///
/// # Example
/// ```rust
/// use flowvisor::spawn::spawn_signal;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let done = spawn_signal(async { /* work */ });
/// done.fired().await;
/// # }
/// ```
pub fn spawn_signal<F>(fut: F) -> Signal
where
    F: Future<Output = ()> + Send + 'static,
{
    let done = Signal::new();
    let guard = done.fire_on_drop();
    tokio::spawn(async move {
        let _guard = guard;
        fut.await;
    });
    done
}

/// Spawns a fallible `fut` and returns a [`WorkerHandle`] for its completion and result.
///
/// # Example
/// ```rust
/// use flowvisor::{TaskError, spawn::spawn_report};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let handle = spawn_report(async { Err::<(), _>(TaskError::fail("disk full")) });
/// let err = handle.join().await.unwrap_err();
/// assert_eq!(err.as_label(), "task_failed");
/// # }
/// ```
pub fn spawn_report<F, T>(fut: F) -> WorkerHandle<T>
where
    F: Future<Output = Result<T, TaskError>> + Send + 'static,
    T: Send + 'static,
{
    let done = Signal::new();
    let guard = done.fire_on_drop();
    let join = tokio::spawn(async move {
        let _guard = guard;
        fut.await
    });
    WorkerHandle { done, join }
}

/// Handle to one spawned worker: completion signal plus terminal result.
#[derive(Debug)]
pub struct WorkerHandle<T = ()> {
    done: Signal,
    join: JoinHandle<Result<T, TaskError>>,
}

impl<T> WorkerHandle<T> {
    /// Completion signal (fires exactly when the worker exits).
    pub fn done(&self) -> Signal {
        self.done.clone()
    }

    /// Returns `true` once the worker exited.
    pub fn is_finished(&self) -> bool {
        self.done.is_fired()
    }

    /// Requests cancellation of the worker at its next suspension point.
    ///
    /// A later [`join`](Self::join) reports [`TaskError::Canceled`] unless the worker
    /// had already finished.
    pub fn abort(&self) {
        self.join.abort();
    }

    /// Waits for the worker and returns its terminal result.
    pub async fn join(self) -> Result<T, TaskError> {
        match self.join.await {
            Ok(res) => res,
            Err(e) => Err(join_error(e)),
        }
    }
}

fn join_error(e: JoinError) -> TaskError {
    if e.is_panic() {
        TaskError::from_panic(e.into_panic())
    } else {
        TaskError::Canceled
    }
}
