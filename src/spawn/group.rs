//! # Worker groups.
//!
//! [`spawn_group`] launches N invocations of one closure and tracks them with a
//! [`JoinBarrier`]; the group signal fires only when all N exited.
//!
//! [`spawn_group_with_stop`] adds a shared job source:
//! ```text
//!   Sender<J> (producers) ──► [bounded job channel] ──► worker 0..N  (f(i, job))
//!                                       ▲
//!   StoppableGroup::stop() ── close() ──┘   (the group is the designated closer)
//!        └──► workers drain remaining jobs ──► exit ──► barrier hits zero ──► signal
//! ```
//!
//! ## Rules
//! - A job error never stops a worker; it is counted in [`StoppableGroup::failed`].
//! - `stop` closes the source **first**, then the signal fires only after every
//!   worker actually exited.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::channel::{Sender, Signal, bounded};
use crate::error::{Elapsed, TaskError};
use crate::spawn::{JoinBarrier, WorkerHandle, spawn_report};

/// Spawns `n` workers running `f(index)` and returns a group handle.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use flowvisor::spawn::spawn_group;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let hits = Arc::new(AtomicUsize::new(0));
/// let h = hits.clone();
/// let group = spawn_group(4, move |_i| {
///     let h = h.clone();
///     async move {
///         h.fetch_add(1, Ordering::SeqCst);
///         Ok(())
///     }
/// });
/// group.wait().await;
/// assert_eq!(hits.load(Ordering::SeqCst), 4);
/// # }
/// ```
pub fn spawn_group<F, Fut>(n: usize, f: F) -> GroupHandle
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    let barrier = JoinBarrier::new(n);
    let workers = (0..n)
        .map(|i| {
            let guard = barrier.guard();
            let fut = f(i);
            spawn_report(async move {
                let _guard = guard;
                fut.await
            })
        })
        .collect();
    GroupHandle { barrier, workers }
}

/// Handle for a group of workers backed by a [`JoinBarrier`].
#[derive(Debug)]
pub struct GroupHandle {
    barrier: JoinBarrier,
    workers: Vec<WorkerHandle<()>>,
}

impl GroupHandle {
    /// Group made of one worker running `fut`.
    pub(crate) fn single<F>(fut: F) -> Self
    where
        F: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let barrier = JoinBarrier::new(1);
        let guard = barrier.guard();
        let worker = spawn_report(async move {
            let _guard = guard;
            fut.await
        });
        GroupHandle {
            barrier,
            workers: vec![worker],
        }
    }

    /// Number of workers in the group.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Returns `true` for an empty group.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Workers that have not exited yet.
    pub fn active(&self) -> usize {
        self.barrier.count()
    }

    /// Signal firing once every worker exited.
    pub fn done(&self) -> Signal {
        self.barrier.signal()
    }

    /// Returns `true` once every worker exited.
    pub fn is_done(&self) -> bool {
        self.barrier.is_done()
    }

    /// Suspends until every worker exited.
    pub async fn wait(&self) {
        self.barrier.wait().await;
    }

    /// Like [`wait`](Self::wait), bounded by `timeout`.
    pub async fn wait_timeout(&self, timeout: Duration) -> Result<(), Elapsed> {
        tokio::time::timeout(timeout, self.barrier.wait())
            .await
            .map_err(|_| Elapsed)
    }

    /// Requests cancellation of every worker at its next suspension point.
    pub fn abort(&self) {
        for w in &self.workers {
            w.abort();
        }
    }

    /// Waits for every worker and returns each terminal result, in spawn order.
    pub async fn join(self) -> Vec<Result<(), TaskError>> {
        futures::future::join_all(self.workers.into_iter().map(WorkerHandle::join)).await
    }
}

/// Spawns `n` workers pulling jobs from a shared bounded source until it is closed.
///
/// Returns the producer side of the source and the group. Producers may clone the
/// sender freely; only [`StoppableGroup::stop`] closes the source. `n` is clamped
/// to at least 1 so sent jobs always have a consumer.
pub fn spawn_group_with_stop<J, F, Fut>(
    n: usize,
    capacity: usize,
    f: F,
) -> (Sender<J>, StoppableGroup<J>)
where
    J: Send + 'static,
    F: Fn(usize, J) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    let (tx, rx) = bounded::<J>(capacity);
    let f = Arc::new(f);
    let failed = Arc::new(AtomicU64::new(0));
    let processed = Arc::new(AtomicU64::new(0));

    let group = {
        let failed = Arc::clone(&failed);
        let processed = Arc::clone(&processed);
        spawn_group(n.max(1), move |i| {
            let rx = rx.clone();
            let f = Arc::clone(&f);
            let failed = Arc::clone(&failed);
            let processed = Arc::clone(&processed);
            async move {
                while let Some(job) = rx.recv().await {
                    if f(i, job).await.is_err() {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                    processed.fetch_add(1, Ordering::Relaxed);
                }
                Ok(())
            }
        })
    };

    let closer = tx.clone();
    (
        tx,
        StoppableGroup {
            closer,
            group,
            failed,
            processed,
        },
    )
}

/// Worker group with an explicit stop signal. See [`spawn_group_with_stop`].
#[derive(Debug)]
pub struct StoppableGroup<J> {
    closer: Sender<J>,
    group: GroupHandle,
    failed: Arc<AtomicU64>,
    processed: Arc<AtomicU64>,
}

impl<J> StoppableGroup<J> {
    /// Closes the job source; workers drain what is buffered and exit.
    ///
    /// Returns the group handle so the caller can wait for the exit.
    ///
    /// # Panics
    /// Panics if a producer already closed the source (the group owns the close).
    pub fn stop(self) -> GroupHandle {
        self.closer.close();
        self.group
    }

    /// [`stop`](Self::stop), then wait until every worker exited.
    pub async fn stop_and_wait(self) {
        self.stop().wait().await;
    }

    /// Signal firing once every worker exited.
    pub fn done(&self) -> Signal {
        self.group.done()
    }

    /// Workers that have not exited yet.
    pub fn active(&self) -> usize {
        self.group.active()
    }

    /// Jobs whose closure returned an error.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Jobs taken from the source and finished (successfully or not).
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }
}
