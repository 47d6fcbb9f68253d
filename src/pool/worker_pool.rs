//! # Fixed-size worker pool over a shared work channel.
//!
//! ## Architecture
//! ```text
//!                     ┌──► worker 0 ──┐
//! Receiver<T> (work) ─┼──► worker 1 ──┼──► Sender<TaskOutcome<R>> ──► results Receiver
//!                     └──► worker N ──┘             ▲
//!                            │                      │ close() (single closer)
//!                            └─► JoinBarrier ──► coordinator ──► PoolDrained
//! ```
//!
//! ## Rules
//! - Workers race on the shared receiver; each exits once the channel is closed
//!   and drained, or when [`WorkerPool::stop`] fired.
//! - `apply` errors, panics and timeouts are captured into that task's
//!   [`TaskOutcome`]; the worker moves on to the next task.
//! - The results channel is closed by the coordinator only after every worker exited.
//! - Stop is observed at the next suspension point: waiting for work, waiting for
//!   room in the results channel, or inside a running task. A task interrupted by
//!   stop is dropped and counted as failed with [`TaskError::Canceled`].
//! - Dropping a [`WorkerPool`] does not stop it.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::channel::{Receiver, Sender, Signal, bounded};
use crate::core::runner::run_once;
use crate::error::{Elapsed, TaskError};
use crate::events::{self, Bus, Event, EventKind};
use crate::shutdown::{Deadline, ShutdownUnit};
use crate::spawn::{GroupHandle, WorkerHandle, spawn_group, spawn_report};

/// Result of applying the pool function to one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome<R> {
    /// Index of the worker that processed the task.
    pub worker: usize,
    /// Value returned by `apply`, or the captured failure.
    pub result: Result<R, TaskError>,
}

/// Counters reported by [`WorkerPool::join`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Number of workers the pool ran.
    pub workers: usize,
    /// Tasks taken from the work channel and finished.
    pub processed: u64,
    /// Tasks whose result was an error.
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    processed: AtomicU64,
    failed: AtomicU64,
}

/// Configures and starts a [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct PoolBuilder {
    name: Arc<str>,
    workers: usize,
    output_capacity: usize,
    task_timeout: Option<Duration>,
    bus: Option<Bus>,
}

impl PoolBuilder {
    fn new(name: Arc<str>) -> Self {
        Self {
            name,
            workers: 1,
            output_capacity: 64,
            task_timeout: None,
            bus: None,
        }
    }

    /// Number of workers (clamped to at least 1).
    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n.max(1);
        self
    }

    /// Capacity of the results channel.
    pub fn output_capacity(mut self, capacity: usize) -> Self {
        self.output_capacity = capacity;
        self
    }

    /// Per-task timeout; `Duration::ZERO` disables it.
    pub fn task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Publishes worker lifecycle and task failure events on `bus`.
    pub fn bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Starts the workers and returns the pool plus its results channel.
    ///
    /// # Example
    /// ```rust
    /// use flowvisor::{TaskError, channel::bounded, pool::WorkerPool};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let (tx, rx) = bounded::<u32>(8);
    /// let (pool, results) = WorkerPool::builder("square")
    ///     .workers(2)
    ///     .start(rx, |n| async move { Ok::<_, TaskError>(n * n) });
    ///
    /// for n in 1..=3 {
    ///     tx.send(n).await.unwrap();
    /// }
    /// tx.close();
    ///
    /// let mut sum = 0;
    /// while let Some(out) = results.recv().await {
    ///     sum += out.result.unwrap();
    /// }
    /// assert_eq!(sum, 14);
    /// assert_eq!(pool.join().await.processed, 3);
    /// # }
    /// ```
    pub fn start<T, R, F, Fut>(
        self,
        input: Receiver<T>,
        apply: F,
    ) -> (WorkerPool, Receiver<TaskOutcome<R>>)
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, TaskError>> + Send + 'static,
    {
        let (out_tx, out_rx) = bounded::<TaskOutcome<R>>(self.output_capacity);
        let pool = self.launch(input, apply, Some(out_tx));
        (pool, out_rx)
    }

    /// Starts the workers without a results channel.
    ///
    /// Failures are still counted and published as events.
    pub fn start_detached<T, R, F, Fut>(self, input: Receiver<T>, apply: F) -> WorkerPool
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, TaskError>> + Send + 'static,
    {
        self.launch(input, apply, None)
    }

    fn launch<T, R, F, Fut>(
        self,
        input: Receiver<T>,
        apply: F,
        output: Option<Sender<TaskOutcome<R>>>,
    ) -> WorkerPool
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, TaskError>> + Send + 'static,
    {
        let stop = CancellationToken::new();
        let counters = Arc::new(Counters::default());
        let apply = Arc::new(apply);
        let started = Instant::now();

        let ctx = WorkerCtx {
            name: Arc::clone(&self.name),
            bus: self.bus.clone(),
            stop: stop.clone(),
            counters: Arc::clone(&counters),
            timeout: self.task_timeout,
        };

        let group = {
            let output = output.clone();
            spawn_group(self.workers, move |i| {
                worker_loop(
                    i,
                    ctx.clone(),
                    input.clone(),
                    Arc::clone(&apply),
                    output.clone(),
                )
            })
        };

        let coordinator = {
            let barrier = group.done();
            let name = Arc::clone(&self.name);
            let bus = self.bus.clone();
            let counters = Arc::clone(&counters);
            spawn_report(async move {
                barrier.fired().await;
                if let Some(out) = output {
                    out.close();
                }
                events::publish(bus.as_ref(), || {
                    Event::new(EventKind::PoolDrained)
                        .with_name(name)
                        .with_count(counters.processed.load(Ordering::Relaxed))
                        .with_elapsed(started.elapsed())
                });
                Ok(())
            })
        };

        WorkerPool {
            name: self.name,
            bus: self.bus,
            stop,
            group,
            coordinator,
            counters,
        }
    }
}

#[derive(Clone)]
struct WorkerCtx {
    name: Arc<str>,
    bus: Option<Bus>,
    stop: CancellationToken,
    counters: Arc<Counters>,
    timeout: Option<Duration>,
}

async fn worker_loop<T, R, F, Fut>(
    index: usize,
    ctx: WorkerCtx,
    input: Receiver<T>,
    apply: Arc<F>,
    output: Option<Sender<TaskOutcome<R>>>,
) -> Result<(), TaskError>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, TaskError>> + Send + 'static,
{
    events::publish(ctx.bus.as_ref(), || {
        Event::new(EventKind::WorkerStarted)
            .with_name(Arc::clone(&ctx.name))
            .with_worker(index)
    });

    let mut handled = 0u64;
    loop {
        let task = tokio::select! {
            biased;
            _ = ctx.stop.cancelled() => break,
            next = input.recv() => match next {
                Some(task) => task,
                None => break,
            },
        };

        let result = tokio::select! {
            biased;
            _ = ctx.stop.cancelled() => Err(TaskError::Canceled),
            res = run_once(|| apply(task), ctx.timeout) => res,
        };
        handled += 1;
        ctx.counters.processed.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = &result {
            ctx.counters.failed.fetch_add(1, Ordering::Relaxed);
            report_failure(&ctx, index, e);
        }

        if let Some(out) = &output {
            let outcome = TaskOutcome {
                worker: index,
                result,
            };
            tokio::select! {
                biased;
                _ = ctx.stop.cancelled() => break,
                sent = out.send(outcome) => {
                    if sent.is_err() {
                        // Results consumer is gone; keep draining the work channel.
                        continue;
                    }
                }
            }
        }
    }

    events::publish(ctx.bus.as_ref(), || {
        Event::new(EventKind::WorkerStopped)
            .with_name(Arc::clone(&ctx.name))
            .with_worker(index)
            .with_count(handled)
    });
    Ok(())
}

fn report_failure(ctx: &WorkerCtx, index: usize, err: &TaskError) {
    events::publish(ctx.bus.as_ref(), || {
        let ev = match err {
            TaskError::Timeout { timeout } => {
                Event::new(EventKind::TaskTimedOut).with_timeout(*timeout)
            }
            other => Event::new(EventKind::TaskFailed).with_reason(other.to_string()),
        };
        ev.with_name(Arc::clone(&ctx.name)).with_worker(index)
    });
}

/// A running pool of workers. See the [module docs](self) for the lifecycle.
pub struct WorkerPool {
    name: Arc<str>,
    bus: Option<Bus>,
    stop: CancellationToken,
    group: GroupHandle,
    coordinator: WorkerHandle<()>,
    counters: Arc<Counters>,
}

impl WorkerPool {
    /// Starts configuring a pool named `name`.
    pub fn builder(name: impl Into<Arc<str>>) -> PoolBuilder {
        PoolBuilder::new(name.into())
    }

    /// Pool name used in events.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of workers started.
    pub fn workers(&self) -> usize {
        self.group.len()
    }

    /// Workers whose loop has not exited yet.
    pub fn active_workers(&self) -> usize {
        self.group.active()
    }

    /// Tasks finished so far.
    pub fn processed(&self) -> u64 {
        self.counters.processed.load(Ordering::Relaxed)
    }

    /// Tasks that ended in an error so far.
    pub fn failed(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }

    /// Raises the stop signal; workers exit without draining the work channel.
    ///
    /// Idempotent.
    pub fn stop(&self) {
        if !self.stop.is_cancelled() {
            events::publish(self.bus.as_ref(), || {
                Event::new(EventKind::PoolStopRequested).with_name(Arc::clone(&self.name))
            });
        }
        self.stop.cancel();
    }

    /// Returns `true` once [`stop`](Self::stop) was called.
    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Fires once every worker exited and the results channel was closed.
    pub fn done(&self) -> Signal {
        self.coordinator.done()
    }

    /// Waits for [`done`](Self::done), bounded by `timeout`.
    pub async fn join_timeout(&self, timeout: Duration) -> Result<(), Elapsed> {
        time::timeout(timeout, self.coordinator.done().fired())
            .await
            .map_err(|_| Elapsed)
    }

    /// Waits until every worker exited and returns the final counters.
    pub async fn join(self) -> PoolStats {
        // The coordinator never fails; a cancellation only happens if the runtime is shutting down.
        let _ = self.coordinator.join().await;
        PoolStats {
            workers: self.group.len(),
            processed: self.counters.processed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

/// Stops the pool and waits for its workers within the deadline.
#[async_trait]
impl ShutdownUnit for WorkerPool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn shutdown(&self, deadline: Deadline) -> Result<(), TaskError> {
        self.stop();
        let budget = deadline.remaining();
        time::timeout(budget, self.done().fired())
            .await
            .map_err(|_| TaskError::Timeout { timeout: budget })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn every_task_is_processed_once() {
        let (tx, rx) = bounded::<u32>(4);
        let (pool, results) = WorkerPool::builder("ids")
            .workers(3)
            .start(rx, |n| async move { Ok::<_, TaskError>(n) });

        let producer = tokio::spawn(async move {
            for n in 0..50 {
                tx.send(n).await.unwrap();
            }
        });

        let mut seen = HashSet::new();
        while let Some(out) = results.recv().await {
            assert!(out.worker < 3);
            assert!(seen.insert(out.result.unwrap()));
        }
        producer.await.unwrap();

        assert_eq!(seen.len(), 50);
        let stats = pool.join().await;
        assert_eq!(stats.processed, 50);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn failures_do_not_stop_workers() {
        let (tx, rx) = bounded::<u32>(16);
        let (pool, results) = WorkerPool::builder("flaky").workers(1).start(rx, |n| async move {
            match n {
                2 => Err(TaskError::fail("bad input")),
                3 => panic!("worker bug"),
                n => Ok(n),
            }
        });
        for n in 1..=5 {
            tx.send(n).await.unwrap();
        }
        drop(tx);

        let mut ok = Vec::new();
        let mut labels = Vec::new();
        while let Some(out) = results.recv().await {
            match out.result {
                Ok(v) => ok.push(v),
                Err(e) => labels.push(e.as_label()),
            }
        }
        assert_eq!(ok, vec![1, 4, 5]);
        assert_eq!(labels, vec!["task_failed", "task_panicked"]);
        assert_eq!(pool.failed(), 2);
        pool.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn task_timeout_is_per_task() {
        let (tx, rx) = bounded::<u64>(4);
        let (pool, results) = WorkerPool::builder("slow")
            .task_timeout(Duration::from_secs(1))
            .start(rx, |secs| async move {
                time::sleep(Duration::from_secs(secs)).await;
                Ok::<_, TaskError>(secs)
            });
        tx.send(5).await.unwrap();
        tx.send(0).await.unwrap();
        tx.close();

        let first = results.recv().await.unwrap();
        assert_eq!(first.result.unwrap_err().as_label(), "task_timeout");
        let second = results.recv().await.unwrap();
        assert_eq!(second.result, Ok(0));
        assert!(results.recv().await.is_none());
        pool.join().await;
    }

    #[tokio::test]
    async fn stop_exits_without_draining() {
        let (tx, rx) = bounded::<u32>(8);
        let pool = WorkerPool::builder("idle")
            .workers(2)
            .start_detached(rx, |_| async { Ok::<_, TaskError>(()) });
        assert_eq!(pool.workers(), 2);

        pool.stop();
        pool.done().fired().await;
        assert_eq!(pool.active_workers(), 0);
        assert!(tx.send(1).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_a_running_task() {
        let started = Signal::new();
        let (tx, rx) = bounded::<u64>(1);
        let pool = {
            let started = started.clone();
            WorkerPool::builder("long").start_detached(rx, move |secs| {
                let started = started.clone();
                async move {
                    started.fire();
                    time::sleep(Duration::from_secs(secs)).await;
                    Ok::<_, TaskError>(())
                }
            })
        };
        tx.send(3600).await.unwrap();
        started.fired().await;

        let res = pool.shutdown(Deadline::after(Duration::from_secs(1))).await;
        assert!(res.is_ok());
        assert_eq!(pool.processed(), 1);
        assert_eq!(pool.failed(), 1);
    }

    #[tokio::test]
    async fn shutdown_unit_stops_pool() {
        let (_tx, rx) = bounded::<u32>(1);
        let pool = WorkerPool::builder("unit").start_detached(rx, |_| async { Ok::<_, TaskError>(()) });
        let res = pool.shutdown(Deadline::after(Duration::from_secs(1))).await;
        assert!(res.is_ok());
        assert!(pool.is_stopped());
        assert!(pool.done().is_fired());
    }

    #[tokio::test]
    async fn publishes_lifecycle_events() {
        let bus = Bus::new(64);
        let mut rx_ev = bus.subscribe();
        let (tx, rx) = bounded::<u32>(1);
        let pool = WorkerPool::builder("evented")
            .bus(bus)
            .start_detached(rx, |_| async { Err::<(), _>(TaskError::fail("nope")) });
        tx.send(1).await.unwrap();
        drop(tx);
        pool.join().await;

        let mut kinds = Vec::new();
        while let Ok(ev) = rx_ev.try_recv() {
            kinds.push(ev.kind);
        }
        assert_eq!(
            kinds,
            vec![
                EventKind::WorkerStarted,
                EventKind::TaskFailed,
                EventKind::WorkerStopped,
                EventKind::PoolDrained
            ]
        );
    }
}
