//! # Pipeline stages: source, transform, fan-out, fan-in.
//!
//! ```text
//! source(iter) ──► stage(f) ──┬──► branch 0 (f) ──┐
//!                             ├──► branch 1 (f) ──┼──► fan_in ──► collect()
//!                             └──► branch K (f) ──┘
//! ```
//!
//! ## Rules
//! - Every stage owns the `Sender` of its output and is its only closer; the output
//!   closes exactly when the stage's input is exhausted, its consumer left or the
//!   stage was stopped.
//! - Fan-out partitions: each input element reaches exactly one branch.
//! - Fan-in closes the merged output only after **every** collector finished.
//! - A transform returning `None` filters the element out.
//! - A transform that panics fails only that element: the panic is recorded as a
//!   [`TaskError::Panicked`] and the worker moves on to the next element.
//! - [`Stage::stop`] cancels the stage and everything upstream of it; workers observe
//!   it at their next `recv`/`send`.
//! - Chaining keeps upstream worker handles, so [`Stage::wait`] covers the whole chain.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::channel::{Receiver, Sender, bounded};
use crate::error::{PipelineError, TaskError};
use crate::spawn::{GroupHandle, spawn_group};

/// Per-element failures recorded by the workers of one stage.
#[derive(Debug, Default)]
struct Failures(Mutex<Vec<TaskError>>);

impl Failures {
    fn record(&self, err: TaskError) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(err);
    }

    fn snapshot(&self) -> Vec<TaskError> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Collects failures from `sinks`, visiting shared sinks (fan-out branches) once.
fn gather<'a>(sinks: impl IntoIterator<Item = &'a Arc<Failures>>) -> Vec<TaskError> {
    let mut seen: Vec<&Arc<Failures>> = Vec::new();
    let mut out = Vec::new();
    for sink in sinks {
        if seen.iter().any(|s| Arc::ptr_eq(s, sink)) {
            continue;
        }
        seen.push(sink);
        out.extend(sink.snapshot());
    }
    out
}

/// Workers, stop token and failure log of one stage in a chain.
#[derive(Debug)]
struct Link {
    done: GroupHandle,
    stop: CancellationToken,
    failures: Arc<Failures>,
}

/// Output end of a running stage plus the handle of the workers feeding it.
#[derive(Debug)]
pub struct Stage<T> {
    /// Values produced by the stage; `None` from `recv` once the stage finished.
    pub output: Receiver<T>,
    /// Workers of this stage.
    pub done: GroupHandle,
    stop: CancellationToken,
    failures: Arc<Failures>,
    upstream: Vec<Link>,
}

impl<T: Send + 'static> Stage<T> {
    fn new(
        output: Receiver<T>,
        done: GroupHandle,
        stop: CancellationToken,
        failures: Arc<Failures>,
    ) -> Self {
        Self {
            output,
            done,
            stop,
            failures,
            upstream: Vec::new(),
        }
    }

    fn with_upstream(mut self, upstream: Vec<Link>) -> Self {
        self.upstream = upstream;
        self
    }

    fn into_parts(self) -> (Receiver<T>, Vec<Link>) {
        let mut links = self.upstream;
        links.push(Link {
            done: self.done,
            stop: self.stop,
            failures: self.failures,
        });
        (self.output, links)
    }

    /// Appends a transform/filter stage.
    pub fn then<U, F>(self, capacity: usize, f: F) -> Stage<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Option<U> + Send + Sync + 'static,
    {
        let (input, links) = self.into_parts();
        stage(input, capacity, f).with_upstream(links)
    }

    /// Splits this stage's output across `k` concurrent branches.
    ///
    /// Upstream handles travel with the first branch.
    pub fn fan_out<U, F>(self, k: usize, capacity: usize, f: F) -> Vec<Stage<U>>
    where
        U: Send + 'static,
        F: Fn(T) -> Option<U> + Send + Sync + 'static,
    {
        let (input, links) = self.into_parts();
        let mut branches = fan_out(input, k, capacity, f);
        if let Some(first) = branches.first_mut() {
            first.upstream = links;
        }
        branches
    }

    /// Merges several stages into one.
    pub fn merge(stages: Vec<Stage<T>>, capacity: usize) -> Stage<T> {
        let mut links = Vec::new();
        let mut inputs = Vec::with_capacity(stages.len());
        for s in stages {
            let (rx, l) = s.into_parts();
            inputs.push(rx);
            links.extend(l);
        }
        fan_in(inputs, capacity).with_upstream(links)
    }

    /// Stops this stage and every stage upstream of it.
    ///
    /// Workers exit at their next suspension point without draining their input.
    /// Idempotent.
    pub fn stop(&self) {
        for link in &self.upstream {
            link.stop.cancel();
        }
        self.stop.cancel();
    }

    /// Returns `true` once [`stop`](Self::stop) was called on this stage.
    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Element failures recorded so far by this stage and its upstream, oldest stage first.
    pub fn failures(&self) -> Vec<TaskError> {
        gather(
            self.upstream
                .iter()
                .map(|l| &l.failures)
                .chain([&self.failures]),
        )
    }

    /// Suspends until this stage and every upstream stage exited.
    pub async fn wait(&self) {
        for link in &self.upstream {
            link.done.wait().await;
        }
        self.done.wait().await;
    }

    /// Drains the output into a `Vec`, then waits for the whole chain.
    ///
    /// Failed elements are simply missing from the result; use
    /// [`try_collect`](Self::try_collect) to observe them.
    pub async fn collect(self) -> Vec<T> {
        let mut out = Vec::new();
        while let Some(v) = self.output.recv().await {
            out.push(v);
        }
        self.wait().await;
        out
    }

    /// Drains the output, joins every worker of the chain and reports failures.
    ///
    /// Fails with every recorded element failure plus the terminal error of any
    /// worker that died, when there is at least one.
    pub async fn try_collect(self) -> Result<Vec<T>, PipelineError> {
        let mut values = Vec::new();
        while let Some(v) = self.output.recv().await {
            values.push(v);
        }

        let (_, links) = self.into_parts();
        let mut died = Vec::new();
        let mut sinks = Vec::with_capacity(links.len());
        for link in links {
            died.extend(link.done.join().await.into_iter().filter_map(Result::err));
            sinks.push(link.failures);
        }

        let mut failures = gather(&sinks);
        failures.extend(died);
        if failures.is_empty() {
            Ok(values)
        } else {
            Err(PipelineError { failures })
        }
    }
}

/// Feeds `iter` into a new channel from a generator task.
///
/// The generator closes the output once the iterator is exhausted, and stops
/// early when the stage is stopped.
///
/// # Example
/// ```rust
/// use flowvisor::pipeline::source;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let evens = source(1..=6, 2).then(2, |n: u32| (n % 2 == 0).then_some(n * 10));
/// assert_eq!(evens.collect().await, vec![20, 40, 60]);
/// # }
/// ```
pub fn source<I>(iter: I, capacity: usize) -> Stage<I::Item>
where
    I: IntoIterator,
    I::IntoIter: Send + 'static,
    I::Item: Send + 'static,
{
    let (tx, rx) = bounded(capacity);
    let stop = CancellationToken::new();
    let iter = iter.into_iter();
    let done = {
        let stop = stop.clone();
        GroupHandle::single(async move {
            for v in iter {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => return Ok(()),
                    sent = tx.send(v) => {
                        if sent.is_err() {
                            return Ok(());
                        }
                    }
                }
            }
            tx.close();
            Ok(())
        })
    };
    Stage::new(rx, done, stop, Arc::default())
}

/// Applies `f` to every element of `input` on one worker.
pub fn stage<T, U, F>(input: Receiver<T>, capacity: usize, f: F) -> Stage<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> Option<U> + Send + Sync + 'static,
{
    let (tx, rx) = bounded(capacity);
    let stop = CancellationToken::new();
    let failures = Arc::new(Failures::default());
    let worker = forward(
        input,
        tx,
        Arc::new(f),
        stop.clone(),
        Arc::clone(&failures),
    );
    Stage::new(rx, GroupHandle::single(worker), stop, failures)
}

/// Starts `k` workers consuming `input`, each with its own output.
///
/// Elements are partitioned, not replicated. `k` is clamped to at least 1.
/// The branches share one stop signal: stopping any of them stops all.
pub fn fan_out<T, U, F>(input: Receiver<T>, k: usize, capacity: usize, f: F) -> Vec<Stage<U>>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> Option<U> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let stop = CancellationToken::new();
    let failures = Arc::new(Failures::default());
    (0..k.max(1))
        .map(|_| {
            let (tx, rx) = bounded(capacity);
            let worker = forward(
                input.clone(),
                tx,
                Arc::clone(&f),
                stop.clone(),
                Arc::clone(&failures),
            );
            Stage::new(
                rx,
                GroupHandle::single(worker),
                stop.clone(),
                Arc::clone(&failures),
            )
        })
        .collect()
}

/// Merges `inputs` into one output.
///
/// One collector per input forwards elements; a coordinator closes the merged
/// output after all collectors finished and reports the first collector failure.
pub fn fan_in<T>(inputs: Vec<Receiver<T>>, capacity: usize) -> Stage<T>
where
    T: Send + 'static,
{
    let (tx, rx) = bounded(capacity);
    let stop = CancellationToken::new();
    let collectors = {
        let tx = tx.clone();
        let stop = stop.clone();
        spawn_group(inputs.len(), move |i| {
            let input = inputs[i].clone();
            let tx = tx.clone();
            let stop = stop.clone();
            async move {
                loop {
                    let v = tokio::select! {
                        biased;
                        _ = stop.cancelled() => break,
                        next = input.recv() => match next {
                            Some(v) => v,
                            None => break,
                        },
                    };
                    tokio::select! {
                        biased;
                        _ = stop.cancelled() => break,
                        sent = tx.send(v) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }
                Ok(())
            }
        })
    };

    let coordinator = GroupHandle::single(async move {
        let results = collectors.join().await;
        tx.close();
        results.into_iter().collect::<Result<Vec<()>, TaskError>>()?;
        Ok(())
    });
    Stage::new(rx, coordinator, stop, Arc::default())
}

async fn forward<T, U, F>(
    input: Receiver<T>,
    output: Sender<U>,
    f: Arc<F>,
    stop: CancellationToken,
    failures: Arc<Failures>,
) -> Result<(), TaskError>
where
    F: Fn(T) -> Option<U> + Send + Sync + 'static,
{
    loop {
        let v = tokio::select! {
            biased;
            _ = stop.cancelled() => return Ok(()),
            next = input.recv() => match next {
                Some(v) => v,
                None => break,
            },
        };

        let u = match panic::catch_unwind(AssertUnwindSafe(|| f(v))) {
            Ok(Some(u)) => u,
            Ok(None) => continue,
            Err(payload) => {
                failures.record(TaskError::from_panic(payload));
                continue;
            }
        };

        tokio::select! {
            biased;
            _ = stop.cancelled() => return Ok(()),
            sent = output.send(u) => {
                if sent.is_err() {
                    return Ok(());
                }
            }
        }
    }
    output.close();
    Ok(())
}
