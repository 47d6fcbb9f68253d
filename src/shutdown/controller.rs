//! # Supervised shutdown controller.
//!
//! Runs the shutdown procedure of every registered [`ShutdownUnit`] under one
//! [`Deadline`] and classifies the round.
//!
//! ## Round state machine
//! ```text
//! Pending ──run()──► Running ──┬──► Completed
//!                              ├──► TimedOut
//!                              └──► PartialFailure
//! ```
//! A controller runs **one** round; calling `run` again panics.
//!
//! ## Parallel mode
//! ```text
//! unit 0 ─ spawn_report ─┐
//! unit 1 ─ spawn_report ─┼──► results (bounded, n) ──► collector ◄── sleep_until(deadline)
//! unit N ─ spawn_report ─┘
//! ```
//! Units still running at the deadline are `Abandoned`. Their handles are kept
//! by the controller; [`ShutdownController::join_abandoned`] can reap them later.
//!
//! ## Sequential mode
//! ```text
//! for unit in order:
//!     remaining = deadline - now
//!     remaining == 0   → this and every later unit Skipped, round TimedOut
//!     timer.reset(now + remaining)
//!     select { unit.shutdown() → settle, timer → unit TimedOut, rest Skipped }
//! ```
//! One pinned timer is re-armed each iteration.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{self, Instant};

use crate::channel::bounded;
use crate::core::runner::run_once;
use crate::error::TaskError;
use crate::events::{self, Bus, Event, EventKind};
use crate::shutdown::{Deadline, RoundOutcome, ShutdownReport, UnitReport, UnitRef, UnitStatus};
use crate::spawn::{WorkerHandle, spawn_report};

/// How the units of a round are traversed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShutdownMode {
    /// All units at once; minimizes wall-clock time.
    #[default]
    Parallel,
    /// Registration order; each unit gets exactly the budget left by the previous ones.
    Sequential,
}

/// Lifecycle of a controller's round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    /// No round ran yet.
    Pending,
    /// A round is in progress.
    Running,
    /// Terminal: every unit completed.
    Completed,
    /// Terminal: the deadline passed first.
    TimedOut,
    /// Terminal: in time, with failures.
    PartialFailure,
}

impl From<RoundOutcome> for RoundState {
    fn from(o: RoundOutcome) -> Self {
        match o {
            RoundOutcome::Completed => RoundState::Completed,
            RoundOutcome::TimedOut => RoundState::TimedOut,
            RoundOutcome::PartialFailure => RoundState::PartialFailure,
        }
    }
}

/// Drives one shutdown round over the registered units.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use flowvisor::TaskError;
/// use flowvisor::shutdown::{RoundOutcome, ShutdownController, ShutdownMode, UnitFn};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ctl = ShutdownController::new(ShutdownMode::Sequential);
/// ctl.register(UnitFn::arc("http", |_| async { Ok::<_, TaskError>(()) }));
/// ctl.register(UnitFn::arc("db", |_| async { Ok::<_, TaskError>(()) }));
///
/// let report = ctl.run(Duration::from_secs(5)).await;
/// assert_eq!(report.outcome, RoundOutcome::Completed);
/// # }
/// ```
pub struct ShutdownController {
    mode: ShutdownMode,
    bus: Option<Bus>,
    units: Mutex<Vec<UnitRef>>,
    state: Mutex<RoundState>,
    abandoned: Mutex<Vec<(String, WorkerHandle<()>)>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ShutdownController {
    /// Creates an empty controller.
    pub fn new(mode: ShutdownMode) -> Self {
        Self {
            mode,
            bus: None,
            units: Mutex::new(Vec::new()),
            state: Mutex::new(RoundState::Pending),
            abandoned: Mutex::new(Vec::new()),
        }
    }

    /// Publishes unit and round events on `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Default traversal mode used by [`run`](Self::run).
    pub fn mode(&self) -> ShutdownMode {
        self.mode
    }

    /// Appends a unit; sequential rounds follow registration order.
    ///
    /// Units registered after the round started are not part of it.
    pub fn register(&self, unit: UnitRef) {
        lock(&self.units).push(unit);
    }

    /// Names of the registered units, in registration order.
    pub fn units(&self) -> Vec<String> {
        lock(&self.units)
            .iter()
            .map(|u| u.name().to_string())
            .collect()
    }

    /// Current round state.
    pub fn state(&self) -> RoundState {
        *lock(&self.state)
    }

    /// Runs the round in the default mode with a deadline `timeout` from now.
    ///
    /// # Panics
    /// Panics if a round already ran on this controller.
    pub async fn run(&self, timeout: Duration) -> ShutdownReport {
        self.run_with(self.mode, Deadline::after(timeout)).await
    }

    /// Runs the round in `mode` against an explicit `deadline`.
    ///
    /// # Panics
    /// Panics if a round already ran on this controller.
    pub async fn run_with(&self, mode: ShutdownMode, deadline: Deadline) -> ShutdownReport {
        self.begin();
        let units: Vec<UnitRef> = lock(&self.units).clone();
        let budget = deadline.remaining();
        let started = Instant::now();

        let lines = match mode {
            ShutdownMode::Parallel => self.run_parallel(&units, deadline).await,
            ShutdownMode::Sequential => self.run_sequential(&units, deadline).await,
        };

        let report = ShutdownReport::new(mode, budget, started.elapsed(), lines);
        *lock(&self.state) = report.outcome.into();
        self.publish_outcome(&report);
        report
    }

    /// Waits up to `within` for units abandoned by a parallel round.
    ///
    /// Units that finish in that window report `Completed` or `Failed`; the rest
    /// are aborted and stay `Abandoned`. Each handle is consumed once.
    pub async fn join_abandoned(&self, within: Duration) -> Vec<UnitReport> {
        let handles = std::mem::take(&mut *lock(&self.abandoned));
        let grace = Deadline::after(within);
        let mut lines = Vec::with_capacity(handles.len());

        for (name, handle) in handles {
            let mut line = UnitReport::new(name, UnitStatus::Abandoned);
            let done = handle.done();
            if time::timeout(grace.remaining(), done.fired()).await.is_ok() {
                line.status = match handle.join().await {
                    Ok(()) => UnitStatus::Completed,
                    Err(e) => UnitStatus::Failed(e.to_string()),
                };
            } else {
                handle.abort();
            }
            lines.push(line);
        }
        lines
    }

    fn begin(&self) {
        let mut st = lock(&self.state);
        if *st != RoundState::Pending {
            panic!("flowvisor: shutdown round already ran (state {:?})", *st);
        }
        *st = RoundState::Running;
    }

    async fn run_parallel(&self, units: &[UnitRef], deadline: Deadline) -> Vec<UnitReport> {
        let mut lines: Vec<UnitReport> = units
            .iter()
            .map(|u| UnitReport::new(u.name(), UnitStatus::Abandoned))
            .collect();
        if units.is_empty() {
            return lines;
        }

        let (tx, rx) = bounded::<(usize, Result<(), TaskError>, Duration)>(units.len());
        let mut handles = Vec::with_capacity(units.len());
        for (idx, unit) in units.iter().enumerate() {
            self.publish(|| {
                Event::new(EventKind::UnitStarting)
                    .with_name(unit.name())
                    .with_timeout(deadline.remaining())
            });
            let unit = Arc::clone(unit);
            let tx = tx.clone();
            handles.push(spawn_report(async move {
                let started = Instant::now();
                let res = run_once(|| unit.shutdown(deadline), None).await;
                let _ = tx.send((idx, res.clone(), started.elapsed())).await;
                res
            }));
        }
        drop(tx);

        let timer = time::sleep_until(deadline.instant());
        tokio::pin!(timer);
        let mut pending = units.len();
        while pending > 0 {
            tokio::select! {
                biased;
                msg = rx.recv() => match msg {
                    Some((idx, res, elapsed)) => {
                        pending -= 1;
                        lines[idx].settle(res, elapsed);
                        self.publish_settled(&lines[idx]);
                    }
                    None => break,
                },
                _ = &mut timer => break,
            }
        }

        let mut abandoned = lock(&self.abandoned);
        for (line, handle) in lines.iter().zip(handles) {
            if line.status == UnitStatus::Abandoned {
                self.publish(|| {
                    Event::new(EventKind::UnitTimedOut)
                        .with_name(line.name.as_str())
                        .with_timeout(Duration::ZERO)
                });
                abandoned.push((line.name.clone(), handle));
            }
        }
        lines
    }

    async fn run_sequential(&self, units: &[UnitRef], deadline: Deadline) -> Vec<UnitReport> {
        let mut lines: Vec<UnitReport> = units
            .iter()
            .map(|u| UnitReport::new(u.name(), UnitStatus::Skipped))
            .collect();

        let timer = time::sleep_until(deadline.instant());
        tokio::pin!(timer);

        for (idx, unit) in units.iter().enumerate() {
            let remaining = deadline.remaining();
            if remaining.is_zero() {
                break;
            }
            timer.as_mut().reset(Instant::now() + remaining);
            self.publish(|| {
                Event::new(EventKind::UnitStarting)
                    .with_name(unit.name())
                    .with_timeout(remaining)
            });

            let started = Instant::now();
            tokio::select! {
                biased;
                res = run_once(|| unit.shutdown(deadline), None) => {
                    lines[idx].settle(res, started.elapsed());
                    self.publish_settled(&lines[idx]);
                }
                _ = &mut timer => {
                    lines[idx].status = UnitStatus::TimedOut;
                    lines[idx].elapsed = Some(started.elapsed());
                    self.publish(|| {
                        Event::new(EventKind::UnitTimedOut)
                            .with_name(unit.name())
                            .with_timeout(remaining)
                    });
                    break;
                }
            }
        }

        for line in lines.iter().filter(|l| l.status == UnitStatus::Skipped) {
            self.publish(|| Event::new(EventKind::UnitSkipped).with_name(line.name.as_str()));
        }
        lines
    }

    fn publish(&self, ev: impl FnOnce() -> Event) {
        events::publish(self.bus.as_ref(), ev);
    }

    fn publish_settled(&self, line: &UnitReport) {
        self.publish(|| {
            let ev = match &line.status {
                UnitStatus::Failed(reason) => {
                    Event::new(EventKind::UnitFailed).with_reason(reason.as_str())
                }
                _ => Event::new(EventKind::UnitStopped),
            };
            let ev = ev.with_name(line.name.as_str());
            match line.elapsed {
                Some(d) => ev.with_elapsed(d),
                None => ev,
            }
        });
    }

    fn publish_outcome(&self, report: &ShutdownReport) {
        self.publish(|| match report.outcome {
            RoundOutcome::Completed => Event::new(EventKind::RoundCompleted)
                .with_elapsed(report.elapsed)
                .with_count(report.units.len() as u64),
            RoundOutcome::TimedOut => Event::new(EventKind::RoundTimedOut)
                .with_elapsed(report.elapsed)
                .with_timeout(report.timeout)
                .with_count(report.unfinished().count() as u64),
            RoundOutcome::PartialFailure => Event::new(EventKind::RoundPartialFailure)
                .with_elapsed(report.elapsed)
                .with_count(report.failed().count() as u64),
        });
    }
}
