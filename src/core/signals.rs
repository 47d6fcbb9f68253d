//! # OS termination signals.
//!
//! **Unix:** `SIGINT`, `SIGTERM`, `SIGQUIT`.
//! **Other platforms:** Ctrl-C via [`tokio::signal::ctrl_c`].

use std::io;

/// Termination signal that triggered a shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    /// `SIGINT` or Ctrl-C.
    Interrupt,
    /// `SIGTERM` (systemd, Kubernetes, plain `kill`).
    Terminate,
    /// `SIGQUIT`.
    Quit,
}

impl TerminationSignal {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TerminationSignal::Interrupt => "interrupt",
            TerminationSignal::Terminate => "terminate",
            TerminationSignal::Quit => "quit",
        }
    }
}

/// Suspends until the process receives a termination signal.
///
/// Listeners are registered on every call; registration failures are returned.
#[cfg(unix)]
pub(crate) async fn wait_for_termination() -> io::Result<TerminationSignal> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let which = tokio::select! {
        _ = sigint.recv() => TerminationSignal::Interrupt,
        _ = sigterm.recv() => TerminationSignal::Terminate,
        _ = sigquit.recv() => TerminationSignal::Quit,
    };
    Ok(which)
}

/// Suspends until the process receives Ctrl-C.
#[cfg(not(unix))]
pub(crate) async fn wait_for_termination() -> io::Result<TerminationSignal> {
    tokio::signal::ctrl_c().await?;
    Ok(TerminationSignal::Interrupt)
}
