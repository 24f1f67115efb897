//! Signal watchdog: turns the first termination signal into a graceful
//! shutdown and backs it with a forced exit.
//!
//! # Data Flow
//! ```text
//! first signal ──▶ spawn race ──┬── second signal ──▶ Terminator(SecondSignal)
//!              │                └── timeout ────────▶ Terminator(Timeout)
//!              └─▶ graceful shutdown ──▶ race aborted ──▶ return
//! ```
//!
//! # Design Decisions
//! - The race is not synchronised with the shutdown phases; it only bounds them
//! - Termination goes through [`Terminator`] so it can be observed in tests

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::lifecycle::signals::TerminationSignal;
use crate::observability::metrics;

/// Why the watchdog cut the shutdown short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedExit {
    /// Another termination signal arrived during shutdown.
    SecondSignal,
    /// The overall shutdown deadline elapsed.
    Timeout,
}

impl ForcedExit {
    /// Process exit status for this reason.
    pub fn exit_code(self) -> i32 {
        1
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ForcedExit::SecondSignal => "forced exit",
            ForcedExit::Timeout => "timeout forced exit",
        }
    }
}

impl fmt::Display for ForcedExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability to end the process immediately.
pub trait Terminator: Send + Sync + 'static {
    fn terminate(&self, reason: ForcedExit);
}

/// Ends the real process with [`ForcedExit::exit_code`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExit;

impl Terminator for ProcessExit {
    fn terminate(&self, reason: ForcedExit) {
        tracing::error!(reason = %reason, code = reason.exit_code(), "Terminating process");
        std::process::exit(reason.exit_code());
    }
}

/// How [`Watchdog::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogOutcome {
    /// A signal arrived and the graceful shutdown returned.
    Completed,
    /// The signal source closed before any signal arrived; nothing was shut down.
    SignalSourceClosed,
}

pub struct Watchdog<T: Terminator> {
    shutdown_timeout: Duration,
    terminator: Arc<T>,
}

impl<T: Terminator> Watchdog<T> {
    pub fn new(shutdown_timeout: Duration, terminator: T) -> Self {
        Self {
            shutdown_timeout,
            terminator: Arc::new(terminator),
        }
    }

    /// Wait for a termination signal, then run `shutdown` under the forced-exit race.
    pub async fn run<F, Fut>(
        self,
        mut signals: mpsc::Receiver<TerminationSignal>,
        shutdown: F,
    ) -> WatchdogOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        let Some(signal) = signals.recv().await else {
            tracing::warn!("Signal source closed before any termination signal");
            return WatchdogOutcome::SignalSourceClosed;
        };
        tracing::info!(
            signal = %signal,
            timeout = ?self.shutdown_timeout,
            "Termination signal received, shutting down gracefully"
        );

        let race = tokio::spawn(forced_exit_race(
            signals,
            self.shutdown_timeout,
            self.terminator.clone(),
        ));

        shutdown().await;

        race.abort();
        WatchdogOutcome::Completed
    }
}

async fn forced_exit_race<T: Terminator>(
    mut signals: mpsc::Receiver<TerminationSignal>,
    timeout: Duration,
    terminator: Arc<T>,
) {
    let reason = tokio::select! {
        Some(signal) = signals.recv() => {
            tracing::warn!(signal = %signal, "Second termination signal received");
            ForcedExit::SecondSignal
        }
        _ = tokio::time::sleep(timeout) => {
            tracing::warn!(timeout = ?timeout, "Graceful shutdown overran its deadline");
            ForcedExit::Timeout
        }
    };

    metrics::record_forced_exit(reason.as_str());
    terminator.terminate(reason);
}
