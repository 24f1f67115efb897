//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for the configured termination signals
//! - Forward every delivery into one channel the watchdog consumes
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Default set is SIGINT + SIGTERM; SIGQUIT and SIGHUP are opt-in
//! - Off Unix only Ctrl-C is available

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use tokio::sync::mpsc;

/// Signals the process treats as a request to terminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminationSignal {
    /// SIGINT / Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// SIGQUIT.
    Quit,
    /// SIGHUP.
    Hangup,
}

pub const DEFAULT_SIGNALS: &[TerminationSignal] =
    &[TerminationSignal::Interrupt, TerminationSignal::Terminate];

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TerminationSignal::Interrupt => "SIGINT",
            TerminationSignal::Terminate => "SIGTERM",
            TerminationSignal::Quit => "SIGQUIT",
            TerminationSignal::Hangup => "SIGHUP",
        };
        f.write_str(name)
    }
}

/// Install handlers for `kinds` and return the stream of deliveries.
///
/// Must run inside a Tokio runtime. Handlers stay installed for the life of
/// the process.
pub fn listen(kinds: &[TerminationSignal]) -> io::Result<mpsc::Receiver<TerminationSignal>> {
    let (tx, rx) = mpsc::channel(kinds.len().max(1) * 2);
    for &kind in kinds {
        forward(kind, tx.clone())?;
    }
    tracing::debug!(signals = ?kinds, "Signal handlers installed");
    Ok(rx)
}

#[cfg(unix)]
fn forward(kind: TerminationSignal, tx: mpsc::Sender<TerminationSignal>) -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut stream = signal(match kind {
        TerminationSignal::Interrupt => SignalKind::interrupt(),
        TerminationSignal::Terminate => SignalKind::terminate(),
        TerminationSignal::Quit => SignalKind::quit(),
        TerminationSignal::Hangup => SignalKind::hangup(),
    })?;

    tokio::spawn(async move {
        while stream.recv().await.is_some() {
            if tx.send(kind).await.is_err() {
                break;
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn forward(kind: TerminationSignal, tx: mpsc::Sender<TerminationSignal>) -> io::Result<()> {
    if kind != TerminationSignal::Interrupt {
        return Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("{kind} is not available on this platform"),
        ));
    }

    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(kind).await.is_err() {
                break;
            }
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(TerminationSignal::Interrupt.to_string(), "SIGINT");
        assert_eq!(TerminationSignal::Terminate.to_string(), "SIGTERM");
    }

    #[test]
    fn test_serde_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            signals: Vec<TerminationSignal>,
        }
        let parsed: Wrapper = toml::from_str(r#"signals = ["quit", "hangup"]"#).unwrap();
        assert_eq!(
            parsed.signals,
            vec![TerminationSignal::Quit, TerminationSignal::Hangup]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_listen_installs_handlers() {
        let mut rx = listen(DEFAULT_SIGNALS).unwrap();
        assert!(rx.try_recv().is_err());
    }
}
