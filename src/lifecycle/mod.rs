//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     one task per server → Server::start
//!
//! Signals (signals.rs):
//!     SIGINT/SIGTERM (configurable) → channel
//!
//! Watchdog (watchdog.rs):
//!     first signal → shutdown + forced-exit race (second signal | timeout)
//!
//! Shutdown (shutdown.rs):
//!     close gates → drain → stop servers → callbacks.rs → release → done
//! ```
//!
//! # Design Decisions
//! - Every phase ends at a barrier before the next one starts
//! - Shutdown has timeout: forced exit after deadline
//! - Multiple SIGTERM/SIGINT triggers forced exit

pub mod callbacks;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod watchdog;

pub use callbacks::{CallbackExecutor, Deadline, ShutdownCallback};
pub use shutdown::{Orchestrator, ShutdownPhase};
pub use signals::TerminationSignal;
pub use watchdog::{ForcedExit, ProcessExit, Terminator, Watchdog, WatchdogOutcome};
