//! Coordinated graceful shutdown for a process hosting several HTTP servers.
//!
//! On the first termination signal every server's gate closes (new requests
//! get a 503), admitted requests get a drain period, all servers stop
//! concurrently, cleanup callbacks run under advisory deadlines, and the
//! process exits. A second signal, or an overrun of the overall deadline,
//! terminates the process immediately.

pub mod app;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use app::{App, AppBuilder};
pub use config::schema::AppConfig;
pub use http::Server;
pub use lifecycle::{Deadline, ShutdownCallback, ShutdownPhase, TerminationSignal};
