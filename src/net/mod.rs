//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Server::start
//!     → listener.rs (bind, axum::serve with graceful shutdown)
//! Server::stop
//!     → listener.rs (cancel, wait for admitted connections)
//! ```
//!
//! # Design Decisions
//! - The listener is a trait so servers can run over any transport
//! - Stopping an idle listener closes it; it never serves afterwards

pub mod listener;

pub use listener::{HttpListener, Listener, ServerError};
