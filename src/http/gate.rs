//! Request gate: the admission switch in front of a server's router.
//!
//! # States
//! ```text
//! Open ──close()──▶ Closed   (one-way)
//! ```
//!
//! # Design Decisions
//! - `AtomicBool` with Release on close and Acquire on read, so every
//!   request-handling task observes the close once `close()` returns
//! - Closed gate answers 503 itself; the router never sees the request

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::http::response::service_unavailable;
use crate::observability::metrics;

/// Per-server admission switch. Clones share the same state.
#[derive(Debug, Clone)]
pub struct Gate {
    closed: Arc<AtomicBool>,
    server: Arc<str>,
}

impl Gate {
    /// An open gate for the named server.
    pub fn new(server: &str) -> Self {
        Self {
            closed: Arc::new(AtomicBool::new(false)),
            server: Arc::from(server),
        }
    }

    /// Close the gate. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Middleware: forward while open, reject with 503 once closed.
pub async fn admit(State(gate): State<Gate>, request: Request, next: Next) -> Response {
    if gate.is_closed() {
        tracing::debug!(
            server = %gate.server,
            method = %request.method(),
            path = %request.uri().path(),
            "Gate closed, rejecting request"
        );
        metrics::record_rejected(&gate.server);
        return service_unavailable();
    }
    next.run(request).await
}
