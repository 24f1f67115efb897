//! Server handle: one listener plus its request gate.
//!
//! # Responsibilities
//! - Hold the axum router the application registers routes on
//! - Wire up middleware (tracing, request ID, gate)
//! - Start serving on the listener and report how it ended
//! - Trip the gate and request a graceful stop during shutdown
//!
//! # Design Decisions
//! - Routing is plain axum; the server only wraps it
//! - The gate sits inside the request-id layer so rejections carry an ID
//! - `stop()` is never retried; its result is for the caller to log

use axum::{middleware, routing::MethodRouter, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::http::gate::{self, Gate};
use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::net::{HttpListener, Listener, ServerError};

/// One hosted server.
pub struct Server {
    name: String,
    bind_address: String,
    router: Router,
    gate: Gate,
    listener: Arc<dyn Listener>,
}

impl Server {
    /// A server that will serve HTTP over TCP on `bind_address`.
    pub fn new(name: impl Into<String>, bind_address: impl Into<String>) -> Self {
        let bind_address = bind_address.into();
        let listener = Arc::new(HttpListener::new(bind_address.clone()));
        Self::with_listener(name, bind_address, listener)
    }

    /// A server over a caller-supplied listener; `bind_address` is informational.
    pub fn with_listener(
        name: impl Into<String>,
        bind_address: impl Into<String>,
        listener: Arc<dyn Listener>,
    ) -> Self {
        let name = name.into();
        Self {
            gate: Gate::new(&name),
            name,
            bind_address: bind_address.into(),
            router: Router::new(),
            listener,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        let listener = HttpListener::new(config.bind_address.clone())
            .with_grace_limit(config.grace_limit());
        Self::with_listener(&config.name, &config.bind_address, Arc::new(listener))
    }

    /// Register a route. Must happen before `start()`.
    pub fn handle(&mut self, pattern: &str, method_router: MethodRouter) -> &mut Self {
        self.router = std::mem::take(&mut self.router).route(pattern, method_router);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Resolves once the listener is bound.
    pub async fn ready(&self) -> Option<SocketAddr> {
        self.listener.ready().await
    }

    /// Build the full service stack around the registered routes.
    fn app(&self) -> Router {
        self.router
            .clone()
            .layer(middleware::from_fn_with_state(self.gate.clone(), gate::admit))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
            )
    }

    /// Serve until stopped. Blocks for the server's lifetime.
    pub async fn start(&self) -> Result<(), ServerError> {
        tracing::info!(
            server = %self.name,
            address = %self.bind_address,
            "Server starting"
        );

        let result = self.listener.serve(self.app()).await;
        match &result {
            Ok(()) => tracing::info!(server = %self.name, "Server stopped"),
            Err(e) => tracing::error!(server = %self.name, error = %e, "Server exited abnormally"),
        }
        result
    }

    /// Close the gate: from now on every request gets a 503.
    pub fn trip_gate(&self) {
        if self.gate.close() {
            tracing::info!(server = %self.name, "Gate closed, rejecting new requests");
        }
    }

    /// Ask the listener for a graceful stop.
    pub async fn stop(&self) -> Result<(), ServerError> {
        tracing::info!(server = %self.name, "Server stopping");
        self.listener.shutdown().await
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("name", &self.name)
            .field("bind_address", &self.bind_address)
            .field("gate_closed", &self.gate.is_closed())
            .finish()
    }
}
