//! Listener collaborator: binds a socket and serves an axum router until told to stop.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Serve HTTP/1.1 through `axum::serve`
//! - Graceful stop: stop accepting, let admitted connections finish
//!
//! # States
//! ```text
//! Idle → Starting → Serving(addr) → Stopped
//!   └──────── shutdown() before serve ────────┘
//! ```

use async_trait::async_trait;
use axum::Router;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The serve loop failed.
    #[error("serve failed: {0}")]
    Io(#[from] std::io::Error),

    /// `serve` was called on a listener that already started.
    #[error("listener already started")]
    AlreadyStarted,

    /// `serve` was called after shutdown was requested.
    #[error("listener closed")]
    Closed,

    /// Admitted connections did not finish within the grace limit.
    #[error("graceful stop did not finish within {0:?}")]
    ShutdownTimeout(Duration),
}

/// What a server needs from the thing that owns its socket.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Serve `app` until stopped. Returns `Ok` on a graceful stop.
    async fn serve(&self, app: Router) -> Result<(), ServerError>;

    /// Stop accepting and wait for admitted connections to finish.
    async fn shutdown(&self) -> Result<(), ServerError>;

    /// Bound address once serving; `None` if this listener never serves.
    async fn ready(&self) -> Option<SocketAddr> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenerState {
    Idle,
    Starting,
    Serving(SocketAddr),
    Stopped,
}

/// TCP listener serving HTTP through axum.
pub struct HttpListener {
    bind_address: String,
    grace_limit: Option<Duration>,
    shutdown: CancellationToken,
    state: watch::Sender<ListenerState>,
}

impl HttpListener {
    pub fn new(bind_address: impl Into<String>) -> Self {
        Self {
            bind_address: bind_address.into(),
            grace_limit: None,
            shutdown: CancellationToken::new(),
            state: watch::channel(ListenerState::Idle).0,
        }
    }

    /// Bound the graceful stop; `shutdown` fails once it is exceeded.
    pub fn with_grace_limit(mut self, limit: Option<Duration>) -> Self {
        self.grace_limit = limit;
        self
    }

    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    fn finish(&self) {
        self.state.send_replace(ListenerState::Stopped);
    }
}

#[async_trait]
impl Listener for HttpListener {
    async fn serve(&self, app: Router) -> Result<(), ServerError> {
        let claimed = self.state.send_if_modified(|state| {
            if *state == ListenerState::Idle {
                *state = ListenerState::Starting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(if self.shutdown.is_cancelled() {
                ServerError::Closed
            } else {
                ServerError::AlreadyStarted
            });
        }

        let listener = match TcpListener::bind(&self.bind_address).await {
            Ok(listener) => listener,
            Err(source) => {
                self.finish();
                return Err(ServerError::Bind {
                    address: self.bind_address.clone(),
                    source,
                });
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                self.finish();
                return Err(ServerError::Io(e));
            }
        };

        self.state.send_replace(ListenerState::Serving(local_addr));
        tracing::info!(address = %local_addr, "Listener bound");

        let token = self.shutdown.clone();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await;

        self.finish();
        result.map_err(ServerError::Io)
    }

    async fn shutdown(&self) -> Result<(), ServerError> {
        self.shutdown.cancel();

        // Never started: close it so a later serve() refuses to run.
        let never_started = self.state.send_if_modified(|state| {
            if *state == ListenerState::Idle {
                *state = ListenerState::Stopped;
                true
            } else {
                false
            }
        });
        if never_started {
            return Ok(());
        }

        let mut state = self.state.subscribe();
        let stopped = async move {
            let _ = state.wait_for(|s| *s == ListenerState::Stopped).await;
        };

        match self.grace_limit {
            Some(limit) => tokio::time::timeout(limit, stopped)
                .await
                .map_err(|_| ServerError::ShutdownTimeout(limit)),
            None => {
                stopped.await;
                Ok(())
            }
        }
    }

    async fn ready(&self) -> Option<SocketAddr> {
        let mut state = self.state.subscribe();
        let current = *state
            .wait_for(|s| matches!(s, ListenerState::Serving(_) | ListenerState::Stopped))
            .await
            .ok()?;
        match current {
            ListenerState::Serving(addr) => Some(addr),
            _ => None,
        }
    }
}
