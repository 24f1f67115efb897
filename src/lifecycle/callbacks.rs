//! Cleanup callbacks run near the end of shutdown.
//!
//! Every callback runs on its own task with its own [`Deadline`]. The
//! deadline is advisory: a callback that ignores it keeps running and the
//! executor keeps waiting for it. There is no result channel; the executor
//! cannot tell a callback that succeeded from one that gave up.

use futures_util::future::{join_all, BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Cancellable deadline handed to a cleanup callback.
///
/// Cancelled when the deadline passes or when the executor releases it
/// after the callback returns, whichever comes first.
#[derive(Debug, Clone)]
pub struct Deadline {
    at: Instant,
    token: CancellationToken,
}

impl Deadline {
    /// Start a deadline `timeout` from now.
    ///
    /// Dropping the returned guard releases the deadline (cancels the token
    /// and stops its timer).
    pub fn new(timeout: Duration) -> (Self, DropGuard) {
        let now = Instant::now();
        let at = now.checked_add(timeout).unwrap_or_else(|| far_future(now));
        let token = CancellationToken::new();

        if timeout.is_zero() {
            token.cancel();
        } else {
            let timer = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = time::sleep_until(at) => timer.cancel(),
                    _ = timer.cancelled() => {}
                }
            });
        }

        (
            Self {
                at,
                token: token.clone(),
            },
            token.drop_guard(),
        )
    }

    pub fn at(&self) -> Instant {
        self.at
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// The clock has reached the deadline.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Expired or released.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the deadline expires or is released.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Token for handing to code that already speaks `CancellationToken`.
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Run `fut` unless the deadline fires first.
    pub async fn within<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            output = fut => Some(output),
            _ = self.token.cancelled() => None,
        }
    }
}

/// Roughly 30 years out; stands in for deadlines past `Instant`'s range.
fn far_future(now: Instant) -> Instant {
    now + Duration::from_secs(86400 * 365 * 30)
}

type CallbackFn = dyn Fn(Deadline) -> BoxFuture<'static, ()> + Send + Sync;

/// User-supplied cleanup work.
#[derive(Clone)]
pub struct ShutdownCallback {
    f: Arc<CallbackFn>,
}

impl ShutdownCallback {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Deadline) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            f: Arc::new(move |deadline| f(deadline).boxed()),
        }
    }

    fn invoke(&self, deadline: Deadline) -> BoxFuture<'static, ()> {
        (self.f)(deadline)
    }
}

impl std::fmt::Debug for ShutdownCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ShutdownCallback")
    }
}

/// Runs every registered callback concurrently, each under its own deadline.
#[derive(Debug, Clone)]
pub struct CallbackExecutor {
    callbacks: Vec<ShutdownCallback>,
    timeout: Duration,
}

impl CallbackExecutor {
    pub fn new(callbacks: Vec<ShutdownCallback>, timeout: Duration) -> Self {
        Self { callbacks, timeout }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Invoke each callback once and wait for all of them to return.
    pub async fn run(&self) {
        let workers = self.callbacks.iter().cloned().map(|callback| {
            let timeout = self.timeout;
            tokio::spawn(async move {
                let (deadline, release) = Deadline::new(timeout);
                callback.invoke(deadline).await;
                drop(release);
            })
        });

        for (index, result) in join_all(workers).await.into_iter().enumerate() {
            if let Err(e) = result {
                tracing::debug!(callback = index, error = %e, "Cleanup callback did not finish");
            }
        }
    }
}
