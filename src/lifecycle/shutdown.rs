//! Shutdown orchestration across every hosted server.
//!
//! # Phases
//! ```text
//! Running → GateClosed → Draining → Stopping → CallbacksRunning → ResourceRelease → Terminated
//! ```
//! Each phase ends at a barrier: nothing from the next phase starts while
//! work from the current one is pending. Failures are logged and never stop
//! the sequence.

use futures_util::future::join_all;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::http::Server;
use crate::lifecycle::callbacks::CallbackExecutor;
use crate::observability::metrics;

/// Where the shutdown sequence currently is.
///
/// `GateClosed` is published once every gate is closed; every later phase is
/// published as it is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShutdownPhase {
    Running,
    GateClosed,
    Draining,
    Stopping,
    CallbacksRunning,
    ResourceRelease,
    Terminated,
}

impl ShutdownPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ShutdownPhase::Running => "running",
            ShutdownPhase::GateClosed => "gate_closed",
            ShutdownPhase::Draining => "draining",
            ShutdownPhase::Stopping => "stopping",
            ShutdownPhase::CallbacksRunning => "callbacks_running",
            ShutdownPhase::ResourceRelease => "resource_release",
            ShutdownPhase::Terminated => "terminated",
        }
    }
}

impl fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives the phase sequence. Runs at most once.
pub struct Orchestrator {
    servers: Vec<Arc<Server>>,
    executor: CallbackExecutor,
    drain_wait: Duration,
    release_pause: Duration,
    phase: watch::Sender<ShutdownPhase>,
    started: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        servers: Vec<Arc<Server>>,
        executor: CallbackExecutor,
        drain_wait: Duration,
        release_pause: Duration,
    ) -> Self {
        Self {
            servers,
            executor,
            drain_wait,
            release_pause,
            phase: watch::channel(ShutdownPhase::Running).0,
            started: AtomicBool::new(false),
        }
    }

    pub fn servers(&self) -> &[Arc<Server>] {
        &self.servers
    }

    pub fn drain_wait(&self) -> Duration {
        self.drain_wait
    }

    pub fn callback_timeout(&self) -> Duration {
        self.executor.timeout()
    }

    pub fn release_pause(&self) -> Duration {
        self.release_pause
    }

    pub fn phase(&self) -> ShutdownPhase {
        *self.phase.borrow()
    }

    /// Follow phase transitions as they happen.
    pub fn subscribe(&self) -> watch::Receiver<ShutdownPhase> {
        self.phase.subscribe()
    }

    /// Run the whole sequence. A second call returns immediately.
    pub async fn run(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            tracing::warn!("Shutdown already started, ignoring");
            return;
        }

        tracing::info!(servers = self.servers.len(), "Shutting down, rejecting new requests");
        let started = Instant::now();
        for server in &self.servers {
            server.trip_gate();
        }
        self.publish(ShutdownPhase::GateClosed);
        metrics::record_phase(ShutdownPhase::GateClosed.as_str(), started);

        self.step(ShutdownPhase::Draining, async {
            tracing::info!(wait = ?self.drain_wait, "Waiting for in-flight requests");
            if !self.drain_wait.is_zero() {
                tokio::time::sleep(self.drain_wait).await;
            }
        })
        .await;

        self.step(ShutdownPhase::Stopping, self.stop_servers()).await;

        self.step(ShutdownPhase::CallbacksRunning, async {
            tracing::info!(
                callbacks = self.executor.len(),
                timeout = ?self.executor.timeout(),
                "Running cleanup callbacks"
            );
            self.executor.run().await;
        })
        .await;

        self.step(ShutdownPhase::ResourceRelease, async {
            tracing::info!("Releasing resources");
            if !self.release_pause.is_zero() {
                tokio::time::sleep(self.release_pause).await;
            }
        })
        .await;

        self.publish(ShutdownPhase::Terminated);
        tracing::info!("Shutdown complete");
    }

    fn publish(&self, phase: ShutdownPhase) {
        self.phase.send_replace(phase);
        tracing::debug!(phase = %phase, "Shutdown phase");
    }

    async fn step<F: Future<Output = ()>>(&self, phase: ShutdownPhase, work: F) {
        self.publish(phase);

        let started = Instant::now();
        work.await;
        metrics::record_phase(phase.as_str(), started);
    }

    /// One task per server; waits for all of them whatever they return.
    async fn stop_servers(&self) {
        tracing::info!(servers = self.servers.len(), "Stopping servers");

        let workers = self.servers.iter().cloned().map(|server| {
            tokio::spawn(async move {
                if let Err(e) = server.stop().await {
                    tracing::error!(server = %server.name(), error = %e, "Failed to stop server");
                    metrics::record_stop_failure(server.name());
                }
            })
        });

        for (server, result) in self.servers.iter().zip(join_all(workers).await) {
            if let Err(e) = result {
                tracing::error!(server = %server.name(), error = %e, "Stop task panicked");
                metrics::record_stop_failure(server.name());
            }
        }
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("servers", &self.servers)
            .field("callbacks", &self.executor.len())
            .field("drain_wait", &self.drain_wait)
            .field("release_pause", &self.release_pause)
            .field("phase", &self.phase())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::callbacks::ShutdownCallback;
    use crate::net::{Listener, ServerError};
    use async_trait::async_trait;
    use axum::Router;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Counts stops; never serves.
    #[derive(Default)]
    struct CountingListener {
        stops: AtomicUsize,
    }

    #[async_trait]
    impl Listener for CountingListener {
        async fn serve(&self, _app: Router) -> Result<(), ServerError> {
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), ServerError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn servers(n: usize) -> (Vec<Arc<Server>>, Vec<Arc<CountingListener>>) {
        let listeners: Vec<_> = (0..n).map(|_| Arc::new(CountingListener::default())).collect();
        let servers = listeners
            .iter()
            .enumerate()
            .map(|(i, l)| {
                Arc::new(Server::with_listener(
                    format!("s{i}"),
                    format!("127.0.0.1:{}", 9000 + i),
                    l.clone(),
                ))
            })
            .collect();
        (servers, listeners)
    }

    #[tokio::test(start_paused = true)]
    async fn test_phases_move_forward() {
        let (servers, _) = servers(2);
        let orchestrator = Orchestrator::new(
            servers,
            CallbackExecutor::new(Vec::new(), Duration::from_secs(3)),
            Duration::from_secs(10),
            Duration::from_secs(1),
        );
        let mut phases = orchestrator.subscribe();
        assert_eq!(orchestrator.phase(), ShutdownPhase::Running);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = seen.clone();
        let watcher = tokio::spawn(async move {
            while phases.changed().await.is_ok() {
                let phase = *phases.borrow_and_update();
                record.lock().unwrap().push(phase);
                if phase == ShutdownPhase::Terminated {
                    break;
                }
            }
        });

        orchestrator.run().await;
        watcher.await.unwrap();

        assert_eq!(orchestrator.phase(), ShutdownPhase::Terminated);

        // A watch channel may coalesce phases that pass without yielding,
        // but what is observed must move strictly forward.
        let seen = seen.lock().unwrap().clone();
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]), "{seen:?}");
        assert!(seen.contains(&ShutdownPhase::Draining));
        assert!(seen.contains(&ShutdownPhase::ResourceRelease));
        assert_eq!(seen.last(), Some(&ShutdownPhase::Terminated));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_and_release_timing() {
        let (servers, _) = servers(1);
        let orchestrator = Orchestrator::new(
            servers,
            CallbackExecutor::new(Vec::new(), Duration::from_secs(3)),
            Duration::from_secs(10),
            Duration::from_secs(1),
        );

        let start = tokio::time::Instant::now();
        orchestrator.run().await;
        assert_eq!(start.elapsed(), Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_drain_passes_immediately() {
        let (servers, _) = servers(3);
        let orchestrator = Orchestrator::new(
            servers,
            CallbackExecutor::new(Vec::new(), Duration::ZERO),
            Duration::ZERO,
            Duration::ZERO,
        );

        let start = tokio::time::Instant::now();
        orchestrator.run().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_at_most_once() {
        let (servers, listeners) = servers(2);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let callback = ShutdownCallback::new(move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        let orchestrator = Orchestrator::new(
            servers,
            CallbackExecutor::new(vec![callback], Duration::from_secs(1)),
            Duration::ZERO,
            Duration::ZERO,
        );

        orchestrator.run().await;
        orchestrator.run().await;

        for listener in &listeners {
            assert_eq!(listener.stops.load(Ordering::SeqCst), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for server in orchestrator.servers() {
            assert!(server.gate().is_closed());
        }
    }

    /// Stops after a fixed delay.
    struct SlowListener(Duration);

    #[async_trait]
    impl Listener for SlowListener {
        async fn serve(&self, _app: Router) -> Result<(), ServerError> {
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), ServerError> {
            tokio::time::sleep(self.0).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_servers_stop_concurrently() {
        let servers = (0..3)
            .map(|i| {
                let listener = Arc::new(SlowListener(Duration::from_secs(5)));
                Arc::new(Server::with_listener(format!("s{i}"), "mem", listener))
            })
            .collect();
        let orchestrator = Orchestrator::new(
            servers,
            CallbackExecutor::new(Vec::new(), Duration::ZERO),
            Duration::ZERO,
            Duration::ZERO,
        );

        let start = tokio::time::Instant::now();
        orchestrator.run().await;
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_gate_closed_published_after_every_gate_closes() {
        let (servers, _) = servers(16);
        let orchestrator = Arc::new(Orchestrator::new(
            servers,
            CallbackExecutor::new(Vec::new(), Duration::ZERO),
            Duration::ZERO,
            Duration::ZERO,
        ));

        let mut phases = orchestrator.subscribe();
        let observed = orchestrator.clone();
        let watcher = tokio::spawn(async move {
            phases
                .wait_for(|p| *p >= ShutdownPhase::GateClosed)
                .await
                .unwrap();
            observed.servers().iter().all(|s| s.gate().is_closed())
        });

        orchestrator.run().await;
        assert!(watcher.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_servers_no_callbacks() {
        let orchestrator = Orchestrator::new(
            Vec::new(),
            CallbackExecutor::new(Vec::new(), Duration::from_secs(3)),
            Duration::ZERO,
            Duration::ZERO,
        );
        orchestrator.run().await;
        assert_eq!(orchestrator.phase(), ShutdownPhase::Terminated);
    }

    #[test]
    fn test_phase_order() {
        assert!(ShutdownPhase::Running < ShutdownPhase::GateClosed);
        assert!(ShutdownPhase::ResourceRelease < ShutdownPhase::Terminated);
        assert_eq!(ShutdownPhase::CallbacksRunning.to_string(), "callbacks_running");
    }
}
