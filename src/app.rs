//! The application: every hosted server plus the shutdown policy that binds them.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::ShutdownConfig;
use crate::http::Server;
use crate::lifecycle::callbacks::{CallbackExecutor, Deadline, ShutdownCallback};
use crate::lifecycle::shutdown::{Orchestrator, ShutdownPhase};
use crate::lifecycle::signals::{self, TerminationSignal, DEFAULT_SIGNALS};
use crate::lifecycle::startup;
use crate::lifecycle::watchdog::{ProcessExit, Terminator, Watchdog, WatchdogOutcome};
use crate::net::ServerError;

/// Builder for [`App`]. Every setting has a default.
#[derive(Debug)]
pub struct AppBuilder {
    servers: Vec<Server>,
    callbacks: Vec<ShutdownCallback>,
    shutdown_timeout: Duration,
    drain_wait: Duration,
    callback_timeout: Duration,
    release_pause: Duration,
    signals: Vec<TerminationSignal>,
}

impl AppBuilder {
    fn new(servers: Vec<Server>) -> Self {
        let defaults = ShutdownConfig::default();
        Self {
            servers,
            callbacks: Vec::new(),
            shutdown_timeout: defaults.timeout(),
            drain_wait: defaults.drain_wait(),
            callback_timeout: defaults.callback_timeout(),
            release_pause: defaults.release_pause(),
            signals: DEFAULT_SIGNALS.to_vec(),
        }
    }

    /// Take every shutdown setting from a loaded config.
    pub fn config(self, config: &ShutdownConfig) -> Self {
        self.shutdown_timeout(config.timeout())
            .drain_wait(config.drain_wait())
            .callback_timeout(config.callback_timeout())
            .release_pause(config.release_pause())
            .signals(&config.signals)
    }

    /// Overall deadline before the watchdog forces an exit.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Grace period between closing the gates and stopping the servers.
    pub fn drain_wait(mut self, wait: Duration) -> Self {
        self.drain_wait = wait;
        self
    }

    /// Advisory deadline given to each cleanup callback.
    pub fn callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    pub fn release_pause(mut self, pause: Duration) -> Self {
        self.release_pause = pause;
        self
    }

    pub fn signals(mut self, signals: &[TerminationSignal]) -> Self {
        self.signals = signals.to_vec();
        self
    }

    /// Register a cleanup callback.
    pub fn callback<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Deadline) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.callbacks.push(ShutdownCallback::new(f));
        self
    }

    pub fn callbacks(mut self, callbacks: impl IntoIterator<Item = ShutdownCallback>) -> Self {
        self.callbacks.extend(callbacks);
        self
    }

    pub fn build(self) -> App {
        let servers = self.servers.into_iter().map(Arc::new).collect();
        let executor = CallbackExecutor::new(self.callbacks, self.callback_timeout);
        App {
            orchestrator: Orchestrator::new(servers, executor, self.drain_wait, self.release_pause),
            shutdown_timeout: self.shutdown_timeout,
            signals: self.signals,
        }
    }
}

/// A process hosting several servers with one coordinated exit.
#[derive(Debug)]
pub struct App {
    orchestrator: Orchestrator,
    shutdown_timeout: Duration,
    signals: Vec<TerminationSignal>,
}

impl App {
    pub fn builder(servers: Vec<Server>) -> AppBuilder {
        AppBuilder::new(servers)
    }

    pub fn servers(&self) -> &[Arc<Server>] {
        self.orchestrator.servers()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    pub fn drain_wait(&self) -> Duration {
        self.orchestrator.drain_wait()
    }

    pub fn callback_timeout(&self) -> Duration {
        self.orchestrator.callback_timeout()
    }

    pub fn release_pause(&self) -> Duration {
        self.orchestrator.release_pause()
    }

    pub fn signals(&self) -> &[TerminationSignal] {
        &self.signals
    }

    pub fn phase(&self) -> ShutdownPhase {
        self.orchestrator.phase()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<ShutdownPhase> {
        self.orchestrator.subscribe()
    }

    /// Start every server on its own task.
    pub fn start_servers(&self) -> Vec<JoinHandle<Result<(), ServerError>>> {
        startup::spawn_servers(self.servers())
    }

    /// Run the graceful shutdown sequence (at most once).
    pub async fn shutdown(&self) {
        self.orchestrator.run().await
    }

    /// Start all servers, wait for an OS termination signal, then shut down.
    ///
    /// A second signal or an overrun of the shutdown timeout exits the
    /// process with a non-zero status.
    pub async fn start_and_serve(&self) -> std::io::Result<WatchdogOutcome> {
        let signals = signals::listen(&self.signals)?;
        Ok(self.serve_until(signals, ProcessExit).await)
    }

    /// [`App::start_and_serve`] with an injected signal source and terminator.
    pub async fn serve_until<T: Terminator>(
        &self,
        signals: mpsc::Receiver<TerminationSignal>,
        terminator: T,
    ) -> WatchdogOutcome {
        self.start_servers();
        Watchdog::new(self.shutdown_timeout, terminator)
            .run(signals, || self.shutdown())
            .await
    }
}
