//! Shared fixtures for shutdown integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use graceful_exit::http::Gate;
use graceful_exit::lifecycle::{ForcedExit, Terminator};
use graceful_exit::net::{Listener, ServerError};
use graceful_exit::{Deadline, Server, ShutdownCallback};

/// Something observable that happened during shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Stopped {
        server: String,
        all_gates_closed: bool,
    },
    Callback {
        name: String,
        deadline_expired: bool,
    },
}

/// Ordered record shared by every fixture in one test.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
    gates: Arc<Mutex<Vec<Gate>>>,
}

impl EventLog {
    pub fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn stops(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Stopped { server, .. } => Some(server),
                _ => None,
            })
            .collect()
    }

    pub fn callbacks(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Callback { name, .. } => Some(name),
                _ => None,
            })
            .collect()
    }

    fn watch_gate(&self, gate: Gate) {
        self.gates.lock().unwrap().push(gate);
    }

    fn all_gates_closed(&self) -> bool {
        self.gates.lock().unwrap().iter().all(Gate::is_closed)
    }
}

/// How a [`RecordingListener`] answers a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBehavior {
    Succeed,
    Fail,
    Hang,
}

/// Listener that serves nothing and records every stop request.
pub struct RecordingListener {
    name: String,
    log: EventLog,
    behavior: StopBehavior,
    stops: AtomicUsize,
    stopped: CancellationToken,
}

impl RecordingListener {
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Listener for RecordingListener {
    async fn serve(&self, _app: Router) -> Result<(), ServerError> {
        self.stopped.cancelled().await;
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ServerError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.log.push(Event::Stopped {
            server: self.name.clone(),
            all_gates_closed: self.log.all_gates_closed(),
        });

        match self.behavior {
            StopBehavior::Succeed => {
                self.stopped.cancel();
                Ok(())
            }
            StopBehavior::Fail => Err(ServerError::Io(std::io::Error::other("stop refused"))),
            StopBehavior::Hang => std::future::pending().await,
        }
    }
}

/// A server over a [`RecordingListener`] whose stops land in `log`.
pub fn recording_server(
    name: &str,
    log: &EventLog,
    behavior: StopBehavior,
) -> (Server, Arc<RecordingListener>) {
    let listener = Arc::new(RecordingListener {
        name: name.to_string(),
        log: log.clone(),
        behavior,
        stops: AtomicUsize::new(0),
        stopped: CancellationToken::new(),
    });
    let server = Server::with_listener(name, format!("mem://{name}"), listener.clone());
    log.watch_gate(server.gate().clone());
    (server, listener)
}

/// Servers that all stop cleanly.
pub fn fleet(names: &[&str], log: &EventLog) -> (Vec<Server>, Vec<Arc<RecordingListener>>) {
    names
        .iter()
        .map(|name| recording_server(name, log, StopBehavior::Succeed))
        .unzip()
}

/// Callback that records whether its deadline had already passed when it ran.
pub fn recording_callback(name: &str, log: &EventLog) -> ShutdownCallback {
    let name = name.to_string();
    let log = log.clone();
    ShutdownCallback::new(move |deadline: Deadline| {
        let name = name.clone();
        let log = log.clone();
        async move {
            log.push(Event::Callback {
                name,
                deadline_expired: deadline.is_expired(),
            });
        }
    })
}

/// Terminator that records forced exits instead of ending the test process.
#[derive(Debug, Clone, Default)]
pub struct RecordingTerminator(Arc<Mutex<Vec<ForcedExit>>>);

impl RecordingTerminator {
    pub fn reasons(&self) -> Vec<ForcedExit> {
        self.0.lock().unwrap().clone()
    }
}

impl Terminator for RecordingTerminator {
    fn terminate(&self, reason: ForcedExit) {
        self.0.lock().unwrap().push(reason);
    }
}
