//! Server start-up.
//!
//! # Design Decisions
//! - Each server serves on its own task, independent of the others
//! - A server that fails to start is logged (by `Server::start`) and does not
//!   affect its siblings or a later shutdown

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::http::Server;
use crate::net::ServerError;

/// Spawn `start()` for every server.
pub fn spawn_servers(servers: &[Arc<Server>]) -> Vec<JoinHandle<Result<(), ServerError>>> {
    servers
        .iter()
        .cloned()
        .map(|server| tokio::spawn(async move { server.start().await }))
        .collect()
}
