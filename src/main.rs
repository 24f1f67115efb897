//! graceful-exit: hosts the configured HTTP servers and shuts them down together.
//!
//! # Shutdown Overview
//!
//! ```text
//!   SIGINT/SIGTERM ──▶ watchdog ──┬──▶ forced-exit race (2nd signal | timeout) ──▶ exit(1)
//!                                 │
//!                                 ▼
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │ close gates ──▶ drain ──▶ stop servers ──▶ callbacks ──▶ release     │
//!   │ (503 from now)  (sleep)   (concurrent)     (deadline each) (pause)   │
//!   └──────────────────────────────────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//!                              exit(0)
//! ```

use axum::routing::get;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use graceful_exit::config::{load_config, AppConfig, ServerConfig};
use graceful_exit::lifecycle::Deadline;
use graceful_exit::observability::{logging, metrics};
use graceful_exit::{App, Server};

#[derive(Parser)]
#[command(name = "graceful-exit")]
#[command(about = "Host HTTP servers with one coordinated graceful shutdown", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured log level.
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if config.servers.is_empty() {
        config.servers.push(ServerConfig {
            name: "default".to_string(),
            bind_address: "0.0.0.0:8080".to_string(),
            grace_limit_secs: None,
        });
    }

    logging::init(cli.log_level.as_deref().unwrap_or(&config.observability.log_level));
    tracing::info!("graceful-exit v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        servers = config.servers.len(),
        timeout_secs = config.shutdown.timeout_secs,
        drain_secs = config.shutdown.drain_secs,
        callback_timeout_secs = config.shutdown.callback_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let servers = config.servers.iter().map(demo_server).collect();
    let app = App::builder(servers)
        .config(&config.shutdown)
        .callback(flush_demo)
        .build();

    app.start_and_serve().await?;

    tracing::info!("Exiting");
    Ok(())
}

/// A server answering with its own name, plus a slow route for watching the drain.
fn demo_server(config: &ServerConfig) -> Server {
    let mut server = Server::from_config(config);
    let name = config.name.clone();
    server
        .handle("/", get(move || async move { name }))
        .handle(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                "done"
            }),
        );
    server
}

async fn flush_demo(deadline: Deadline) {
    let flushed = deadline
        .within(tokio::time::sleep(Duration::from_millis(200)))
        .await
        .is_some();
    tracing::info!(flushed, remaining = ?deadline.remaining(), "Demo cleanup finished");
}
