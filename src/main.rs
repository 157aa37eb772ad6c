//! ws-transport echo server
//!
//! Runs the transport stack end to end: a listening socket, an optional
//! TLS upgrade per connection, and an echo loop.
//!
//! ```text
//!     client ──TCP──▶ TransportSocket::accept
//!                         │
//!                         ▼
//!                    TlsUpgrader::authenticate  (when [tls] is configured)
//!                         │
//!                         ▼
//!                    receive ──▶ send  (until EOF or shutdown)
//! ```

use std::path::PathBuf;

use clap::Parser;

use ws_transport::config::{load_config, TransportConfig};
use ws_transport::lifecycle::{signals, Shutdown};
use ws_transport::observability::{logging, metrics};
use ws_transport::server::EchoServer;

#[derive(Debug, Parser)]
#[command(name = "ws-transport", version, about = "TCP/TLS echo server")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured bind address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => TransportConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("ws-transport v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = EchoServer::new(config)?;
    let listener = server.bind()?;
    tracing::info!(
        address = ?listener.local_addr(),
        tls = listener.identity().is_some(),
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match signals::wait_for_signal().await {
            Ok(()) => trigger.trigger(),
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    server.run(listener, shutdown).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
