//! Minigame Host
//!
//! Serves the host process over WebSocket. Configured through `MINIGAME_*`
//! environment variables; log level through `RUST_LOG`.

use tracing::info;
use tracing_subscriber::EnvFilter;

use minigame_host::{HostServer, ServerConfig, VERSION};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_env();
    info!("Minigame Host v{}", VERSION);
    info!("Frame Rate: {} Hz", config.frame_rate);

    let server = HostServer::new(config);
    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    Ok(())
}
