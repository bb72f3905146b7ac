//! lifed - 3D Life snapshot server
//!
//! Every WebSocket client gets its own universe, seeded with the configured
//! pattern and pushed to it as JSON once per frame.
//!
//! Settings come from `LIFED_CONFIG` (or `config.json` in the OS config
//! directory under `lifed/`) and `LIFED_*` environment variables.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod paths;
mod session;

use config::LifedConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(LifedConfig::load()?);
    info!(
        size = config.size,
        pattern = %config.pattern,
        rule = %config.rule,
        fps = config.fps,
        "universe settings"
    );

    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C: shutting down");
            std::process::exit(0);
        }
    });

    let listener = TcpListener::bind(config.addr).await?;
    info!("lifed listening on ws://{}{}", config.addr, config.path);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Accept failed: {}", e);
                continue;
            }
        };
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            if let Err(e) = session::serve(stream, peer, config).await {
                error!(%peer, "Client handler error: {}", e);
            }
        });
    }
}
