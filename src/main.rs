//! Gridgrab Game Server
//!
//! Authoritative tick-based grid game server.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gridgrab::{config::ServerConfig, GameServer, VERSION};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,gridgrab=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("Gridgrab Server v{}", VERSION);

    let config = ServerConfig::load().await?;
    info!(
        "World {}x{} grid {} | tick {}ms | speed {}",
        config.game.world_width,
        config.game.world_height,
        config.game.grid_size,
        config.game.tick_interval_ms,
        config.game.player_speed_per_tick,
    );

    let server = Arc::new(GameServer::new(config));

    let signal_server = server.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                signal_server.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    server.run().await?;

    info!("Server stopped");
    Ok(())
}
