//! Relay server binary.
//!
//! Entry point for the notification WebSocket server and trigger API.

use anyhow::Context;
use printrelay_relay::{Relay, RelayConfig, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,printrelay_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RelayConfig::from_env().context("loading relay configuration")?;

    tracing::info!(
        "Starting print relay on {}:{} (public {})",
        config.host,
        config.port,
        config.public_url
    );

    Server::new(Relay::new(config)).run().await?;

    Ok(())
}
