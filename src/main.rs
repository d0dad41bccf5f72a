mod answer;
mod config;
mod platform;
mod relay;
mod typing;

use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::relay::Relay;

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets usually live in a .env file next to the binary
    let dotenv_path = dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,shavira_bot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(path) = dotenv_path {
        info!("Loaded environment from: {}", path.display());
    }

    let config = Config::load().context("Failed to load configuration")?;

    info!("Configuration loaded successfully");
    info!("  Answer API: {}", config.api.url);
    info!("  Request timeout: {:?}", config.api.request_timeout());
    info!("  Typing interval: {:?}", config.typing.interval());

    let bot = Bot::new(&config.telegram.bot_token);
    let relay = Arc::new(Relay::new(config)?);

    info!("Bot is running...");
    platform::telegram::run(relay, bot).await?;

    Ok(())
}
