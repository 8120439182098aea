//! Pantry Pup
//!
//! Telegram entry point: loads configuration, opens storage, starts the
//! health endpoint and runs the bot.

use anyhow::Result;
use std::sync::Arc;
use teloxide::Bot;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pantry_pup::channel::telegram;
use pantry_pup::{BotConfig, CommandRouter, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pantry_pup=info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let config = BotConfig::from_env()?;
    let storage = Storage::open(&config.backend).await?;
    info!("🐶 Pantry Pup v{} starting ({} backend)", env!("CARGO_PKG_VERSION"), storage.backend());

    let backend = storage.backend();
    let health_addr = config.health_addr;
    tokio::spawn(async move {
        if let Err(e) = pantry_pup::server::serve_health(health_addr, backend).await {
            error!("Health endpoint stopped: {}", e);
        }
    });

    let router = Arc::new(CommandRouter::new(storage).with_defer_policy(config.defer_policy));
    telegram::run(Bot::new(config.telegram_token), router).await
}
