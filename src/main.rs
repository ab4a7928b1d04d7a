mod bot;
mod config;
#[cfg(test)]
mod fixtures;
mod jira;
mod matcher;
mod phabricator;
mod platform;
mod plugins;
mod reply;
mod shaper;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::Responder;
use crate::config::Config;
use crate::matcher::PatternTable;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rosencrantz=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  JIRA: {}", config.jira.server);
    if config.phabricator.is_configured() {
        info!("  Phabricator: {}", config.phabricator.url);
    }
    info!("  Allowed chats: {:?}", config.telegram.allowed_chat_ids);

    // Backend clients are built once here and shared by the plugins
    let plugins = plugins::build(&config).context("Failed to load plugins")?;
    let patterns = PatternTable::new(&config.jira.shorthand_project)?;
    let responder = Arc::new(Responder::new(patterns, plugins));
    info!("  Plugins: {}", responder.plugin_names().join(", "));

    let bot = teloxide::Bot::new(&config.telegram.bot_token);

    info!("Bot is starting...");
    platform::telegram::run(responder, config.telegram.allowed_chat_ids.clone(), bot).await?;

    Ok(())
}
