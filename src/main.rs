
mod classify;
mod communication_channel;
mod config;
mod conversation_manager;
mod discord_manager;
mod error;
mod staff_alert;
mod support;
mod template;
mod timer;

use std::env;
use std::sync::Arc;

use dotenvy::dotenv;
use serenity::gateway::GatewayError;
use serenity::prelude::*;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::communication_channel::ChannelEvent;
use crate::config::{config_from_env, Policy};
use crate::discord_manager::{DiscordManager, Handler};
use crate::error::ConfigError;
use crate::support::Support;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_result = dotenv();
    init_tracing();
    if let Err(why) = dotenv_result {
        tracing::debug!(error = %why, "no .env file loaded");
    }

    let token = env::var("DISCORD_TOKEN").map_err(|_| ConfigError::MissingVar("DISCORD_TOKEN"))?;
    let policy = Policy::from_config(config_from_env()?)?;
    if policy.trusted_agents.is_empty() {
        tracing::warn!("no trusted agents configured, every sender is treated as a customer");
    }

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;
    let mut client = Client::builder(&token, intents)
        .event_handler(Handler::new(events_tx.clone()))
        .await?;

    let discord = DiscordManager::new(
        Arc::clone(&client.cache_and_http.http),
        Arc::clone(&client.cache_and_http.cache),
    );
    let support = Support::new(policy, Arc::new(discord));
    let engine = tokio::spawn(support.run(events_rx));

    let result = client.start().await;
    if let Err(SerenityError::Gateway(GatewayError::InvalidAuthentication)) = &result {
        let _ = events_tx.send(ChannelEvent::AuthFailure);
    }
    drop(events_tx);
    drop(client);
    if let Err(why) = engine.await {
        tracing::error!(error = %why, "escalation engine task failed");
    }

    result.map_err(|why| {
        tracing::error!(error = %why, "an error occurred while running the client");
        why.into()
    })
}
