use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

use weatherbot_core::{
    Config, NotificationScheduler, SubscriptionStore, Verbosity, advisor_from_config,
    pipeline::build_report_message, provider_from_config,
};

use crate::{bot::Bot, telegram::TelegramClient};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherbot", version, about = "Weather notification bot")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials (Telegram token, OpenWeather key, optional Gemini key).
    Configure,

    /// Print a one-shot report for a location and exit.
    Show {
        /// City name or "lat,lon".
        location: String,
    },

    /// Run the bot: rehydrate subscriptions and start polling.
    Run,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { location } => show(&location).await,
            Command::Run => run_bot().await,
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let telegram = inquire::Text::new("Telegram bot token:")
        .with_initial_value(config.telegram_token.as_deref().unwrap_or(""))
        .prompt()
        .context("Failed to read Telegram token")?;
    let openweather = inquire::Text::new("OpenWeather API key:")
        .with_initial_value(config.openweather_api_key.as_deref().unwrap_or(""))
        .prompt()
        .context("Failed to read OpenWeather key")?;
    let gemini = inquire::Text::new("Gemini API key (empty to disable AI advice):")
        .with_initial_value(config.gemini_api_key.as_deref().unwrap_or(""))
        .prompt()
        .context("Failed to read Gemini key")?;

    config.telegram_token = non_empty(telegram);
    config.openweather_api_key = non_empty(openweather);
    config.gemini_api_key = non_empty(gemini);
    config.save()?;

    println!("Saved to {}", Config::config_file_path()?.display());
    Ok(())
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

async fn show(location: &str) -> anyhow::Result<()> {
    let config = Config::load()?;
    let provider = provider_from_config(&config)?;
    let advisor = advisor_from_config(&config)?;

    let resolved = crate::bot::resolve_input(provider.as_ref(), location)
        .await
        .map_err(|err| anyhow::anyhow!("{err}"))?;

    let message = build_report_message(
        provider.as_ref(),
        advisor.as_ref(),
        resolved.latitude,
        resolved.longitude,
        &resolved.display_name,
        Verbosity::Long,
    )
    .await
    .map_err(|err| anyhow::anyhow!("{err}"))?;

    println!("{}", strip_html(&message));
    Ok(())
}

/// The report is rendered with Telegram HTML tags; drop them for stdout.
fn strip_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.replace("&lt;", "<").replace("&gt;", ">").replace("&amp;", "&")
}

async fn run_bot() -> anyhow::Result<()> {
    let config = Config::load()?;

    let telegram = Arc::new(TelegramClient::new(config.telegram_token()?)?);
    let provider: Arc<dyn weatherbot_core::ConditionsProvider> =
        Arc::from(provider_from_config(&config)?);
    let advisor: Arc<dyn weatherbot_core::AdviceGenerator> =
        Arc::from(advisor_from_config(&config)?);

    let store_path = config.subscriptions_path()?;
    let store = Arc::new(SubscriptionStore::open(&store_path)?);
    info!(store = %store_path.display(), "subscription store opened");

    let scheduler = Arc::new(NotificationScheduler::new(
        Arc::clone(&store),
        Arc::clone(&provider),
        Arc::clone(&advisor),
        Arc::clone(&telegram) as Arc<dyn weatherbot_core::Delivery>,
    ));
    scheduler.rehydrate();

    let bot = Bot::new(telegram, Arc::clone(&scheduler), provider, advisor, store);

    tokio::select! {
        _ = bot.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    scheduler.shutdown();
    Ok(())
}
