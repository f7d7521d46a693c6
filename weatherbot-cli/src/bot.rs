//! The Telegram command layer: parses inbound commands and calls into the
//! core's subscribe / unsubscribe / list entry points.
//!
//! Command syntax mirrors the classic weather-bot commands but is not
//! load-bearing; everything behind it goes through the core API.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use weatherbot_core::{
    AddOutcome, AdviceGenerator, BotError, ConditionsProvider, IdentityKey, Location,
    NotificationScheduler, RemoveOutcome, Subscription, SubscriptionKind, SubscriptionStore,
    Verbosity, pipeline::build_report_message,
};

use crate::telegram::{IncomingMessage, TelegramClient, Update};

const WELCOME: &str = "<b>Hi! 🌤 I'm your Weather Bot.</b>\n\n\
    <i>Use commands:</i>\n\
    /search &lt;city|lat,lon&gt;\n\
    /perhour &lt;city|lat,lon&gt;\n\
    /perday &lt;city|lat,lon&gt;\n\
    /subscriptions\n\n\
    You can also send your location.";

pub struct Bot {
    telegram: Arc<TelegramClient>,
    scheduler: Arc<NotificationScheduler>,
    provider: Arc<dyn ConditionsProvider>,
    advisor: Arc<dyn AdviceGenerator>,
    store: Arc<SubscriptionStore>,
}

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Start,
    Search(&'a str),
    Subscribe(SubscriptionKind, &'a str),
    Unsubscribe(SubscriptionKind, &'a str),
    Subscriptions,
    Usage(&'static str),
    Unknown,
}

fn parse_command(text: &str) -> Command<'_> {
    let trimmed = text.trim();
    let (head, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (trimmed, ""),
    };
    // Group chats address commands as /cmd@BotName.
    let head = head.split('@').next().unwrap_or(head);

    match head {
        "/start" | "/help" => Command::Start,
        "/search" => {
            arg_or_usage(rest, "Usage: /search London or /search 41.3,69.2", Command::Search)
        }
        "/perhour" => arg_or_usage(rest, "Usage: /perhour London or /perhour 41.3,69.2", |a| {
            Command::Subscribe(SubscriptionKind::Hourly, a)
        }),
        "/perhour_stop" => {
            arg_or_usage(rest, "Usage: /perhour_stop London or /perhour_stop 41.3,69.2", |a| {
                Command::Unsubscribe(SubscriptionKind::Hourly, a)
            })
        }
        "/perday" => arg_or_usage(rest, "Usage: /perday London or /perday 41.3,69.2", |a| {
            Command::Subscribe(SubscriptionKind::Daily, a)
        }),
        "/perday_stop" => {
            arg_or_usage(rest, "Usage: /perday_stop London or /perday_stop 41.3,69.2", |a| {
                Command::Unsubscribe(SubscriptionKind::Daily, a)
            })
        }
        "/subscriptions" => Command::Subscriptions,
        _ => Command::Unknown,
    }
}

fn arg_or_usage<'a>(
    rest: &'a str,
    usage: &'static str,
    make: impl FnOnce(&'a str) -> Command<'a>,
) -> Command<'a> {
    if rest.is_empty() { Command::Usage(usage) } else { make(rest) }
}

/// Parse an explicit `lat,lon` pair; the provider is only consulted for
/// free-text names.
fn parse_coords(input: &str) -> Option<Location> {
    let (lat, lon) = input.split_once(',')?;
    let latitude: f64 = lat.trim().parse().ok()?;
    let longitude: f64 = lon.trim().parse().ok()?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }
    Some(Location {
        latitude,
        longitude,
        display_name: format!("Coordinates: {latitude}, {longitude}"),
    })
}

pub(crate) async fn resolve_input(
    provider: &dyn ConditionsProvider,
    input: &str,
) -> Result<Location, BotError> {
    if let Some(location) = parse_coords(input) {
        return Ok(location);
    }
    provider
        .resolve(input)
        .await
        .map_err(BotError::Transport)?
        .ok_or_else(|| BotError::Resolution { query: input.to_string() })
}

impl Bot {
    pub fn new(
        telegram: Arc<TelegramClient>,
        scheduler: Arc<NotificationScheduler>,
        provider: Arc<dyn ConditionsProvider>,
        advisor: Arc<dyn AdviceGenerator>,
        store: Arc<SubscriptionStore>,
    ) -> Self {
        Self { telegram, scheduler, provider, advisor, store }
    }

    /// Long-poll loop; runs until the task is dropped.
    pub async fn run(&self) {
        // Commands queued while the bot was down are stale; start past them.
        let mut offset = match self.telegram.skip_pending().await {
            Ok(next) => next,
            Err(err) => {
                warn!(error = %err, "could not skip pending updates, starting from 0");
                0
            }
        };
        info!("bot polling started");

        loop {
            let updates = match self.telegram.get_updates(offset).await {
                Ok(updates) => updates,
                Err(err) => {
                    warn!(error = %err, "getUpdates failed, backing off");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            if let Some(next) = crate::telegram::next_offset(&updates) {
                offset = offset.max(next);
            }
            for update in updates {
                let Update { message: Some(message), .. } = update else { continue };
                self.handle_message(&message).await;
            }
        }
    }

    async fn handle_message(&self, message: &IncomingMessage) {
        let chat_id = message.chat.id;

        if let Some(shared) = &message.location {
            let location = Location {
                latitude: shared.latitude,
                longitude: shared.longitude,
                display_name: format!(
                    "Coordinates: {:.4}, {:.4}",
                    shared.latitude, shared.longitude
                ),
            };
            self.send_one_shot_report(chat_id, &location).await;
            return;
        }

        let Some(text) = &message.text else { return };

        match parse_command(text) {
            Command::Start => {
                self.reply_welcome(chat_id).await;
            }
            Command::Search(query) => match resolve_input(self.provider.as_ref(), query).await {
                Ok(location) => self.send_one_shot_report(chat_id, &location).await,
                Err(err) => self.reply(chat_id, &err.user_message()).await,
            },
            Command::Subscribe(kind, query) => self.subscribe(chat_id, kind, query).await,
            Command::Unsubscribe(kind, query) => self.unsubscribe(chat_id, kind, query).await,
            Command::Subscriptions => self.list_subscriptions(chat_id).await,
            Command::Usage(usage) => self.reply(chat_id, &format!("<i>{usage}</i>")).await,
            Command::Unknown => {}
        }
    }

    async fn subscribe(&self, chat_id: i64, kind: SubscriptionKind, query: &str) {
        let result = async {
            let location = resolve_input(self.provider.as_ref(), query).await?;
            // Capture the UTC offset once; it anchors the daily fire time.
            let current = self
                .provider
                .current(location.latitude, location.longitude)
                .await
                .map_err(BotError::Transport)?;

            let sub = Subscription {
                chat_id,
                location,
                kind,
                utc_offset_seconds: current.utc_offset_seconds,
                created_at: Utc::now(),
            };
            let display = sub.location.display_name.clone();
            let outcome = self.scheduler.subscribe(sub)?;
            Ok::<_, BotError>((outcome, display))
        }
        .await;

        let reply = match result {
            Ok((AddOutcome::Added, display)) => {
                info!(chat_id, kind = %kind, "subscription added");
                format!("✅ Subscribed to <b>{kind}</b> updates for <i>{display}</i>.")
            }
            Ok((AddOutcome::Duplicate, display)) => {
                format!("<i>You are already subscribed to {kind} updates for {display}.</i>")
            }
            Err(err) => err.user_message(),
        };
        self.reply(chat_id, &reply).await;
    }

    async fn unsubscribe(&self, chat_id: i64, kind: SubscriptionKind, query: &str) {
        let result = async {
            let location = resolve_input(self.provider.as_ref(), query).await?;
            let key = IdentityKey { chat_id, location: location.key(), kind };
            let outcome = self.scheduler.unsubscribe(&key)?;
            Ok::<_, BotError>((outcome, location.display_name))
        }
        .await;

        let reply = match result {
            Ok((RemoveOutcome::Removed, display)) => {
                info!(chat_id, kind = %kind, "subscription removed");
                format!("🛑 Stopped <b>{kind}</b> updates for <i>{display}</i>.")
            }
            Ok((RemoveOutcome::NotFound, display)) => {
                format!("<i>No {kind} subscription found for {display}.</i>")
            }
            Err(err) => err.user_message(),
        };
        self.reply(chat_id, &reply).await;
    }

    async fn list_subscriptions(&self, chat_id: i64) {
        let subs = self.store.list(Some(chat_id));
        let reply = if subs.is_empty() {
            "<i>No active subscriptions.</i>".to_string()
        } else {
            let mut lines = vec!["<b>Your subscriptions:</b>".to_string()];
            for sub in subs {
                lines.push(format!("• <i>{}</i> — {}", sub.location.display_name, sub.kind));
            }
            lines.join("\n")
        };
        self.reply(chat_id, &reply).await;
    }

    async fn send_one_shot_report(&self, chat_id: i64, location: &Location) {
        let reply = match build_report_message(
            self.provider.as_ref(),
            self.advisor.as_ref(),
            location.latitude,
            location.longitude,
            &location.display_name,
            Verbosity::Long,
        )
        .await
        {
            Ok(message) => message,
            Err(err) => err.user_message(),
        };
        self.reply(chat_id, &reply).await;
    }

    async fn reply_welcome(&self, chat_id: i64) {
        if let Err(err) = self
            .telegram
            .send_message_with_location_keyboard(chat_id, WELCOME)
            .await
        {
            warn!(chat_id, error = %err, "welcome message failed");
        }
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(err) = self.telegram.send_message(chat_id, text).await {
            warn!(chat_id, error = %err, "reply failed");
        }
    }
}
