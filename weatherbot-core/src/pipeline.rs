//! The per-tick notification pipeline: fetch conditions, segment the
//! forecast, compose the report, attach advice, send.

use async_trait::async_trait;
use chrono::Utc;
use std::fmt::Debug;
use tracing::warn;

use crate::{
    advice::{AdviceGenerator, Verbosity},
    error::BotError,
    model::{Subscription, SubscriptionKind},
    provider::ConditionsProvider,
    report, segment,
};

/// Outbound message channel. Fire-and-forget from the core's perspective:
/// a delivery failure is logged, never retried.
#[async_trait]
pub trait Delivery: Send + Sync + Debug {
    async fn send(&self, chat_id: i64, text: &str) -> anyhow::Result<()>;
}

/// Build the full notification text for a coordinate: rendered report plus
/// the AI recommendation section.
///
/// Segmentation uses the UTC offset the provider reports right now, not a
/// stored one, so the report's notion of "local" tracks the provider.
pub async fn build_report_message(
    provider: &dyn ConditionsProvider,
    advisor: &dyn AdviceGenerator,
    latitude: f64,
    longitude: f64,
    display_name: &str,
    verbosity: Verbosity,
) -> Result<String, BotError> {
    let current = provider
        .current(latitude, longitude)
        .await
        .map_err(BotError::Transport)?;
    let air = provider
        .air_quality(latitude, longitude)
        .await
        .map_err(BotError::Transport)?;
    let series = provider
        .forecast(latitude, longitude)
        .await
        .map_err(BotError::Transport)?;

    let now = Utc::now();
    let segments = segment::pick_day_segments(&series, current.utc_offset_seconds, now);
    let (rendered, record) = report::compose(display_name, &current, &air, segments, now);

    let advice = advisor.advise(&record, verbosity).await;

    Ok(format!("{rendered}\n\n🤖 <b>AI Recommendation:</b>\n{advice}"))
}

/// Run one tick for a subscription. Transport failures bubble up for the
/// scheduler to convert into a best-effort error notification; a failed
/// send does not.
pub async fn run_tick(
    provider: &dyn ConditionsProvider,
    advisor: &dyn AdviceGenerator,
    delivery: &dyn Delivery,
    sub: &Subscription,
) -> Result<(), BotError> {
    let verbosity = match sub.kind {
        SubscriptionKind::Hourly => Verbosity::Short,
        SubscriptionKind::Daily => Verbosity::Long,
    };

    let message = build_report_message(
        provider,
        advisor,
        sub.location.latitude,
        sub.location.longitude,
        &sub.location.display_name,
        verbosity,
    )
    .await?;

    if let Err(err) = delivery.send(sub.chat_id, &message).await {
        warn!(chat_id = sub.chat_id, error = %err, "notification delivery failed");
    }

    Ok(())
}
