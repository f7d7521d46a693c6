//! Shared stubs for the external collaborators, used across module tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;

use crate::{
    advice::{AdviceGenerator, Verbosity},
    model::{AirQuality, ConditionsReport, CurrentConditions, ForecastSample, Location},
    pipeline::Delivery,
    provider::ConditionsProvider,
};

/// Canned conditions provider; `offline()` fails every call like an
/// unreachable upstream.
#[derive(Debug)]
pub(crate) struct StubProvider {
    fail: bool,
    utc_offset_seconds: i32,
}

impl StubProvider {
    pub(crate) fn healthy() -> Self {
        Self { fail: false, utc_offset_seconds: 18_000 }
    }

    pub(crate) fn offline() -> Self {
        Self { fail: true, utc_offset_seconds: 18_000 }
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("stub provider offline");
        }
        Ok(())
    }
}

#[async_trait]
impl ConditionsProvider for StubProvider {
    async fn resolve(&self, query: &str) -> anyhow::Result<Option<Location>> {
        self.check()?;
        if query.eq_ignore_ascii_case("nowhere") {
            return Ok(None);
        }
        Ok(Some(Location {
            latitude: 41.2995,
            longitude: 69.2401,
            display_name: "Tashkent, UZ".into(),
        }))
    }

    async fn current(&self, _lat: f64, _lon: f64) -> anyhow::Result<CurrentConditions> {
        self.check()?;
        Ok(CurrentConditions {
            temperature: 23.5,
            description: "scattered clouds".into(),
            utc_offset_seconds: self.utc_offset_seconds,
        })
    }

    async fn air_quality(&self, _lat: f64, _lon: f64) -> anyhow::Result<AirQuality> {
        self.check()?;
        Ok(AirQuality { index: Some(2), pm2_5: Some(8.4), pm10: Some(12.1) })
    }

    async fn forecast(&self, _lat: f64, _lon: f64) -> anyhow::Result<Vec<ForecastSample>> {
        self.check()?;
        // 16 samples, 3 hours apart, starting now: covers today and tomorrow.
        let start = Utc::now();
        Ok((0..16)
            .map(|i| ForecastSample {
                timestamp: start + Duration::hours(3 * i),
                temperature: 20.0 + i as f64,
                description: "clear sky".into(),
            })
            .collect())
    }
}

/// Advisor returning a fixed string, so tests can assert the message shape.
#[derive(Debug)]
pub(crate) struct StaticAdvisor;

#[async_trait]
impl AdviceGenerator for StaticAdvisor {
    async fn advise(&self, _report: &ConditionsReport, _verbosity: Verbosity) -> String {
        "<i>stub advice</i>".to_string()
    }
}

/// Captures sent messages; `failing()` rejects every send.
#[derive(Debug, Default)]
pub(crate) struct RecordingDelivery {
    fail: bool,
    sent: Mutex<Vec<(i64, String)>>,
}

impl RecordingDelivery {
    pub(crate) fn failing() -> Self {
        Self { fail: true, sent: Mutex::new(Vec::new()) }
    }

    pub(crate) fn take(&self) -> Vec<(i64, String)> {
        std::mem::take(&mut *self.sent.lock())
    }
}

#[async_trait]
impl Delivery for RecordingDelivery {
    async fn send(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("stub delivery refused");
        }
        self.sent.lock().push((chat_id, text.to_string()));
        Ok(())
    }
}
