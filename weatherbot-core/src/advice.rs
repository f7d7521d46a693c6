//! Natural-language advice generation.
//!
//! The generator is polymorphic over availability: whether a Gemini key is
//! configured is decided once at startup, and the disabled variant always
//! answers with a placeholder. Neither variant ever fails upward; any
//! transport or parse failure degrades to an inline placeholder string so
//! the notification pipeline keeps going.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::fmt::Debug;
use std::time::Duration;
use tracing::warn;

use crate::{Config, model::ConditionsReport};

const GEMINI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Hourly notifications get a one-liner, daily ones the extended form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Short,
    Long,
}

#[async_trait]
pub trait AdviceGenerator: Send + Sync + Debug {
    /// Produce a recommendation for the report. Never fails: degraded
    /// output is a placeholder string.
    async fn advise(&self, report: &ConditionsReport, verbosity: Verbosity) -> String;
}

/// Construct the advisor from config, deciding availability once.
pub fn advisor_from_config(config: &Config) -> anyhow::Result<Box<dyn AdviceGenerator>> {
    Ok(match config.gemini_api_key.as_deref() {
        Some(key) => Box::new(GeminiAdvisor::new(key.to_owned())?),
        None => Box::new(DisabledAdvisor),
    })
}

/// Always-available fallback when no Gemini key is configured.
#[derive(Debug)]
pub struct DisabledAdvisor;

#[async_trait]
impl AdviceGenerator for DisabledAdvisor {
    async fn advise(&self, _report: &ConditionsReport, _verbosity: Verbosity) -> String {
        "<i>AI advice is not configured.</i>".to_string()
    }
}

#[derive(Debug)]
pub struct GeminiAdvisor {
    api_key: String,
    http: Client,
}

impl GeminiAdvisor {
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build HTTP client for Gemini")?;
        Ok(Self { api_key, http })
    }

    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let res = self
            .http
            .post(GEMINI_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            anyhow::bail!("Gemini request failed with status {status}");
        }

        let parsed: GeminiResponse = res.json().await?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text.trim().to_string())
            .ok_or_else(|| anyhow::anyhow!("Gemini response contained no candidates"))
    }
}

#[async_trait]
impl AdviceGenerator for GeminiAdvisor {
    async fn advise(&self, report: &ConditionsReport, verbosity: Verbosity) -> String {
        let prompt = build_prompt(report, verbosity);
        match self.generate(&prompt).await {
            Ok(text) => format!("<i>{text}</i>"),
            Err(err) => {
                warn!(error = %err, "advice generation degraded to placeholder");
                format!("<i>(advice error: {err})</i>")
            }
        }
    }
}

fn build_prompt(report: &ConditionsReport, verbosity: Verbosity) -> String {
    let instr = match verbosity {
        Verbosity::Short => "Write one short English sentence with advice.",
        Verbosity::Long => {
            "Write 2-4 sentences in English about weather and air quality advice."
        }
    };

    format!(
        "{instr}\nCity: {}\nTemp: {}°C — {}\nAQI: {} ({}); PM2.5: {} µg/m³; PM10: {} µg/m³",
        report.display_name,
        report.temperature,
        report.description,
        report.aqi_label,
        opt(report.aqi_index),
        opt(report.pm2_5),
        opt(report.pm10),
    )
}

fn opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: String,
}
