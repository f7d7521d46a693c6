use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::model::{AirQuality, CurrentConditions, ForecastSample, Location};

use super::ConditionsProvider;

const GEOCODE_URL: &str = "http://api.openweathermap.org/geo/1.0/direct";
const CURRENT_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const AIR_URL: &str = "http://api.openweathermap.org/data/2.5/air_pollution";
const FORECAST_URL: &str = "https://api.openweathermap.org/data/2.5/forecast";

const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build HTTP client for OpenWeather")?;

        Ok(Self { api_key, http })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        what: &str,
    ) -> Result<T> {
        let res = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to send request to OpenWeather ({what})"))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .with_context(|| format!("Failed to read OpenWeather {what} response body"))?;

        if !status.is_success() {
            return Err(anyhow!(
                "OpenWeather {} request failed with status {}: {}",
                what,
                status,
                truncate_body(&body),
            ));
        }

        serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse OpenWeather {what} JSON"))
    }
}

#[async_trait]
impl ConditionsProvider for OpenWeatherProvider {
    async fn resolve(&self, query: &str) -> Result<Option<Location>> {
        let entries: Vec<OwGeoEntry> = self
            .get_json(
                GEOCODE_URL,
                &[("q", query), ("limit", "1"), ("appid", self.api_key.as_str())],
                "geocoding",
            )
            .await?;

        Ok(entries.into_iter().next().map(|entry| {
            let display_name = match &entry.state {
                Some(state) => format!("{}, {}, {}", entry.name, state, entry.country),
                None => format!("{}, {}", entry.name, entry.country),
            };
            Location { latitude: entry.lat, longitude: entry.lon, display_name }
        }))
    }

    async fn current(&self, lat: f64, lon: f64) -> Result<CurrentConditions> {
        let lat_s = lat.to_string();
        let lon_s = lon.to_string();
        let parsed: OwCurrentResponse = self
            .get_json(
                CURRENT_URL,
                &[
                    ("lat", lat_s.as_str()),
                    ("lon", lon_s.as_str()),
                    ("appid", self.api_key.as_str()),
                    ("units", "metric"),
                    ("lang", "en"),
                ],
                "current weather",
            )
            .await?;

        let description = parsed
            .weather
            .first()
            .map(|w| w.description.clone())
            .unwrap_or_else(|| "Unknown".to_string());

        Ok(CurrentConditions {
            temperature: parsed.main.temp,
            description,
            utc_offset_seconds: parsed.timezone,
        })
    }

    async fn air_quality(&self, lat: f64, lon: f64) -> Result<AirQuality> {
        let lat_s = lat.to_string();
        let lon_s = lon.to_string();
        let parsed: OwAirResponse = self
            .get_json(
                AIR_URL,
                &[
                    ("lat", lat_s.as_str()),
                    ("lon", lon_s.as_str()),
                    ("appid", self.api_key.as_str()),
                ],
                "air pollution",
            )
            .await?;

        // The provider returns a short forward list; only the first
        // (current) entry is meaningful here.
        Ok(match parsed.list.into_iter().next() {
            Some(entry) => AirQuality {
                index: entry.main.aqi,
                pm2_5: entry.components.pm2_5,
                pm10: entry.components.pm10,
            },
            None => AirQuality::default(),
        })
    }

    async fn forecast(&self, lat: f64, lon: f64) -> Result<Vec<ForecastSample>> {
        let lat_s = lat.to_string();
        let lon_s = lon.to_string();
        let parsed: OwForecastResponse = self
            .get_json(
                FORECAST_URL,
                &[
                    ("lat", lat_s.as_str()),
                    ("lon", lon_s.as_str()),
                    ("appid", self.api_key.as_str()),
                    ("units", "metric"),
                    ("lang", "en"),
                ],
                "5-day forecast",
            )
            .await?;

        Ok(parsed
            .list
            .into_iter()
            .filter_map(|entry| {
                let timestamp = unix_to_utc(entry.dt)?;
                let description = entry
                    .weather
                    .first()
                    .map(|w| w.description.clone())
                    .unwrap_or_else(|| "Unknown".to_string());
                Some(ForecastSample { timestamp, temperature: entry.main.temp, description })
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct OwGeoEntry {
    name: String,
    country: String,
    #[serde(default)]
    state: Option<String>,
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: OwMain,
    weather: Vec<OwWeather>,
    #[serde(default)]
    timezone: i32,
}

#[derive(Debug, Deserialize)]
struct OwAirMain {
    #[serde(default)]
    aqi: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
struct OwAirComponents {
    #[serde(default)]
    pm2_5: Option<f64>,
    #[serde(default)]
    pm10: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwAirEntry {
    main: OwAirMain,
    #[serde(default)]
    components: OwAirComponents,
}

#[derive(Debug, Deserialize)]
struct OwAirResponse {
    #[serde(default)]
    list: Vec<OwAirEntry>,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    // Back off to a char boundary; slicing mid-char would panic.
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geocode_entry_with_state_parses() {
        let json = r#"[{"name":"Springfield","lat":39.8,"lon":-89.6,"country":"US","state":"Illinois"}]"#;
        let entries: Vec<OwGeoEntry> = serde_json::from_str(json).expect("parse");
        assert_eq!(entries[0].state.as_deref(), Some("Illinois"));
    }

    #[test]
    fn current_response_parses_timezone_offset() {
        let json = r#"{
            "main": {"temp": 23.5},
            "weather": [{"description": "scattered clouds"}],
            "timezone": 18000
        }"#;
        let parsed: OwCurrentResponse = serde_json::from_str(json).expect("parse");
        assert_eq!(parsed.timezone, 18_000);
        assert_eq!(parsed.main.temp, 23.5);
    }

    #[test]
    fn air_response_tolerates_empty_list() {
        let parsed: OwAirResponse = serde_json::from_str(r#"{"list": []}"#).expect("parse");
        assert!(parsed.list.is_empty());
    }

    #[test]
    fn air_entry_parses_components() {
        let json = r#"{
            "list": [{"main": {"aqi": 2}, "components": {"pm2_5": 8.4, "pm10": 12.1, "no2": 3.0}}]
        }"#;
        let parsed: OwAirResponse = serde_json::from_str(json).expect("parse");
        let entry = &parsed.list[0];
        assert_eq!(entry.main.aqi, Some(2));
        assert_eq!(entry.components.pm2_5, Some(8.4));
        assert_eq!(entry.components.pm10, Some(12.1));
    }

    #[test]
    fn forecast_response_parses_series() {
        let json = r#"{
            "list": [
                {"dt": 1749513600, "main": {"temp": 21.0}, "weather": [{"description": "clear sky"}]},
                {"dt": 1749524400, "main": {"temp": 24.0}, "weather": []}
            ]
        }"#;
        let parsed: OwForecastResponse = serde_json::from_str(json).expect("parse");
        assert_eq!(parsed.list.len(), 2);
        assert_eq!(parsed.list[0].main.temp, 21.0);
    }

    #[test]
    fn truncate_body_caps_long_payloads() {
        let long = "x".repeat(500);
        let out = truncate_body(&long);
        assert!(out.len() < 250);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn truncate_body_respects_multibyte_boundaries() {
        // A two-byte char straddling the cap must not split.
        let body = format!("{}é{}", "x".repeat(199), "y".repeat(100));
        let out = truncate_body(&body);
        assert!(out.ends_with("..."));
        assert_eq!(&out[..199], "x".repeat(199));
    }
}
