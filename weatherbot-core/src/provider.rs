use crate::{
    Config,
    model::{AirQuality, CurrentConditions, ForecastSample, Location},
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Abstraction over the weather / geocoding / air-quality provider.
///
/// All calls fail with a transport error on non-2xx or timeout; the caller
/// treats any such failure as a failed tick. `resolve` distinguishes "the
/// provider answered but found nothing" (`Ok(None)`) from transport errors.
#[async_trait]
pub trait ConditionsProvider: Send + Sync + Debug {
    /// Geocode a free-text place name. `Ok(None)` when nothing matches.
    async fn resolve(&self, query: &str) -> anyhow::Result<Option<Location>>;

    /// Current weather at a coordinate, including the location's UTC offset.
    async fn current(&self, lat: f64, lon: f64) -> anyhow::Result<CurrentConditions>;

    /// Current air quality at a coordinate.
    async fn air_quality(&self, lat: f64, lon: f64) -> anyhow::Result<AirQuality>;

    /// Multi-day forecast series in 3-hour steps, chronologically ordered.
    async fn forecast(&self, lat: f64, lon: f64) -> anyhow::Result<Vec<ForecastSample>>;
}

/// Construct the provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn ConditionsProvider>> {
    let api_key = config.openweather_api_key.as_deref().ok_or_else(|| {
        anyhow::anyhow!(
            "No OpenWeather API key configured.\n\
             Hint: run `weatherbot configure` and enter your API key."
        )
    })?;

    Ok(Box::new(OpenWeatherProvider::new(api_key.to_owned())?))
}
