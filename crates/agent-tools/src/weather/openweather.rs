//! OpenWeatherMap Client
//!
//! Current weather over the OpenWeatherMap HTTP API in metric units. The API
//! key is read from the environment here and never logged.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{WeatherReport, WeatherSource};
use crate::error::{Result, ToolkitError};

/// OpenWeatherMap client configuration
#[derive(Clone)]
pub struct OpenWeatherConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for OpenWeatherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenWeatherConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl OpenWeatherConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openweathermap.org/data/2.5".into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Read `OPENWEATHER_API_KEY` (required) and `OPENWEATHER_BASE_URL` (optional)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENWEATHER_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(ToolkitError::MissingConfig("OPENWEATHER_API_KEY"))?;

        let mut config = Self::new(api_key);
        if let Some(base_url) = lookup("OPENWEATHER_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        Ok(config)
    }
}

#[derive(Deserialize)]
struct OwmResponse {
    #[serde(default)]
    name: Option<String>,
    main: OwmMain,
    #[serde(default)]
    weather: Vec<OwmCondition>,
}

#[derive(Deserialize)]
struct OwmMain {
    temp: f64,
    #[serde(default)]
    feels_like: Option<f64>,
    humidity: f64,
}

#[derive(Deserialize)]
struct OwmCondition {
    description: String,
}

impl OwmResponse {
    fn into_report(self, requested: &str) -> WeatherReport {
        WeatherReport {
            city: self.name.unwrap_or_else(|| requested.to_string()),
            condition: self
                .weather
                .into_iter()
                .next()
                .map_or_else(|| "unknown".to_string(), |w| w.description),
            temperature_c: self.main.temp.round() as i64,
            feels_like_c: self.main.feels_like.map(|t| t.round() as i64),
            humidity_pct: self.main.humidity.round() as i64,
            source: "openweathermap".into(),
        }
    }
}

/// OpenWeatherMap weather source
pub struct OpenWeatherClient {
    http: reqwest::Client,
    config: OpenWeatherConfig,
}

impl OpenWeatherClient {
    pub fn new(config: OpenWeatherConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OpenWeatherConfig::from_env()?)
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn current(&self, city: &str) -> Result<WeatherReport> {
        let response = self
            .http
            .get(format!("{}/weather", self.config.base_url))
            .query(&[
                ("q", city),
                ("appid", self.config.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ToolkitError::InvalidInput(format!("unknown city '{}'", city)));
        }
        if !status.is_success() {
            tracing::warn!(status = %status, "OpenWeatherMap request failed");
            return Err(ToolkitError::Weather(format!(
                "OpenWeatherMap returned HTTP {}",
                status
            )));
        }

        let parsed: OwmResponse = response.json().await?;
        tracing::debug!(city, "Weather lookup completed");
        Ok(parsed.into_report(city))
    }

    fn name(&self) -> &str {
        "OpenWeatherMap"
    }
}
