//! Weather Backends
//!
//! Current conditions for a city, from OpenWeatherMap or a deterministic mock.

mod mock;
mod openweather;

pub use mock::{MockWeather, mock_report};
pub use openweather::{OpenWeatherClient, OpenWeatherConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single weather report
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city: String,
    pub condition: String,
    pub temperature_c: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feels_like_c: Option<i64>,

    pub humidity_pct: i64,

    /// Backend that produced the report
    pub source: String,
}

/// Weather backend (Strategy pattern)
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Current conditions in `city`
    async fn current(&self, city: &str) -> Result<WeatherReport>;

    /// Backend name
    fn name(&self) -> &str;
}
