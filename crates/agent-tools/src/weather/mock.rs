//! Mock Weather
//!
//! The same city always gets the same report, so demos and tests are
//! reproducible.

use async_trait::async_trait;

use super::{WeatherReport, WeatherSource};
use crate::error::Result;

const CONDITIONS: [&str; 5] = ["sunny", "cloudy", "rainy", "snowy", "partly cloudy"];

/// Deterministic report for a city
pub fn mock_report(city: &str) -> WeatherReport {
    let seed = city
        .to_lowercase()
        .bytes()
        .fold(17_u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));

    WeatherReport {
        city: city.to_string(),
        condition: CONDITIONS[(seed % CONDITIONS.len() as u64) as usize].to_string(),
        temperature_c: 10 + (seed / 7 % 26) as i64,
        feels_like_c: None,
        humidity_pct: 30 + (seed / 13 % 51) as i64,
        source: "mock".into(),
    }
}

/// Weather source backed by `mock_report`
#[derive(Debug, Default)]
pub struct MockWeather;

impl MockWeather {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WeatherSource for MockWeather {
    async fn current(&self, city: &str) -> Result<WeatherReport> {
        Ok(mock_report(city))
    }

    fn name(&self) -> &str {
        "MockWeather"
    }
}
