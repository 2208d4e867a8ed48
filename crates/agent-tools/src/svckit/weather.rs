//! Weather Tool
//!
//! Looks up current conditions through a `WeatherSource`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use agent_core::{Arguments, ParameterSchema, Result as CoreResult, Tool, ToolSchema};

use crate::error::ToolkitError;
use crate::weather::WeatherSource;

/// Tool for looking up the weather in a city
pub struct WeatherTool {
    source: Arc<dyn WeatherSource>,
}

impl WeatherTool {
    pub fn new(source: Arc<dyn WeatherSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "weather".into(),
            description: "Get the current weather for a city: condition, temperature in °C and humidity."
                .into(),
            parameters: vec![ParameterSchema::required("city", "string", "City name, e.g. 'Tokyo'")],
            category: Some("weather".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, args: &Arguments) -> CoreResult<Value> {
        let city = args
            .get("city")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();

        if city.is_empty() {
            return Err(ToolkitError::InvalidInput("city must not be empty".into()).into());
        }

        let report = self.source.current(city).await?;
        tracing::debug!(backend = self.source.name(), city, "Weather report ready");

        Ok(serde_json::to_value(report).map_err(ToolkitError::from)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::MockWeather;
    use serde_json::json;

    #[tokio::test]
    async fn test_empty_city_is_a_fault() {
        let tool = WeatherTool::new(Arc::new(MockWeather::new()));
        let args = tool.schema().validate(&json!({"city": "  "})).unwrap();
        assert!(tool.execute(&args).await.is_err());

        let args = tool.schema().validate(&json!({"city": "Paris"})).unwrap();
        let report = tool.execute(&args).await.unwrap();
        assert_eq!(report["city"], "Paris");
        assert_eq!(report["source"], "mock");
        assert!(report.get("feels_like_c").is_none());
    }
}
