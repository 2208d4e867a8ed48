//! Run Configuration
//!
//! Per-session knobs: iteration budget, timeouts, retry policies and tool
//! scoping. Loadable from the environment or deserialized from a request body.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::provider::GenerationOptions;
use crate::usage::ModelPricing;

/// Bounded exponential backoff for upstream model calls
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    #[serde(with = "duration_secs")]
    pub initial_backoff: Duration,

    #[serde(with = "duration_secs")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Options recognized by `Orchestrator::run_session`
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Maximum thinking cycles per session
    pub iteration_budget: usize,

    /// Per tool call timeout
    #[serde(with = "duration_secs")]
    pub tool_timeout: Duration,

    /// Per model call timeout (each attempt)
    #[serde(with = "duration_secs")]
    pub model_timeout: Duration,

    /// Upstream retry policy
    pub model_retry: RetryPolicy,

    /// Corrective re-prompts when model output fails validation
    pub decode_retries: usize,

    /// Per-agent override of the allowed tool set
    pub allowed_tools: HashMap<String, BTreeSet<String>>,

    /// Generation options passed to the provider
    pub generation: GenerationOptions,

    /// Prices the session's token usage when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<ModelPricing>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            iteration_budget: 10,
            tool_timeout: Duration::from_secs(30),
            model_timeout: Duration::from_secs(120),
            model_retry: RetryPolicy::default(),
            decode_retries: 1,
            allowed_tools: HashMap::new(),
            generation: GenerationOptions::default(),
            pricing: None,
        }
    }
}

impl RunConfig {
    /// Load from `AGENT_*` environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("AGENT_ITERATION_BUDGET") {
            config.iteration_budget = parse_var("AGENT_ITERATION_BUDGET", &v)?;
        }
        if let Some(v) = lookup("AGENT_TOOL_TIMEOUT_SECS") {
            config.tool_timeout = parse_secs("AGENT_TOOL_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("AGENT_MODEL_TIMEOUT_SECS") {
            config.model_timeout = parse_secs("AGENT_MODEL_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("AGENT_MODEL_RETRIES") {
            config.model_retry.max_retries = parse_var("AGENT_MODEL_RETRIES", &v)?;
        }
        if let Some(v) = lookup("AGENT_MODEL") {
            config.generation.model = v;
        }
        match (
            lookup("AGENT_PRICE_INPUT_PER_1K"),
            lookup("AGENT_PRICE_OUTPUT_PER_1K"),
        ) {
            (None, None) => {}
            (Some(input), Some(output)) => {
                config.pricing = Some(ModelPricing::new(
                    parse_var("AGENT_PRICE_INPUT_PER_1K", &input)?,
                    parse_var("AGENT_PRICE_OUTPUT_PER_1K", &output)?,
                ));
            }
            _ => {
                return Err(AgentError::Config(
                    "AGENT_PRICE_INPUT_PER_1K and AGENT_PRICE_OUTPUT_PER_1K must be set together"
                        .into(),
                ));
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.iteration_budget == 0 {
            return Err(AgentError::Config("iteration_budget must be at least 1".into()));
        }
        if self.tool_timeout.is_zero() || self.model_timeout.is_zero() {
            return Err(AgentError::Config("timeouts must be greater than zero".into()));
        }
        if let Some(pricing) = &self.pricing {
            let valid = |price: f64| price.is_finite() && price >= 0.0;
            if !valid(pricing.input_per_1k) || !valid(pricing.output_per_1k) {
                return Err(AgentError::Config(
                    "token prices must be finite and non-negative".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn with_iteration_budget(mut self, budget: usize) -> Self {
        self.iteration_budget = budget;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn with_model_retry(mut self, retry: RetryPolicy) -> Self {
        self.model_retry = retry;
        self
    }

    pub fn with_decode_retries(mut self, retries: usize) -> Self {
        self.decode_retries = retries;
        self
    }

    pub fn with_pricing(mut self, pricing: ModelPricing) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// Restrict an agent to the given tools for sessions run with this config
    pub fn allow_tools<I, S>(mut self, agent: impl Into<String>, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools
            .insert(agent.into(), tools.into_iter().map(Into::into).collect());
        self
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AgentError::Config(format!("{} has an invalid value: {:?}", key, value)))
}

/// Fractional seconds; negative, NaN and overflowing values are config errors
fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    let secs: f64 = parse_var(key, value)?;
    Duration::try_from_secs_f64(secs)
        .map_err(|e| AgentError::Config(format!("{} is not a valid duration: {}", key, e)))
}

/// Durations as fractional seconds on the wire
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.iteration_budget, 10);
        assert_eq!(config.decode_retries, 1);
        assert_eq!(config.tool_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_from_lookup() {
        let config = RunConfig::from_lookup(|key| match key {
            "AGENT_ITERATION_BUDGET" => Some("3".into()),
            "AGENT_TOOL_TIMEOUT_SECS" => Some("1.5".into()),
            "AGENT_MODEL" => Some("qwen2.5".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.iteration_budget, 3);
        assert_eq!(config.tool_timeout, Duration::from_millis(1500));
        assert_eq!(config.generation.model, "qwen2.5");
    }

    #[test]
    fn test_invalid_env_value() {
        let err = RunConfig::from_lookup(|key| {
            (key == "AGENT_ITERATION_BUDGET").then(|| "many".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));

        let zero = RunConfig::from_lookup(|key| (key == "AGENT_ITERATION_BUDGET").then(|| "0".to_string()));
        assert!(zero.is_err());
    }

    #[test]
    fn test_unrepresentable_timeouts_are_config_errors() {
        for bad in ["-1", "NaN", "inf", "1e300"] {
            let err = RunConfig::from_lookup(|key| {
                (key == "AGENT_TOOL_TIMEOUT_SECS").then(|| bad.to_string())
            })
            .unwrap_err();
            assert!(matches!(err, AgentError::Config(_)), "{} was accepted", bad);
        }

        let err = RunConfig::from_lookup(|key| {
            (key == "AGENT_MODEL_TIMEOUT_SECS").then(|| "-0.5".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }

    #[test]
    fn test_pricing_from_lookup() {
        let config = RunConfig::from_lookup(|key| match key {
            "AGENT_PRICE_INPUT_PER_1K" => Some("0.00015".into()),
            "AGENT_PRICE_OUTPUT_PER_1K" => Some("0.0006".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.pricing, Some(ModelPricing::new(0.00015, 0.0006)));
        assert!(RunConfig::default().pricing.is_none());

        let half = RunConfig::from_lookup(|key| {
            (key == "AGENT_PRICE_INPUT_PER_1K").then(|| "0.1".to_string())
        });
        assert!(matches!(half, Err(AgentError::Config(_))));

        let negative = RunConfig::default().with_pricing(ModelPricing::new(-1.0, 0.0));
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_secs(1));
        assert_eq!(policy.backoff(10), Duration::from_secs(8));
    }

    #[test]
    fn test_deserialize_partial_body() {
        let config: RunConfig =
            serde_json::from_str(r#"{"iteration_budget": 4, "tool_timeout": 0.25}"#).unwrap();
        assert_eq!(config.iteration_budget, 4);
        assert_eq!(config.tool_timeout, Duration::from_millis(250));
        assert_eq!(config.model_timeout, Duration::from_secs(120));
    }
}
