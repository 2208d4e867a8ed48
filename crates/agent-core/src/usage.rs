//! Token Usage & Cost
//!
//! Per-session totals of model calls and tokens. Providers that do not report
//! usage are estimated at roughly four characters per token.

use serde::{Deserialize, Serialize};

use crate::provider::{Completion, CompletionRequest, TokenUsage};

const CHARS_PER_TOKEN: usize = 4;

/// Rough token count for text a provider did not meter
pub fn estimate_tokens(text: &str) -> u32 {
    u32::try_from(text.chars().count() / CHARS_PER_TOKEN).unwrap_or(u32::MAX)
}

impl TokenUsage {
    /// Estimated usage for one request/response pair
    pub fn estimate(request: &CompletionRequest, completion: &Completion) -> Self {
        let prompt = estimate_tokens(&request.instructions).saturating_add(
            request
                .messages
                .iter()
                .map(|m| estimate_tokens(&m.content))
                .fold(0u32, u32::saturating_add),
        );
        let completion = estimate_tokens(&completion.replay());
        Self {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt.saturating_add(completion),
        }
    }
}

/// USD price per thousand tokens
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelPricing {
    pub fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }

    pub fn cost(&self, usage: &SessionUsage) -> f64 {
        (usage.prompt_tokens as f64 * self.input_per_1k
            + usage.completion_tokens as f64 * self.output_per_1k)
            / 1000.0
    }
}

/// Model usage accumulated over a session
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionUsage {
    /// Successful model calls, corrective retries included
    pub model_calls: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// Calls whose tokens were estimated rather than reported
    pub estimated_calls: u32,
    /// Only set when the run was configured with pricing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

impl SessionUsage {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    /// Add one completed model call
    pub fn record(&mut self, usage: &TokenUsage, estimated: bool) {
        self.model_calls += 1;
        self.prompt_tokens += u64::from(usage.prompt_tokens);
        self.completion_tokens += u64::from(usage.completion_tokens);
        if estimated {
            self.estimated_calls += 1;
        }
    }

    pub fn priced(mut self, pricing: Option<&ModelPricing>) -> Self {
        self.cost_usd = pricing.map(|p| p.cost(&self));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::provider::GenerationOptions;
    use crate::schema::OutputSchema;

    #[test]
    fn test_estimate_is_four_chars_per_token() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("abc"), 0);
    }

    #[test]
    fn test_estimate_counts_instructions_and_messages() {
        let request = CompletionRequest {
            agent: "Assistant".into(),
            instructions: "a".repeat(40),
            messages: vec![Message::user("b".repeat(20))],
            tools: vec![],
            handoff_targets: vec![],
            output_schema: OutputSchema::Text,
            options: GenerationOptions::default(),
        };
        let usage = TokenUsage::estimate(&request, &Completion::text("c".repeat(12)));
        assert_eq!(usage.prompt_tokens, 15);
        assert_eq!(usage.completion_tokens, 3);
        assert_eq!(usage.total_tokens, 18);
    }

    #[test]
    fn test_accumulate_and_price() {
        let mut usage = SessionUsage::default();
        let call = TokenUsage {
            prompt_tokens: 1000,
            completion_tokens: 500,
            total_tokens: 1500,
        };
        usage.record(&call, false);
        usage.record(&call, true);

        assert_eq!(usage.model_calls, 2);
        assert_eq!(usage.estimated_calls, 1);
        assert_eq!(usage.total_tokens(), 3000);
        assert!(usage.clone().priced(None).cost_usd.is_none());

        let priced = usage.priced(Some(&ModelPricing::new(0.15, 0.6)));
        let cost = priced.cost_usd.unwrap();
        assert!((cost - (2.0 * 0.15 + 1.0 * 0.6)).abs() < 1e-9);
    }
}
