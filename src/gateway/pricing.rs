//! Model pricing registry.
//!
//! Costs are in nanodollars (1e-9 USD) per token and are estimates: the
//! usage record carries them for budgeting, nothing else depends on them.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Pricing information for a model.
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    /// Cost per input token in nanodollars.
    pub input_nanos_per_token: i64,
    /// Cost per output token in nanodollars.
    pub output_nanos_per_token: i64,
}

impl ModelPricing {
    const fn new(input: i64, output: i64) -> Self {
        Self {
            input_nanos_per_token: input,
            output_nanos_per_token: output,
        }
    }

    /// Calculate cost for a request.
    pub fn calculate_cost(&self, input_tokens: u32, output_tokens: u32) -> i64 {
        (input_tokens as i64) * self.input_nanos_per_token
            + (output_tokens as i64) * self.output_nanos_per_token
    }
}

// =============================================================================
// PRICING DATA
// =============================================================================

// GPT-4o-mini: $0.15/1M input, $0.60/1M output
const GPT_4O_MINI: ModelPricing = ModelPricing::new(150, 600);
// GPT-4o: $2.50/1M input, $10.00/1M output
const GPT_4O: ModelPricing = ModelPricing::new(2_500, 10_000);
// GPT-4.1-mini: $0.40/1M input, $1.60/1M output
const GPT_4_1_MINI: ModelPricing = ModelPricing::new(400, 1_600);
// GPT-5-mini: $0.25/1M input, $2.00/1M output
const GPT_5_MINI: ModelPricing = ModelPricing::new(250, 2_000);

/// Used when the model is not in the table.
const UNKNOWN_MODEL: ModelPricing = ModelPricing::new(1_000, 5_000);

static PRICING_MAP: OnceLock<HashMap<&'static str, ModelPricing>> = OnceLock::new();

fn init_pricing() -> HashMap<&'static str, ModelPricing> {
    let mut map = HashMap::new();

    map.insert("gpt-4o-mini", GPT_4O_MINI);
    map.insert("gpt-4o-mini-2024-07-18", GPT_4O_MINI);
    map.insert("gpt-4o", GPT_4O);
    map.insert("gpt-4.1-mini", GPT_4_1_MINI);
    map.insert("gpt-5-mini", GPT_5_MINI);
    // Same models routed through an OpenAI-compatible proxy.
    map.insert("openai/gpt-4o-mini", GPT_4O_MINI);
    map.insert("openai/gpt-4o", GPT_4O);
    map.insert("openai/gpt-5-mini", GPT_5_MINI);

    map
}

/// Get pricing for a model.
pub fn get_pricing(model_id: &str) -> Option<ModelPricing> {
    let map = PRICING_MAP.get_or_init(init_pricing);
    map.get(model_id).copied()
}

/// Calculate chat cost, falling back to a mid-range price for unknown models.
pub fn chat_cost(model: &str, input_tokens: u32, output_tokens: u32) -> i64 {
    get_pricing(model)
        .unwrap_or(UNKNOWN_MODEL)
        .calculate_cost(input_tokens, output_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_cost() {
        // 1K input + 1K output for GPT-4o-mini
        // Input: 1000 * 150 = 150,000 nanos
        // Output: 1000 * 600 = 600,000 nanos
        let cost = chat_cost("gpt-4o-mini", 1_000, 1_000);
        assert_eq!(cost, 750_000);
    }

    #[test]
    fn test_unknown_model_uses_fallback() {
        assert!(get_pricing("acme/unknown").is_none());
        assert_eq!(chat_cost("acme/unknown", 1, 1), 6_000);
    }
}
