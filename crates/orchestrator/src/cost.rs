//! Provider cost table.
//!
//! Costs are computed at ledger-write time from this constant table:
//! flat fees for identification-style calls, per-1K-token linear fees for
//! conversational and embedding models. Unknown provider/model pairs cost
//! zero rather than failing the write.

use ai_core::TokenUsage;

/// Pricing for one provider+model pair.
#[derive(Debug, Clone, Copy)]
enum Pricing {
    /// Fixed fee per successful call, in USD.
    Flat(f64),
    /// USD per 1K input tokens and per 1K output tokens.
    PerToken { input: f64, output: f64 },
}

/// `(provider, model_prefix)` keyed pricing. Model names carry dated
/// suffixes, so entries match on prefix.
const COST_TABLE: &[(&str, &str, Pricing)] = &[
    ("plant-id", "plant-id-v3", Pricing::Flat(0.05)),
    ("plant-id", "plant-id-health", Pricing::Flat(0.05)),
    ("gemini", "gemini-1.5-flash", Pricing::PerToken { input: 0.000_075, output: 0.000_3 }),
    ("claude", "claude-3-5-haiku", Pricing::PerToken { input: 0.000_8, output: 0.004 }),
    ("claude", "claude-sonnet", Pricing::PerToken { input: 0.003, output: 0.015 }),
    ("openai", "gpt-4o-mini", Pricing::PerToken { input: 0.000_15, output: 0.000_6 }),
    ("openai", "text-embedding-3-small", Pricing::PerToken { input: 0.000_02, output: 0.0 }),
];

/// Cost in USD for one provider call.
pub fn cost_usd(provider: &str, model: &str, usage: Option<TokenUsage>) -> f64 {
    let pricing = COST_TABLE
        .iter()
        .find(|(p, m, _)| *p == provider && model.starts_with(m))
        .map(|(_, _, pricing)| *pricing);

    match pricing {
        Some(Pricing::Flat(fee)) => fee,
        Some(Pricing::PerToken { input, output }) => {
            let usage = usage.unwrap_or_default();
            (usage.input_tokens as f64 / 1000.0) * input
                + (usage.output_tokens as f64 / 1000.0) * output
        }
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_fee_ignores_tokens() {
        assert_eq!(cost_usd("plant-id", "plant-id-v3", None), 0.05);
        assert_eq!(
            cost_usd(
                "plant-id",
                "plant-id-v3",
                Some(TokenUsage {
                    input_tokens: 9999,
                    output_tokens: 9999
                })
            ),
            0.05
        );
    }

    #[test]
    fn test_per_token_linear() {
        let usage = TokenUsage {
            input_tokens: 1000,
            output_tokens: 500,
        };
        let cost = cost_usd("claude", "claude-3-5-haiku-20241022", Some(usage));
        let expected = 0.000_8 + 0.5 * 0.004;
        assert!((cost - expected).abs() < 1e-12);
    }

    #[test]
    fn test_dated_model_names_match_prefix() {
        let usage = TokenUsage {
            input_tokens: 2000,
            output_tokens: 0,
        };
        assert!(cost_usd("claude", "claude-sonnet-4-20250514", Some(usage)) > 0.0);
    }

    #[test]
    fn test_embedding_output_is_free() {
        let usage = TokenUsage {
            input_tokens: 1000,
            output_tokens: 1000,
        };
        let cost = cost_usd("openai", "text-embedding-3-small", Some(usage));
        assert!((cost - 0.000_02).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_pair_costs_zero() {
        assert_eq!(cost_usd("someone-else", "mystery-model", None), 0.0);
    }
}
