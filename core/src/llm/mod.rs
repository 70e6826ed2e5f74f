//! LLM client abstraction shared by the exploration loop (C4) and synthesis
//! (C5): a single `complete` call that takes a system prompt, the narrow tool
//! surface, and the pruned conversation, and returns content blocks plus
//! token usage broken out by cache-creation/cache-read (spec §4.4/§9).
//!
//! Two concrete tiers: [`AnthropicClient`] (vision + tool-use + prompt-cache,
//! used for exploration) and [`ChatOpenAI`] (text-only, used for the cheaper
//! synthesis/scenario-generation tier). [`MockLlm`] scripts fixed responses
//! for tests.

pub mod anthropic;
pub mod openai;

mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::message::{ContentBlock, Message};
use crate::tool_source::ToolSpec;

pub use anthropic::AnthropicClient;
pub use mock::MockLlm;
pub use openai::ChatOpenAI;

/// Why the model stopped generating. `ToolUse` routes to the act node;
/// `MaxTokens` on a synthesis call triggers the JSON repair pass (spec §4.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

/// Token usage for one LLM call, broken out the way the provider bills it.
/// `credits` uses the platform's fixed credit ratio (spec glossary: 1 credit
/// ≈ $0.01); callers accumulate this onto the owning analysis/step.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct LlmUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
}

impl LlmUsage {
    pub fn accumulate(&mut self, other: &LlmUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_creation_input_tokens += other.cache_creation_input_tokens;
        self.cache_read_input_tokens += other.cache_read_input_tokens;
    }

    /// Rough USD-per-credit accounting: blended per-million-token rate across
    /// the four counters, converted to credits at 1 credit ≈ $0.01. The exact
    /// per-provider rate card lives in `config::profiles`; this is the
    /// fallback used when a call isn't attributed to a priced tier.
    pub fn credits(&self, usd_per_million_input: f64, usd_per_million_output: f64) -> f64 {
        let usd = (self.input_tokens as f64 * usd_per_million_input
            + self.cache_read_input_tokens as f64 * usd_per_million_input * 0.1
            + self.cache_creation_input_tokens as f64 * usd_per_million_input * 1.25
            + self.output_tokens as f64 * usd_per_million_output)
            / 1_000_000.0;
        usd * 100.0
    }
}

/// Result of one `LlmClient::complete` call.
#[derive(Clone)]
pub struct LlmResponse {
    /// Reasoning text and/or tool_use blocks, in model order.
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    pub usage: LlmUsage,
}

impl LlmResponse {
    pub fn reasoning_text(&self) -> Option<String> {
        let text: String = self
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    pub fn tool_uses(&self) -> Vec<&ContentBlock> {
        self.content
            .iter()
            .filter(|b| matches!(b, ContentBlock::ToolUse { .. }))
            .collect()
    }
}

/// One LLM call: system prompt, available tools, and the conversation so far.
///
/// Implementations own their own HTTP timeout (spec §4.4 step 5 recommends
/// 180s) and must surface transient failures (5xx, timeout) as
/// `AgentError::TransientLlm` so the caller's retry-with-backoff applies.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        tools: &[ToolSpec],
        messages: &[Message],
    ) -> Result<LlmResponse, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_accumulates_all_four_counters() {
        let mut total = LlmUsage::default();
        total.accumulate(&LlmUsage {
            input_tokens: 100,
            output_tokens: 20,
            cache_creation_input_tokens: 5,
            cache_read_input_tokens: 50,
        });
        total.accumulate(&LlmUsage {
            input_tokens: 10,
            output_tokens: 2,
            cache_creation_input_tokens: 0,
            cache_read_input_tokens: 80,
        });
        assert_eq!(total.input_tokens, 110);
        assert_eq!(total.output_tokens, 22);
        assert_eq!(total.cache_creation_input_tokens, 5);
        assert_eq!(total.cache_read_input_tokens, 130);
    }

    #[test]
    fn reasoning_text_joins_text_blocks_only() {
        let resp = LlmResponse {
            content: vec![
                ContentBlock::text("first"),
                ContentBlock::ToolUse {
                    id: "t1".into(),
                    name: "screenshot".into(),
                    input: serde_json::json!({}),
                    cache_control: None,
                },
                ContentBlock::text("second"),
            ],
            stop_reason: StopReason::ToolUse,
            usage: LlmUsage::default(),
        };
        assert_eq!(resp.reasoning_text().unwrap(), "first\nsecond");
        assert_eq!(resp.tool_uses().len(), 1);
    }
}
