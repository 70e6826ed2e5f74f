//! Primary exploration tier: Anthropic Messages API. Vision (screenshots),
//! tool-use, and prompt-cache breakpoints all live on this client — the
//! budget node (spec §4.4 step 4) relies on `cache_control` being forwarded
//! verbatim from [`ContentBlock`] onto the wire request.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::AgentError;
use crate::message::{CacheControlKind, ContentBlock, Message};
use crate::tool_source::ToolSpec;

use super::{LlmClient, LlmResponse, LlmUsage, StopReason};

const DEFAULT_API_BASE: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// HTTP timeout for a single exploration turn (spec §4.4 step 5).
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client"),
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: model.into(),
            max_tokens,
            temperature: 1.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn content_block_to_wire(block: &ContentBlock) -> Value {
        let cache = |cc: &Option<crate::message::CacheControl>| {
            cc.map(|c| match c.kind {
                CacheControlKind::Ephemeral => json!({"type": "ephemeral"}),
            })
        };
        match block {
            ContentBlock::Text { text, cache_control } => {
                let mut v = json!({"type": "text", "text": text});
                if let Some(c) = cache(cache_control) {
                    v["cache_control"] = c;
                }
                v
            }
            ContentBlock::Image {
                data,
                media_type,
                cache_control,
            } => {
                let mut v = json!({
                    "type": "image",
                    "source": {"type": "base64", "media_type": media_type, "data": data},
                });
                if let Some(c) = cache(cache_control) {
                    v["cache_control"] = c;
                }
                v
            }
            ContentBlock::ToolUse {
                id,
                name,
                input,
                cache_control,
            } => {
                let mut v = json!({"type": "tool_use", "id": id, "name": name, "input": input});
                if let Some(c) = cache(cache_control) {
                    v["cache_control"] = c;
                }
                v
            }
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
                cache_control,
            } => {
                let mut v = json!({
                    "type": "tool_result",
                    "tool_use_id": tool_use_id,
                    "content": content,
                    "is_error": is_error,
                });
                if let Some(c) = cache(cache_control) {
                    v["cache_control"] = c;
                }
                v
            }
        }
    }

    fn message_to_wire(message: &Message) -> Value {
        let (role, content) = match message {
            Message::User { content } => ("user", content),
            Message::Assistant { content } => ("assistant", content),
        };
        json!({
            "role": role,
            "content": content.iter().map(Self::content_block_to_wire).collect::<Vec<_>>(),
        })
    }

    fn wire_block_to_content(block: &Value) -> Option<ContentBlock> {
        match block.get("type").and_then(Value::as_str)? {
            "text" => Some(ContentBlock::text(block.get("text")?.as_str()?.to_string())),
            "tool_use" => Some(ContentBlock::ToolUse {
                id: block.get("id")?.as_str()?.to_string(),
                name: block.get("name")?.as_str()?.to_string(),
                input: block.get("input").cloned().unwrap_or(Value::Null),
                cache_control: None,
            }),
            _ => None,
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(
        &self,
        system: &str,
        tools: &[ToolSpec],
        messages: &[Message],
    ) -> Result<LlmResponse, AgentError> {
        let tool_defs: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description.clone().unwrap_or_default(),
                    "input_schema": t.input_schema,
                })
            })
            .collect();

        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "system": [{"type": "text", "text": system, "cache_control": {"type": "ephemeral"}}],
            "tools": tool_defs,
            "messages": messages.iter().map(Self::message_to_wire).collect::<Vec<_>>(),
        });

        let resp = self
            .http
            .post(&self.api_base)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::TransientLlm(e.to_string()))?;

        let status = resp.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AgentError::TransientLlm(format!(
                "anthropic returned {status}"
            )));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| AgentError::LlmProtocol(e.to_string()))?;
        if !status.is_success() {
            return Err(AgentError::LlmProtocol(format!(
                "anthropic error {status}: {body}"
            )));
        }

        let content_blocks = body
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| AgentError::LlmProtocol("missing content array".into()))?;
        let content: Vec<ContentBlock> = content_blocks
            .iter()
            .filter_map(Self::wire_block_to_content)
            .collect();

        let stop_reason = match body.get("stop_reason").and_then(Value::as_str) {
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::MaxTokens,
            Some("stop_sequence") => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        };

        let usage = body.get("usage").cloned().unwrap_or(Value::Null);
        let get_u64 = |key: &str| usage.get(key).and_then(Value::as_u64).unwrap_or(0);
        let usage = LlmUsage {
            input_tokens: get_u64("input_tokens"),
            output_tokens: get_u64("output_tokens"),
            cache_creation_input_tokens: get_u64("cache_creation_input_tokens"),
            cache_read_input_tokens: get_u64("cache_read_input_tokens"),
        };

        Ok(LlmResponse {
            content,
            stop_reason,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_block_to_wire_carries_cache_control() {
        let mut block = ContentBlock::text("hi");
        block.set_cache_marker();
        let wire = AnthropicClient::content_block_to_wire(&block);
        assert_eq!(wire["cache_control"]["type"], "ephemeral");
    }

    #[test]
    fn content_block_to_wire_omits_cache_control_when_unset() {
        let block = ContentBlock::text("hi");
        let wire = AnthropicClient::content_block_to_wire(&block);
        assert!(wire.get("cache_control").is_none());
    }
}
