//! Secondary tier: OpenAI chat completions via `async-openai`, used for the
//! cheaper text-only synthesis/scenario-generation calls (spec §4.5). No
//! vision, no tool-use, no prompt caching — synthesis only ever hands this
//! client a system prompt and a transcript summary.

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::error::AgentError;
use crate::message::{ContentBlock, Message};
use crate::tool_source::ToolSpec;

use super::{LlmClient, LlmResponse, LlmUsage, StopReason};

pub struct ChatOpenAI {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: u32,
}

impl ChatOpenAI {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, max_tokens: u32) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key.into());
        Self {
            client: Client::with_config(config),
            model: model.into(),
            max_tokens,
        }
    }

    fn message_text(message: &Message) -> String {
        match message {
            Message::User { content } => Self::join_text(content),
            Message::Assistant { content } => Self::join_text(content),
        }
    }

    fn join_text(content: &[ContentBlock]) -> String {
        content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl LlmClient for ChatOpenAI {
    async fn complete(
        &self,
        system: &str,
        _tools: &[ToolSpec],
        messages: &[Message],
    ) -> Result<LlmResponse, AgentError> {
        let mut chat_messages = vec![ChatCompletionRequestSystemMessageArgs::default()
            .content(system)
            .build()
            .map_err(|e| AgentError::LlmProtocol(e.to_string()))?
            .into()];

        for message in messages {
            let text = Self::message_text(message);
            let entry = match message {
                Message::User { .. } => ChatCompletionRequestUserMessageArgs::default()
                    .content(text)
                    .build()
                    .map_err(|e| AgentError::LlmProtocol(e.to_string()))?
                    .into(),
                Message::Assistant { .. } => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(text)
                    .build()
                    .map_err(|e| AgentError::LlmProtocol(e.to_string()))?
                    .into(),
            };
            chat_messages.push(entry);
        }

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_tokens(self.max_tokens)
            .messages(chat_messages)
            .build()
            .map_err(|e| AgentError::LlmProtocol(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| AgentError::TransientLlm(e.to_string()))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::LlmProtocol("no choices in response".into()))?;

        let stop_reason = match choice.finish_reason {
            Some(async_openai::types::FinishReason::Length) => StopReason::MaxTokens,
            Some(async_openai::types::FinishReason::Stop) => StopReason::EndTurn,
            _ => StopReason::EndTurn,
        };

        let text = choice.message.content.unwrap_or_default();
        let content = if text.is_empty() {
            Vec::new()
        } else {
            vec![ContentBlock::text(text)]
        };

        let usage = response.usage.map(|u| LlmUsage {
            input_tokens: u.prompt_tokens as u64,
            output_tokens: u.completion_tokens as u64,
            cache_creation_input_tokens: 0,
            cache_read_input_tokens: 0,
        });

        Ok(LlmResponse {
            content,
            stop_reason,
            usage: usage.unwrap_or_default(),
        })
    }
}
