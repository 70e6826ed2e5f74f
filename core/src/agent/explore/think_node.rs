//! Think: call the LLM with the pruned conversation, parse its reply into
//! reasoning text plus tool calls (spec §4.4 steps 1, 6).
//!
//! Checks the cancellation flag before spending a turn on the model at all,
//! and short-circuits to termination without calling the LLM when the run
//! has already been cancelled — cancellation outranks every other stop
//! condition (spec §4.4 step 9).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::graph::{Next, Node};
use crate::llm::LlmClient;
use crate::state::{ExplorationState, TerminationReason, ToolCall};
use crate::tool_source::ToolSource;

pub struct ThinkNode {
    llm: Arc<dyn LlmClient>,
    tool_source: Arc<dyn ToolSource>,
    system_prompt: String,
    cancel_flag: Arc<AtomicBool>,
}

impl ThinkNode {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tool_source: Arc<dyn ToolSource>,
        system_prompt: impl Into<String>,
        cancel_flag: Arc<AtomicBool>,
    ) -> Self {
        Self {
            llm,
            tool_source,
            system_prompt: system_prompt.into(),
            cancel_flag,
        }
    }
}

#[async_trait]
impl Node<ExplorationState> for ThinkNode {
    fn id(&self) -> &str {
        "think"
    }

    async fn run(&self, mut state: ExplorationState) -> Result<(ExplorationState, Next), AgentError> {
        if self.cancel_flag.load(Ordering::SeqCst) {
            debug!("think: cancellation observed before calling the model");
            state.terminated = Some(TerminationReason::Cancelled);
            return Ok((state, Next::End));
        }

        let tools = self.tool_source.specs();
        let started = Instant::now();
        let response = self
            .llm
            .complete(&self.system_prompt, &tools, &state.messages)
            .await?;
        let thinking_ms = started.elapsed().as_millis() as u64;

        state.turn_count += 1;
        state.total_usage.accumulate(&response.usage);
        state.thinking_ms = Some(thinking_ms);
        state.reasoning = response.reasoning_text();

        let tool_uses = response.tool_uses();
        if tool_uses.is_empty() {
            debug!(
                turn = state.turn_count,
                "think: model returned no tool calls, treating as terminal"
            );
            state.messages.push(crate::message::Message::Assistant {
                content: response.content,
            });
            state.terminated = Some(TerminationReason::ModelTerminal);
            return Ok((state, Next::End));
        }

        let mut tool_calls = Vec::with_capacity(tool_uses.len());
        for block in &tool_uses {
            if let crate::message::ContentBlock::ToolUse { id, name, input, .. } = block {
                tool_calls.push(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                });
            }
        }
        if tool_calls.is_empty() {
            warn!("think: tool_uses() returned blocks that were not ToolUse variants");
        }

        state.messages.push(crate::message::Message::Assistant {
            content: response.content,
        });
        state.tool_calls = tool_calls;

        Ok((state, Next::Continue))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, LlmUsage, MockLlm, StopReason};
    use crate::message::ContentBlock;
    use crate::tools::{AggregateToolSource, ToolRegistry};
    use serde_json::json;

    fn tool_source() -> Arc<dyn ToolSource> {
        Arc::new(AggregateToolSource::new(ToolRegistry::new()))
    }

    #[tokio::test]
    async fn sets_model_terminal_when_no_tool_calls_returned() {
        let mock = Arc::new(MockLlm::new(vec![LlmResponse {
            content: vec![ContentBlock::text("all done, EXPLORATION_COMPLETE")],
            stop_reason: StopReason::EndTurn,
            usage: LlmUsage::default(),
        }]));
        let node = ThinkNode::new(
            mock,
            tool_source(),
            "system",
            Arc::new(AtomicBool::new(false)),
        );
        let state = ExplorationState::new("https://example.com/game", 10, 0);
        let (state, next) = node.run(state).await.unwrap();
        assert!(matches!(next, Next::End));
        assert_eq!(state.terminated, Some(TerminationReason::ModelTerminal));
    }

    #[tokio::test]
    async fn parses_tool_use_blocks_into_tool_calls() {
        let mock = Arc::new(MockLlm::new(vec![LlmResponse {
            content: vec![ContentBlock::ToolUse {
                id: "tc_1".into(),
                name: "screenshot".into(),
                input: json!({}),
                cache_control: None,
            }],
            stop_reason: StopReason::ToolUse,
            usage: LlmUsage::default(),
        }]));
        let node = ThinkNode::new(
            mock,
            tool_source(),
            "system",
            Arc::new(AtomicBool::new(false)),
        );
        let state = ExplorationState::new("https://example.com/game", 10, 0);
        let (state, next) = node.run(state).await.unwrap();
        assert!(matches!(next, Next::Continue));
        assert_eq!(state.tool_calls.len(), 1);
        assert_eq!(state.tool_calls[0].name, "screenshot");
    }

    #[tokio::test]
    async fn short_circuits_on_cancellation_without_calling_model() {
        let mock = Arc::new(MockLlm::new(vec![]));
        let cancel = Arc::new(AtomicBool::new(true));
        let node = ThinkNode::new(mock.clone(), tool_source(), "system", cancel);
        let state = ExplorationState::new("https://example.com/game", 10, 0);
        let (state, next) = node.run(state).await.unwrap();
        assert!(matches!(next, Next::End));
        assert_eq!(state.terminated, Some(TerminationReason::Cancelled));
        assert_eq!(mock.call_count(), 0);
    }
}
