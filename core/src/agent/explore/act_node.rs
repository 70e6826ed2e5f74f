//! Act: execute the turn's tool calls in order, record one step per call,
//! and fill `tool_results` for the budget node to merge back into the
//! conversation (spec §4.4 steps 6-7).

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::agent::explore::{ExplorationStep, StepSink};
use crate::error::AgentError;
use crate::graph::{Next, Node};
use crate::state::{ExplorationState, ToolCall, ToolResult};
use crate::tool_source::{ToolCallContext, ToolSource};

pub struct ActNode {
    tool_source: Arc<dyn ToolSource>,
    step_sink: Option<Arc<dyn StepSink>>,
}

impl ActNode {
    pub fn new(tool_source: Arc<dyn ToolSource>, step_sink: Option<Arc<dyn StepSink>>) -> Self {
        Self {
            tool_source,
            step_sink,
        }
    }

    /// Intercepts the two budget pseudo-tools before they'd otherwise reach
    /// `ToolSource`: granting a budget request mutates `ExplorationState`,
    /// not the page, so neither counts as an exploration step or gets a
    /// recorded screenshot (spec §4.4 step 8). Returns `None` for every
    /// other tool name, leaving it to the normal dispatch path below.
    fn handle_pseudo_tool(state: &mut ExplorationState, call: &ToolCall) -> Option<ToolResult> {
        let outcome: Result<String, &str> = match call.name.as_str() {
            "request_more_steps" => match call.input.get("count").and_then(Value::as_u64) {
                Some(count) => {
                    let count = count as u32;
                    *state.pending_step_request.get_or_insert(0) += count;
                    Ok(format!("requested {count} additional steps"))
                }
                None => Err("request_more_steps requires an integer \"count\""),
            },
            "request_more_time" => match call.input.get("minutes").and_then(Value::as_u64) {
                Some(minutes) => {
                    *state.pending_time_request_ms.get_or_insert(0) += minutes as i64 * 60_000;
                    Ok(format!("requested {minutes} additional minutes"))
                }
                None => Err("request_more_time requires an integer \"minutes\""),
            },
            _ => return None,
        };

        Some(match outcome {
            Ok(text) => ToolResult {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                text,
                image_base64: None,
                is_error: false,
                duration_ms: 0,
            },
            Err(text) => ToolResult {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                text: text.to_string(),
                image_base64: None,
                is_error: true,
                duration_ms: 0,
            },
        })
    }
}

#[async_trait]
impl Node<ExplorationState> for ActNode {
    fn id(&self) -> &str {
        "act"
    }

    async fn run(&self, mut state: ExplorationState) -> Result<(ExplorationState, Next), AgentError> {
        let ctx = ToolCallContext::new(state.messages.clone());
        let calls = std::mem::take(&mut state.tool_calls);
        // thinking_ms/reasoning are per-turn, not per-step; attach them only
        // to the first step the turn produces (spec §3 Agent Step).
        let mut thinking_ms = state.thinking_ms.take();
        let mut reasoning = state.reasoning.take();
        let mut turn_usage = Some(state.total_usage);

        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            if let Some(result) = Self::handle_pseudo_tool(&mut state, &call) {
                results.push(result);
                continue;
            }

            let started = Instant::now();
            let outcome = self
                .tool_source
                .call_tool(&call.name, call.input.clone(), Some(&ctx))
                .await;
            let duration_ms = started.elapsed().as_millis() as u64;

            let (text, image_base64, error) = match outcome {
                Ok(content) => (content.text, content.image.map(|i| i.data), None),
                Err(err) => {
                    warn!(tool = %call.name, error = %err, "act: tool call failed");
                    (String::new(), None, Some(err.to_string()))
                }
            };

            state.step_count += 1;
            let step = ExplorationStep {
                step_number: state.step_count,
                tool_name: call.name.clone(),
                input: call.input.clone(),
                result_summary: text.clone(),
                screenshot_base64: image_base64.clone(),
                duration_ms,
                thinking_ms: thinking_ms.take(),
                reasoning: reasoning.take(),
                error: error.clone(),
                usage: turn_usage.take(),
            };
            if let Some(sink) = &self.step_sink {
                sink.record_step(step).await?;
            }

            results.push(ToolResult {
                tool_call_id: call.id,
                tool_name: call.name,
                text,
                image_base64,
                is_error: error.is_some(),
                duration_ms,
            });
        }

        state.tool_results = results;
        Ok((state, Next::Continue))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool_source::{ToolCallContent, ToolCallImage, ToolSourceError, ToolSpec};
    use crate::tools::{AggregateToolSource, Tool, ToolRegistry};
    use crate::state::ToolCall;
    use serde_json::{json, Value};

    struct ScreenshotTool;

    #[async_trait]
    impl Tool for ScreenshotTool {
        fn name(&self) -> &str {
            "screenshot"
        }
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "screenshot".into(),
                description: None,
                input_schema: json!({}),
            }
        }
        async fn call(
            &self,
            _args: Value,
            _ctx: Option<&ToolCallContext>,
        ) -> Result<ToolCallContent, ToolSourceError> {
            Ok(ToolCallContent {
                text: "captured".into(),
                image: Some(ToolCallImage {
                    data: "base64data".into(),
                    media_type: "image/webp".into(),
                }),
            })
        }
    }

    fn tool_source_with_screenshot() -> Arc<dyn ToolSource> {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(ScreenshotTool));
        Arc::new(AggregateToolSource::new(registry))
    }

    #[tokio::test]
    async fn executes_each_tool_call_and_increments_step_count() {
        let node = ActNode::new(tool_source_with_screenshot(), None);
        let mut state = ExplorationState::new("https://example.com/game", 10, 0);
        state.tool_calls = vec![ToolCall {
            id: "tc1".into(),
            name: "screenshot".into(),
            input: json!({}),
        }];
        let (state, next) = node.run(state).await.unwrap();
        assert!(matches!(next, Next::Continue));
        assert_eq!(state.step_count, 1);
        assert_eq!(state.tool_results.len(), 1);
        assert_eq!(state.tool_results[0].image_base64.as_deref(), Some("base64data"));
        assert!(state.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn unknown_tool_produces_error_result_without_failing_the_node() {
        let node = ActNode::new(tool_source_with_screenshot(), None);
        let mut state = ExplorationState::new("https://example.com/game", 10, 0);
        state.tool_calls = vec![ToolCall {
            id: "tc1".into(),
            name: "nonexistent".into(),
            input: json!({}),
        }];
        let (state, _next) = node.run(state).await.unwrap();
        assert!(state.tool_results[0].is_error);
    }

    #[tokio::test]
    async fn request_more_steps_is_staged_on_state_without_counting_as_a_step() {
        let node = ActNode::new(tool_source_with_screenshot(), None);
        let mut state = ExplorationState::new("https://example.com/game", 10, 0);
        state.tool_calls = vec![ToolCall {
            id: "tc1".into(),
            name: "request_more_steps".into(),
            input: json!({"count": 10}),
        }];
        let (state, _next) = node.run(state).await.unwrap();
        assert_eq!(state.step_count, 0);
        assert_eq!(state.pending_step_request, Some(10));
        assert!(!state.tool_results[0].is_error);
    }

    #[tokio::test]
    async fn request_more_time_without_minutes_is_an_error_result() {
        let node = ActNode::new(tool_source_with_screenshot(), None);
        let mut state = ExplorationState::new("https://example.com/game", 10, 0);
        state.tool_calls = vec![ToolCall {
            id: "tc1".into(),
            name: "request_more_time".into(),
            input: json!({}),
        }];
        let (state, _next) = node.run(state).await.unwrap();
        assert!(state.tool_results[0].is_error);
        assert_eq!(state.pending_time_request_ms, None);
    }
}
