//! The exploration agent loop (spec §4.4): a `think` → `act` → `budget`
//! `StateGraph` cycle. `think` calls the LLM and parses tool calls; `act`
//! executes them and records one step per call; `budget` merges results
//! back into the conversation, prunes screenshots, places cache markers,
//! and decides whether to loop back to `think` or terminate.
//!
//! The static graph is a straight line, `START -> think -> act -> budget ->
//! END`; the think/budget cycle and every early termination are dynamic
//! jumps via `Next::Node`/`Next::End`, not graph branches, so the chain
//! still validates as linear (see `graph::state_graph`).

mod act_node;
mod budget_node;
pub mod pseudo_tools;
mod think_node;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use act_node::ActNode;
pub use budget_node::{BudgetNode, BudgetPolicy};
pub use think_node::ThinkNode;

use crate::error::AgentError;
use crate::graph::{StateGraph, END, START};
use crate::llm::{LlmClient, LlmUsage};
use crate::memory::{Checkpointer, RunnableConfig};
pub use crate::state::TerminationReason;
use crate::state::ExplorationState;
use crate::tool_source::ToolSource;

/// One persisted Agent Step row (spec §3): one per tool invocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExplorationStep {
    pub step_number: u32,
    pub tool_name: String,
    pub input: serde_json::Value,
    pub result_summary: String,
    pub screenshot_base64: Option<String>,
    pub duration_ms: u64,
    /// Only set on the first step of the turn that produced it.
    pub thinking_ms: Option<u64>,
    /// Only set on the first step of the turn that produced it.
    pub reasoning: Option<String>,
    pub error: Option<String>,
    /// Only set on the first step of the turn that produced it.
    pub usage: Option<LlmUsage>,
}

/// Durable sink for steps as they're produced. Implemented by the `store`
/// crate; tests use an in-memory collector.
#[async_trait]
pub trait StepSink: Send + Sync {
    async fn record_step(&self, step: ExplorationStep) -> Result<(), AgentError>;
}

/// Configuration for one exploration run, resolved from a profile
/// (`quick`/`balanced`/`thorough`/`maximum`/`debug`, spec §6) plus the
/// per-analysis URL.
#[derive(Clone, Debug)]
pub struct ExploreConfig {
    pub system_prompt: String,
    pub step_budget: u32,
    /// Absolute deadline, unix epoch milliseconds.
    pub deadline_unix_ms: i64,
    pub budget_policy: BudgetPolicy,
}

/// Final result of an exploration run.
pub struct ExplorationTranscript {
    pub final_state: ExplorationState,
    pub termination_reason: TerminationReason,
}

impl ExplorationTranscript {
    pub fn total_usage(&self) -> LlmUsage {
        self.final_state.total_usage
    }

    pub fn step_count(&self) -> u32 {
        self.final_state.step_count
    }

    pub fn turn_count(&self) -> u32 {
        self.final_state.turn_count
    }
}

/// Runs the think/act/budget cycle to completion.
///
/// `initial_url` seeds the first user message (the game URL the agent is
/// told to explore); `cancel_flag` is checked by both `think` (before
/// spending a turn) and `budget` (after one), so cancellation always wins
/// over every other stop condition.
#[allow(clippy::too_many_arguments)]
pub async fn explore(
    config: ExploreConfig,
    initial_url: impl Into<String>,
    llm: Arc<dyn LlmClient>,
    tool_source: Arc<dyn ToolSource>,
    step_sink: Option<Arc<dyn StepSink>>,
    cancel_flag: Arc<AtomicBool>,
    checkpointer: Option<Arc<dyn Checkpointer<ExplorationState>>>,
    runnable_config: RunnableConfig,
) -> Result<ExplorationTranscript, AgentError> {
    let think = ThinkNode::new(
        Arc::clone(&llm),
        Arc::clone(&tool_source),
        config.system_prompt.clone(),
        Arc::clone(&cancel_flag),
    );
    let act = ActNode::new(Arc::clone(&tool_source), step_sink);
    let budget = BudgetNode::new(config.budget_policy.clone(), Arc::clone(&cancel_flag));

    let mut graph = StateGraph::<ExplorationState>::new();
    graph.add_node("think", Arc::new(think));
    graph.add_node("act", Arc::new(act));
    graph.add_node("budget", Arc::new(budget));
    graph.add_edge(START, "think");
    graph.add_edge("think", "act");
    graph.add_edge("act", "budget");
    graph.add_edge("budget", END);

    let compiled = match checkpointer {
        Some(saver) => graph
            .compile_with_checkpointer(saver)
            .map_err(|e| AgentError::Node(e.to_string()))?,
        None => graph.compile().map_err(|e| AgentError::Node(e.to_string()))?,
    };

    let initial_state =
        ExplorationState::new(initial_url, config.step_budget, config.deadline_unix_ms);
    let final_state = compiled.invoke(initial_state, runnable_config).await?;
    let termination_reason = final_state.terminated.unwrap_or(TerminationReason::ModelTerminal);

    Ok(ExplorationTranscript {
        final_state,
        termination_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, MockLlm, StopReason};
    use crate::message::ContentBlock;
    use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError, ToolSpec};
    use crate::tools::{AggregateToolSource, Tool, ToolRegistry};
    use serde_json::json;
    use std::sync::Mutex;

    struct ScreenshotTool;

    #[async_trait]
    impl Tool for ScreenshotTool {
        fn name(&self) -> &str {
            "screenshot"
        }
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "screenshot".into(),
                description: Some("capture the viewport".into()),
                input_schema: json!({"type": "object", "properties": {}}),
            }
        }
        async fn call(
            &self,
            _args: serde_json::Value,
            _ctx: Option<&ToolCallContext>,
        ) -> Result<ToolCallContent, ToolSourceError> {
            Ok(ToolCallContent::text("captured").with_image_webp_base64("img"))
        }
    }

    struct CollectingSink(Mutex<Vec<ExplorationStep>>);

    #[async_trait]
    impl StepSink for CollectingSink {
        async fn record_step(&self, step: ExplorationStep) -> Result<(), AgentError> {
            self.0.lock().unwrap().push(step);
            Ok(())
        }
    }

    #[tokio::test]
    async fn happy_path_runs_until_model_declares_completion() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(ScreenshotTool));
        let tool_source: Arc<dyn ToolSource> = Arc::new(AggregateToolSource::new(registry));

        let mock = Arc::new(MockLlm::new(vec![
            LlmResponse {
                content: vec![ContentBlock::ToolUse {
                    id: "tc1".into(),
                    name: "screenshot".into(),
                    input: json!({}),
                    cache_control: None,
                }],
                stop_reason: StopReason::ToolUse,
                usage: LlmUsage::default(),
            },
            LlmResponse {
                content: vec![ContentBlock::text("EXPLORATION_COMPLETE")],
                stop_reason: StopReason::EndTurn,
                usage: LlmUsage::default(),
            },
        ]));

        let sink = Arc::new(CollectingSink(Mutex::new(Vec::new())));
        let config = ExploreConfig {
            system_prompt: "explore the game".into(),
            step_budget: 15,
            deadline_unix_ms: i64::MAX,
            budget_policy: BudgetPolicy::default(),
        };

        let transcript = explore(
            config,
            "https://example.com/game",
            mock,
            tool_source,
            Some(sink.clone()),
            Arc::new(AtomicBool::new(false)),
            None,
            RunnableConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(transcript.termination_reason, TerminationReason::ModelTerminal);
        assert_eq!(transcript.step_count(), 1);
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn terminates_on_step_budget_with_zero_budget() {
        let tool_source: Arc<dyn ToolSource> = Arc::new(AggregateToolSource::new(ToolRegistry::new()));
        let mock = Arc::new(MockLlm::new(vec![LlmResponse {
            content: vec![ContentBlock::ToolUse {
                id: "tc1".into(),
                name: "screenshot".into(),
                input: json!({}),
                cache_control: None,
            }],
            stop_reason: StopReason::ToolUse,
            usage: LlmUsage::default(),
        }]));
        let config = ExploreConfig {
            system_prompt: "explore".into(),
            step_budget: 0,
            deadline_unix_ms: i64::MAX,
            budget_policy: BudgetPolicy::default(),
        };
        let transcript = explore(
            config,
            "https://example.com/game",
            mock,
            tool_source,
            None,
            Arc::new(AtomicBool::new(false)),
            None,
            RunnableConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(
            transcript.termination_reason,
            TerminationReason::StepBudgetExhausted
        );
    }
}
