//! End-to-end exercise of the think/act/budget exploration loop against a
//! scripted `MockLlm` and an in-process tool registry, mirroring the
//! platform's own "happy path" acceptance scenario: screenshot, click,
//! type_text, screenshot, then a model-terminal turn.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use qa_core::agent::explore::{explore, ExploreConfig, ExplorationStep, StepSink};
use qa_core::error::AgentError;
use qa_core::llm::{LlmResponse, LlmUsage, MockLlm, StopReason};
use qa_core::memory::RunnableConfig;
use qa_core::message::ContentBlock;
use qa_core::state::TerminationReason;
use qa_core::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError, ToolSpec};
use qa_core::tools::{AggregateToolSource, Tool, ToolRegistry};
use serde_json::{json, Value};

struct RecordingTool {
    name: &'static str,
    with_screenshot: bool,
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        self.name
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.to_string(),
            description: None,
            input_schema: json!({"type": "object"}),
        }
    }

    async fn call(
        &self,
        args: Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let content = ToolCallContent::text(format!("{} ok: {args}", self.name));
        if self.with_screenshot {
            Ok(content.with_image_webp_base64("fake-webp-bytes"))
        } else {
            Ok(content)
        }
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

fn tool_use(id: &str, name: &str, input: Value) -> ContentBlock {
    ContentBlock::ToolUse {
        id: id.to_string(),
        name: name.to_string(),
        input,
        cache_control: None,
    }
}

#[tokio::test]
async fn happy_path_screenshot_click_type_screenshot_then_complete() {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(RecordingTool {
        name: "screenshot",
        with_screenshot: true,
    }));
    registry.register(Arc::new(RecordingTool {
        name: "click",
        with_screenshot: false,
    }));
    registry.register(Arc::new(RecordingTool {
        name: "type_text",
        with_screenshot: false,
    }));
    let tool_source = Arc::new(AggregateToolSource::new(registry));

    let mock = Arc::new(MockLlm::new(vec![
        LlmResponse {
            content: vec![tool_use("tc1", "screenshot", json!({}))],
            stop_reason: StopReason::ToolUse,
            usage: LlmUsage {
                input_tokens: 100,
                output_tokens: 20,
                ..Default::default()
            },
        },
        LlmResponse {
            content: vec![tool_use("tc2", "click", json!({"x": 640, "y": 360}))],
            stop_reason: StopReason::ToolUse,
            usage: LlmUsage {
                input_tokens: 110,
                output_tokens: 15,
                ..Default::default()
            },
        },
        LlmResponse {
            content: vec![tool_use("tc3", "type_text", json!({"text": "Start"}))],
            stop_reason: StopReason::ToolUse,
            usage: LlmUsage {
                input_tokens: 120,
                output_tokens: 15,
                ..Default::default()
            },
        },
        LlmResponse {
            content: vec![tool_use("tc4", "screenshot", json!({}))],
            stop_reason: StopReason::ToolUse,
            usage: LlmUsage {
                input_tokens: 130,
                output_tokens: 15,
                ..Default::default()
            },
        },
        LlmResponse {
            content: vec![ContentBlock::text("EXPLORATION_COMPLETE")],
            stop_reason: StopReason::EndTurn,
            usage: LlmUsage {
                input_tokens: 140,
                output_tokens: 10,
                ..Default::default()
            },
        },
    ]));

    let sink = Arc::new(CollectingSink(Mutex::new(Vec::new())));
    let config = ExploreConfig {
        system_prompt: "explore the game and report EXPLORATION_COMPLETE when done".to_string(),
        step_budget: 15,
        deadline_unix_ms: i64::MAX,
        budget_policy: Default::default(),
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
    .expect("exploration loop should complete without error");

    assert_eq!(transcript.termination_reason, TerminationReason::ModelTerminal);
    assert_eq!(transcript.step_count(), 4);
    assert_eq!(transcript.turn_count(), 5);

    let steps = sink.0.lock().unwrap();
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[0].tool_name, "screenshot");
    assert!(steps[0].screenshot_base64.is_some());
    assert!(steps[0].thinking_ms.is_some(), "first step of the turn carries thinking time");

    let total_usage = transcript.total_usage();
    assert_eq!(total_usage.input_tokens, 100 + 110 + 120 + 130 + 140);
    assert_eq!(total_usage.output_tokens, 20 + 15 + 15 + 15 + 10);
}

#[tokio::test]
async fn cancellation_flag_stops_the_loop_before_the_next_model_call() {
    let tool_source = Arc::new(AggregateToolSource::new(ToolRegistry::new()));
    let mock = Arc::new(MockLlm::new(vec![LlmResponse {
        content: vec![tool_use("tc1", "noop", json!({}))],
        stop_reason: StopReason::ToolUse,
        usage: LlmUsage::default(),
    }]));

    let cancel_flag = Arc::new(AtomicBool::new(false));
    let config = ExploreConfig {
        system_prompt: "explore".to_string(),
        step_budget: 50,
        deadline_unix_ms: i64::MAX,
        budget_policy: Default::default(),
    };

    // Flip cancellation before the run starts; think must never call the model.
    cancel_flag.store(true, std::sync::atomic::Ordering::SeqCst);

    let transcript = explore(
        config,
        "https://example.com/game",
        mock.clone(),
        tool_source,
        None,
        cancel_flag,
        None,
        RunnableConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(transcript.termination_reason, TerminationReason::Cancelled);
    assert_eq!(mock.call_count(), 0);
}
