//! Budget pseudo-tools (spec §4.4 step 8): `request_more_steps(count)` and
//! `request_more_time(minutes)`, the model's only way to ask for more budget
//! mid-run. Registered into the same registry as the real browser tools so
//! the LLM can see and call them; `ActNode` recognizes both by name and
//! stages the request onto `ExplorationState` rather than forwarding it to
//! `ToolSource`, since granting it means mutating run state, not touching
//! the page. Each `call()` below is still a faithful implementation in its
//! own right (exercised directly in tests), it's just not the path the
//! exploration loop takes in practice.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError, ToolSpec};
use crate::tools::{Tool, ToolRegistry};

pub struct RequestMoreStepsTool;

#[async_trait]
impl Tool for RequestMoreStepsTool {
    fn name(&self) -> &str {
        "request_more_steps"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: Some(
                "Ask for additional exploration steps beyond the current budget, when there's \
                 clearly more to see than the remaining steps allow. The granted amount may be \
                 less than requested if it would exceed the run's step ceiling."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {"count": {"type": "integer", "minimum": 1}},
                "required": ["count"],
            }),
        }
    }

    async fn call(
        &self,
        args: Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let count = args.get("count").and_then(Value::as_u64).ok_or_else(|| {
            ToolSourceError::InvalidArgs("request_more_steps requires an integer \"count\"".to_string())
        })?;
        Ok(ToolCallContent::text(format!("requested {count} additional steps")))
    }
}

pub struct RequestMoreTimeTool;

#[async_trait]
impl Tool for RequestMoreTimeTool {
    fn name(&self) -> &str {
        "request_more_time"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: Some(
                "Ask for additional wall-clock minutes beyond the current deadline. The granted \
                 amount may be less than requested if it would exceed the run's timeout ceiling."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {"minutes": {"type": "integer", "minimum": 1}},
                "required": ["minutes"],
            }),
        }
    }

    async fn call(
        &self,
        args: Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let minutes = args.get("minutes").and_then(Value::as_u64).ok_or_else(|| {
            ToolSourceError::InvalidArgs("request_more_time requires an integer \"minutes\"".to_string())
        })?;
        Ok(ToolCallContent::text(format!("requested {minutes} additional minutes")))
    }
}

/// Registers both budget pseudo-tools (spec §4.4 step 8).
pub fn register_all(registry: &mut ToolRegistry) {
    registry.register(Arc::new(RequestMoreStepsTool));
    registry.register(Arc::new(RequestMoreTimeTool));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_more_steps_echoes_the_requested_count() {
        let content = RequestMoreStepsTool.call(json!({"count": 10}), None).await.unwrap();
        assert!(content.text.contains("10"));
    }

    #[tokio::test]
    async fn request_more_steps_rejects_a_missing_count() {
        let err = RequestMoreStepsTool.call(json!({}), None).await.unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidArgs(_)));
    }

    #[tokio::test]
    async fn request_more_time_echoes_the_requested_minutes() {
        let content = RequestMoreTimeTool.call(json!({"minutes": 5}), None).await.unwrap();
        assert!(content.text.contains('5'));
    }

    #[test]
    fn register_all_adds_both_tools_in_order() {
        let mut registry = ToolRegistry::new();
        register_all(&mut registry);
        let names: Vec<String> = registry.list().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["request_more_steps", "request_more_time"]);
    }
}
