use async_trait::async_trait;
use serde_json::Value;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSource, ToolSourceError, ToolSpec};
use crate::tools::ToolRegistry;

/// Implements [`ToolSource`] by dispatching into a [`ToolRegistry`]. This is
/// the tool source the exploration loop's act node holds; the browser crate
/// registers its eight tools into one at session startup.
pub struct AggregateToolSource {
    registry: ToolRegistry,
}

impl AggregateToolSource {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ToolSource for AggregateToolSource {
    fn specs(&self) -> Vec<ToolSpec> {
        self.registry.list()
    }

    async fn call_tool(
        &self,
        name: &str,
        args: Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| ToolSourceError::NotFound(name.to_string()))?;
        tool.call(args, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct AlwaysErrorsTool;

    #[async_trait]
    impl Tool for AlwaysErrorsTool {
        fn name(&self) -> &str {
            "boom"
        }
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "boom".to_string(),
                description: None,
                input_schema: serde_json::json!({}),
            }
        }
        async fn call(
            &self,
            _args: Value,
            _ctx: Option<&ToolCallContext>,
        ) -> Result<ToolCallContent, ToolSourceError> {
            Err(ToolSourceError::Execution("always fails".into()))
        }
    }

    #[tokio::test]
    async fn call_tool_returns_not_found_for_unregistered_name() {
        let source = AggregateToolSource::new(ToolRegistry::new());
        let err = source.call_tool("missing", Value::Null, None).await.unwrap_err();
        assert!(matches!(err, ToolSourceError::NotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn call_tool_propagates_tool_errors() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(AlwaysErrorsTool));
        let source = AggregateToolSource::new(registry);
        let err = source.call_tool("boom", Value::Null, None).await.unwrap_err();
        assert!(matches!(err, ToolSourceError::Execution(_)));
    }
}
