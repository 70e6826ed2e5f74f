use async_trait::async_trait;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError, ToolSpec};

/// A single tool that can be called by the LLM.
///
/// Each tool has a unique name, a specification (description and JSON
/// schema) handed to the model, and the call logic itself. Tools are
/// registered with a [`ToolRegistry`](crate::tools::ToolRegistry) and
/// dispatched through [`AggregateToolSource`](crate::tools::AggregateToolSource).
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use qa_core::tools::Tool;
/// use qa_core::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError, ToolSpec};
///
/// struct MyTool;
///
/// #[async_trait]
/// impl Tool for MyTool {
///     fn name(&self) -> &str {
///         "my_tool"
///     }
///
///     fn spec(&self) -> ToolSpec {
///         ToolSpec {
///             name: "my_tool".to_string(),
///             description: Some("A sample tool".to_string()),
///             input_schema: serde_json::json!({}),
///         }
///     }
///
///     async fn call(
///         &self,
///         _args: Value,
///         _ctx: Option<&ToolCallContext>,
///     ) -> Result<ToolCallContent, ToolSourceError> {
///         Ok(ToolCallContent::text("tool executed"))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name, used as the key in `ToolRegistry` and as the LLM-facing
    /// tool identifier.
    fn name(&self) -> &str;

    /// Description and JSON schema handed to the LLM alongside the system
    /// prompt (spec §4.4 step 1).
    fn spec(&self) -> ToolSpec;

    /// Executes the tool. State-changing tools (click/type_text/scroll/wait/
    /// navigate) are expected to attach a screenshot to the returned
    /// `ToolCallContent` unless the caller suppresses it (spec §4.3
    /// auto-screenshot rule).
    async fn call(
        &self,
        args: serde_json::Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError>;
}
