//! Tool surface shared by the exploration loop's act node and whatever owns
//! the actual tool implementations (the `browser` crate registers its eight
//! tools here; tests register a scripted stand-in). A tool is a name, a
//! JSON-schema spec handed to the LLM, and a call returning text plus an
//! optional screenshot (spec §4.3 auto-screenshot rule).

mod context;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use context::ToolCallContext;

/// Tool description handed to the LLM: name, free-text description, and the
/// JSON schema validating its arguments.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// A screenshot returned alongside a tool's text result. State-changing
/// tools attach one unless explicitly suppressed (spec §4.3).
#[derive(Clone, Debug)]
pub struct ToolCallImage {
    pub data: String,
    pub media_type: String,
}

/// Result of one tool call.
#[derive(Clone, Debug, Default)]
pub struct ToolCallContent {
    pub text: String,
    pub image: Option<ToolCallImage>,
}

impl ToolCallContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }

    pub fn with_image_webp_base64(mut self, data: impl Into<String>) -> Self {
        self.image = Some(ToolCallImage {
            data: data.into(),
            media_type: "image/webp".to_string(),
        });
        self
    }
}

#[derive(Debug, Error)]
pub enum ToolSourceError {
    #[error("unknown tool: {0}")]
    NotFound(String),
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("tool execution failed: {0}")]
    Execution(String),
    #[error("tool call timed out after {0}ms")]
    Timeout(u64),
}

/// Aggregate of callable tools, addressed by name. The act node calls
/// through this trait rather than holding individual `Tool` instances, so
/// the browser's live tool source and a scripted test double are
/// interchangeable.
#[async_trait]
pub trait ToolSource: Send + Sync {
    fn specs(&self) -> Vec<ToolSpec>;

    async fn call_tool(
        &self,
        name: &str,
        args: Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError>;
}
