//! The eight tools of the exploration tool surface (spec §4.3), each a
//! thin [`qa_core::tools::Tool`] wrapper around [`BrowserSession`]. Every
//! state-changing tool attaches a screenshot to its result unless the
//! caller suppresses it (`"screenshot": false` in the arguments) — the
//! auto-screenshot rule that halves the number of turns vs. requiring the
//! agent to ask for one separately.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};

use qa_core::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError, ToolSpec};
use qa_core::tools::Tool;

use crate::session::BrowserSession;

fn encode_webp(bytes: Vec<u8>) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

async fn auto_screenshot(session: &BrowserSession, suppress: bool) -> Option<String> {
    if suppress {
        return None;
    }
    session.screenshot(false).await.map(encode_webp)
}

fn suppressed(args: &Value) -> bool {
    args.get("screenshot").and_then(Value::as_bool).map(|b| !b).unwrap_or(false)
}

fn exec_err(e: impl std::fmt::Display) -> ToolSourceError {
    ToolSourceError::Execution(e.to_string())
}

pub struct ScreenshotTool {
    session: Arc<BrowserSession>,
}

impl ScreenshotTool {
    pub fn new(session: Arc<BrowserSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Tool for ScreenshotTool {
    fn name(&self) -> &str {
        "screenshot"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "screenshot".to_string(),
            description: Some("Captures a full-viewport screenshot of the current page.".to_string()),
            input_schema: json!({"type": "object", "properties": {}}),
        }
    }

    async fn call(&self, _args: Value, _ctx: Option<&ToolCallContext>) -> Result<ToolCallContent, ToolSourceError> {
        match self.session.screenshot(true).await {
            Some(bytes) => Ok(ToolCallContent::text("captured viewport").with_image_webp_base64(encode_webp(bytes))),
            None => Err(ToolSourceError::Timeout(15_000)),
        }
    }
}

#[derive(Deserialize)]
struct ClickArgs {
    x: f64,
    y: f64,
    #[serde(default)]
    screenshot: Option<bool>,
}

pub struct ClickTool {
    session: Arc<BrowserSession>,
}

impl ClickTool {
    pub fn new(session: Arc<BrowserSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Tool for ClickTool {
    fn name(&self) -> &str {
        "click"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "click".to_string(),
            description: Some(
                "Clicks at viewport coordinates (x, y). Dispatches a full pointer+mouse event \
                 sequence at the element under the cursor, so canvas-rendered game engines \
                 receive it."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "x": {"type": "number"},
                    "y": {"type": "number"},
                },
                "required": ["x", "y"],
            }),
        }
    }

    async fn call(&self, args: Value, _ctx: Option<&ToolCallContext>) -> Result<ToolCallContent, ToolSourceError> {
        let args: ClickArgs = serde_json::from_value(args).map_err(|e| ToolSourceError::InvalidArgs(e.to_string()))?;
        self.session.click(args.x, args.y).await.map_err(exec_err)?;
        let mut content = ToolCallContent::text(format!("clicked ({}, {})", args.x, args.y));
        if let Some(img) = auto_screenshot(&self.session, args.screenshot == Some(false)).await {
            content = content.with_image_webp_base64(img);
        }
        Ok(content)
    }
}

#[derive(Deserialize)]
struct TypeTextArgs {
    text: String,
    #[serde(default)]
    screenshot: Option<bool>,
}

pub struct TypeTextTool {
    session: Arc<BrowserSession>,
}

impl TypeTextTool {
    pub fn new(session: Arc<BrowserSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Tool for TypeTextTool {
    fn name(&self) -> &str {
        "type_text"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "type_text".to_string(),
            description: Some("Types text via keyboard events into the currently focused element.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"],
            }),
        }
    }

    async fn call(&self, args: Value, _ctx: Option<&ToolCallContext>) -> Result<ToolCallContent, ToolSourceError> {
        let args: TypeTextArgs = serde_json::from_value(args).map_err(|e| ToolSourceError::InvalidArgs(e.to_string()))?;
        self.session.type_text(&args.text).await.map_err(exec_err)?;
        let mut content = ToolCallContent::text(format!("typed {:?}", args.text));
        if let Some(img) = auto_screenshot(&self.session, args.screenshot == Some(false)).await {
            content = content.with_image_webp_base64(img);
        }
        Ok(content)
    }
}

#[derive(Deserialize)]
struct ScrollArgs {
    direction: String,
    #[serde(default = "default_magnitude")]
    magnitude: f64,
    #[serde(default)]
    screenshot: Option<bool>,
}

fn default_magnitude() -> f64 {
    300.0
}

pub struct ScrollTool {
    session: Arc<BrowserSession>,
}

impl ScrollTool {
    pub fn new(session: Arc<BrowserSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Tool for ScrollTool {
    fn name(&self) -> &str {
        "scroll"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "scroll".to_string(),
            description: Some("Scrolls the page in a direction by a magnitude (pixels).".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "direction": {"type": "string", "enum": ["up", "down", "left", "right"]},
                    "magnitude": {"type": "number"},
                },
                "required": ["direction"],
            }),
        }
    }

    async fn call(&self, args: Value, _ctx: Option<&ToolCallContext>) -> Result<ToolCallContent, ToolSourceError> {
        let args: ScrollArgs = serde_json::from_value(args).map_err(|e| ToolSourceError::InvalidArgs(e.to_string()))?;
        let (dx, dy) = match args.direction.as_str() {
            "up" => (0.0, -args.magnitude),
            "down" => (0.0, args.magnitude),
            "left" => (-args.magnitude, 0.0),
            "right" => (args.magnitude, 0.0),
            other => return Err(ToolSourceError::InvalidArgs(format!("unknown direction: {other}"))),
        };
        self.session.scroll(dx, dy).await.map_err(exec_err)?;
        let mut content = ToolCallContent::text(format!("scrolled {} by {}", args.direction, args.magnitude));
        if let Some(img) = auto_screenshot(&self.session, args.screenshot == Some(false)).await {
            content = content.with_image_webp_base64(img);
        }
        Ok(content)
    }
}

#[derive(Deserialize)]
struct WaitArgs {
    milliseconds: u64,
    #[serde(default)]
    screenshot: Option<bool>,
}

pub struct WaitTool {
    session: Arc<BrowserSession>,
}

impl WaitTool {
    pub fn new(session: Arc<BrowserSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Tool for WaitTool {
    fn name(&self) -> &str {
        "wait"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "wait".to_string(),
            description: Some("Sleeps for the given number of milliseconds.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {"milliseconds": {"type": "integer"}},
                "required": ["milliseconds"],
            }),
        }
    }

    async fn call(&self, args: Value, _ctx: Option<&ToolCallContext>) -> Result<ToolCallContent, ToolSourceError> {
        let args: WaitArgs = serde_json::from_value(args).map_err(|e| ToolSourceError::InvalidArgs(e.to_string()))?;
        self.session.wait(args.milliseconds).await;
        let mut content = ToolCallContent::text(format!("waited {}ms", args.milliseconds));
        // The spec marks wait's screenshot as optional, defaulting to
        // suppressed unless explicitly requested — nothing changes on
        // screen by definition, so a screenshot is usually wasted cost.
        if args.screenshot == Some(true) {
            if let Some(img) = auto_screenshot(&self.session, false).await {
                content = content.with_image_webp_base64(img);
            }
        }
        Ok(content)
    }
}

#[derive(Deserialize)]
struct EvaluateJsArgs {
    source: String,
}

pub struct EvaluateJsTool {
    session: Arc<BrowserSession>,
}

impl EvaluateJsTool {
    pub fn new(session: Arc<BrowserSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Tool for EvaluateJsTool {
    fn name(&self) -> &str {
        "evaluate_js"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "evaluate_js".to_string(),
            description: Some("Executes JavaScript in the page and returns a JSON-serializable result (truncated).".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {"source": {"type": "string"}},
                "required": ["source"],
            }),
        }
    }

    async fn call(&self, args: Value, _ctx: Option<&ToolCallContext>) -> Result<ToolCallContent, ToolSourceError> {
        let args: EvaluateJsArgs = serde_json::from_value(args).map_err(|e| ToolSourceError::InvalidArgs(e.to_string()))?;
        let result = self.session.evaluate_js(&args.source).await.map_err(exec_err)?;
        Ok(ToolCallContent::text(result.to_string()))
    }
}

pub struct GetPageInfoTool {
    session: Arc<BrowserSession>,
}

impl GetPageInfoTool {
    pub fn new(session: Arc<BrowserSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Tool for GetPageInfoTool {
    fn name(&self) -> &str {
        "get_page_info"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "get_page_info".to_string(),
            description: Some("Returns the page's URL, title, and viewport.".to_string()),
            input_schema: json!({"type": "object", "properties": {}}),
        }
    }

    async fn call(&self, _args: Value, _ctx: Option<&ToolCallContext>) -> Result<ToolCallContent, ToolSourceError> {
        let info = self.session.page_info().await.map_err(exec_err)?;
        Ok(ToolCallContent::text(info.to_string()))
    }
}

#[derive(Deserialize)]
struct NavigateArgs {
    url: String,
    #[serde(default)]
    screenshot: Option<bool>,
}

pub struct NavigateTool {
    session: Arc<BrowserSession>,
}

impl NavigateTool {
    pub fn new(session: Arc<BrowserSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Tool for NavigateTool {
    fn name(&self) -> &str {
        "navigate"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "navigate".to_string(),
            description: Some("Navigates to a URL and waits for the page to become ready.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {"url": {"type": "string"}},
                "required": ["url"],
            }),
        }
    }

    async fn call(&self, args: Value, _ctx: Option<&ToolCallContext>) -> Result<ToolCallContent, ToolSourceError> {
        let args: NavigateArgs = serde_json::from_value(args).map_err(|e| ToolSourceError::InvalidArgs(e.to_string()))?;
        self.session.navigate(&args.url).await.map_err(exec_err)?;
        let mut content = ToolCallContent::text(format!("navigated to {}", args.url));
        if let Some(img) = auto_screenshot(&self.session, args.screenshot == Some(false)).await {
            content = content.with_image_webp_base64(img);
        }
        Ok(content)
    }
}

/// Registers all eight tools against the same session (spec §4.3).
pub fn register_all(registry: &mut qa_core::tools::ToolRegistry, session: Arc<BrowserSession>) {
    registry.register(Arc::new(ScreenshotTool::new(Arc::clone(&session))));
    registry.register(Arc::new(ClickTool::new(Arc::clone(&session))));
    registry.register(Arc::new(TypeTextTool::new(Arc::clone(&session))));
    registry.register(Arc::new(ScrollTool::new(Arc::clone(&session))));
    registry.register(Arc::new(WaitTool::new(Arc::clone(&session))));
    registry.register(Arc::new(EvaluateJsTool::new(Arc::clone(&session))));
    registry.register(Arc::new(GetPageInfoTool::new(Arc::clone(&session))));
    registry.register(Arc::new(NavigateTool::new(session)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppressed_reads_the_screenshot_flag() {
        assert!(!suppressed(&json!({})));
        assert!(!suppressed(&json!({"screenshot": true})));
        assert!(suppressed(&json!({"screenshot": false})));
    }
}
