use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("page did not become ready within the readiness budget")]
    ReadinessTimeout,
    #[error("script evaluation failed: {0}")]
    Evaluate(String),
    #[error("screenshot capture failed: {0}")]
    Screenshot(String),
    #[error("screenshot capture timed out after {0}ms")]
    ScreenshotTimeout(u64),
    #[error("the page/browser has disconnected")]
    Disconnected,
}

impl From<BrowserError> for qa_core::AgentError {
    fn from(e: BrowserError) -> Self {
        match e {
            BrowserError::Disconnected => qa_core::AgentError::BrowserFatal(e.to_string()),
            _ => qa_core::AgentError::ToolExec(e.to_string()),
        }
    }
}
