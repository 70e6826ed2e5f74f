//! Error kinds for the exploration agent loop and graph engine.
//!
//! Mirrors the eight error kinds used throughout the platform (transient LLM,
//! LLM protocol, tool execution, browser fatal, budget exceeded, queue
//! timeout, subprocess crash, cancelled) so that callers can match on `kind()`
//! without downcasting.

use thiserror::Error;

/// Coarse error kind, independent of the underlying cause. Used by the
/// supervisor and `store` to decide retry/terminal handling without matching
/// on every concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TransientLlm,
    LlmProtocol,
    ToolExec,
    BrowserFatal,
    BudgetExceeded,
    QueueTimeout,
    SubprocessCrash,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("llm call failed (transient): {0}")]
    TransientLlm(String),

    #[error("llm returned a malformed response: {0}")]
    LlmProtocol(String),

    #[error("tool execution failed: {0}")]
    ToolExec(String),

    #[error("browser session failed fatally: {0}")]
    BrowserFatal(String),

    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("admission queue wait timed out")]
    QueueTimeout,

    #[error("subprocess crashed: {0}")]
    SubprocessCrash(String),

    #[error("cancelled")]
    Cancelled,

    #[error("graph node error: {0}")]
    Node(String),
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TransientLlm(_) => ErrorKind::TransientLlm,
            Self::LlmProtocol(_) => ErrorKind::LlmProtocol,
            Self::ToolExec(_) => ErrorKind::ToolExec,
            Self::BrowserFatal(_) => ErrorKind::BrowserFatal,
            Self::BudgetExceeded(_) => ErrorKind::BudgetExceeded,
            Self::QueueTimeout => ErrorKind::QueueTimeout,
            Self::SubprocessCrash(_) => ErrorKind::SubprocessCrash,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Node(_) => ErrorKind::ToolExec,
        }
    }

    /// Whether the error kind is worth retrying with backoff (transient LLM
    /// failures only; everything else is terminal for the current attempt).
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::TransientLlm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_llm_is_retryable() {
        assert!(AgentError::TransientLlm("timeout".into()).is_retryable());
        assert!(!AgentError::LlmProtocol("bad json".into()).is_retryable());
        assert!(!AgentError::Cancelled.is_retryable());
    }
}
