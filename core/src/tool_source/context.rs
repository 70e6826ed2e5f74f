//! Context passed into a tool call for the current step.
//!
//! Carries the conversation so far plus the run's thread/user identifiers so
//! a tool can scope state to the owning analysis without the act node
//! threading those ids through every call site individually.

use crate::message::Message;

/// Per-step context available to tools during execution.
///
/// Built by the act node from `RunContext::config` before dispatching tool
/// calls; tools that don't need it ignore it.
#[derive(Debug, Clone, Default)]
pub struct ToolCallContext {
    /// Current conversation messages, after pruning.
    pub recent_messages: Vec<Message>,
    /// Thread/session id for the current run, from `RunnableConfig`.
    pub thread_id: Option<String>,
    /// User id for the current run, from `RunnableConfig`.
    pub user_id: Option<String>,
}

impl ToolCallContext {
    pub fn new(recent_messages: Vec<Message>) -> Self {
        Self {
            recent_messages,
            thread_id: None,
            user_id: None,
        }
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}
