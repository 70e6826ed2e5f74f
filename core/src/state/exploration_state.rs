use serde::{Deserialize, Serialize};

use crate::llm::LlmUsage;
use crate::message::Message;

/// One tool invocation requested by the model in a single think turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Result of executing one `ToolCall` via `ToolSource`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub text: String,
    /// Base64 webp screenshot, present when the tool attached one (spec §4.3
    /// auto-screenshot rule).
    pub image_base64: Option<String>,
    pub is_error: bool,
    pub duration_ms: u64,
}

/// Position of one screenshot currently kept verbatim in `messages`, tracked
/// so the budget node can elide it once it falls outside the pruning window
/// without having to re-scan for "which image is step N" (spec §4.4 step 3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageMarker {
    pub message_index: usize,
    pub block_index: usize,
    pub step_number: u32,
}

/// Why the exploration loop stopped. Evaluated by the budget node in
/// priority order: cancellation beats step budget beats time budget beats
/// the model's own terminal signal (spec §4.4 step 9).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    Cancelled,
    StepBudgetExhausted,
    TimeBudgetExhausted,
    ModelTerminal,
}

/// State threaded through the think → act → budget cycle.
///
/// This is checkpointed after every node (spec §4.2/§9 resumability), so
/// every field is plain data: no handles, no open connections. Budget
/// bookkeeping (deadline, extension grants) travels with the state rather
/// than living in the node so a resumed run picks up exactly where the
/// crashed one left off.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExplorationState {
    pub messages: Vec<Message>,
    /// Tool calls parsed from the model's last response; consumed by act,
    /// cleared by budget once merged into `tool_results`.
    pub tool_calls: Vec<ToolCall>,
    /// Results of the turn's tool calls; consumed and cleared by budget.
    pub tool_results: Vec<ToolResult>,
    /// Reasoning text from the model's last response, attached to the first
    /// step row of the turn it produced (spec §4.4 step 7).
    pub reasoning: Option<String>,
    /// Wall-clock time spent awaiting the model on the last turn.
    pub thinking_ms: Option<u64>,
    pub step_count: u32,
    pub turn_count: u32,
    pub step_budget: u32,
    /// Steps granted beyond `step_budget` so far, via the model calling the
    /// `request_more_steps` pseudo-tool and the budget node clamping the
    /// request to the profile's step ceiling.
    pub extra_steps_granted: u32,
    pub deadline_unix_ms: i64,
    /// Milliseconds granted beyond the original deadline so far, via the
    /// model calling the `request_more_time` pseudo-tool and the budget node
    /// clamping the request to the profile's timeout ceiling.
    pub extra_time_granted_ms: i64,
    /// Step count requested by an unprocessed `request_more_steps` call from
    /// the turn just acted on; consumed and cleared by the budget node.
    pub pending_step_request: Option<u32>,
    /// Milliseconds requested by an unprocessed `request_more_time` call
    /// from the turn just acted on; consumed and cleared by the budget node.
    pub pending_time_request_ms: Option<i64>,
    pub total_usage: LlmUsage,
    pub terminated: Option<TerminationReason>,
    /// Screenshots currently un-pruned in `messages`, oldest first.
    pub image_markers: Vec<ImageMarker>,
}

impl ExplorationState {
    pub fn new(system_prompt_as_user_url: impl Into<String>, step_budget: u32, deadline_unix_ms: i64) -> Self {
        Self {
            messages: vec![Message::user_text(system_prompt_as_user_url.into())],
            step_budget,
            deadline_unix_ms,
            ..Default::default()
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.is_some()
    }

    pub fn effective_step_budget(&self) -> u32 {
        self.step_budget + self.extra_steps_granted
    }

    pub fn effective_deadline_unix_ms(&self) -> i64 {
        self.deadline_unix_ms + self.extra_time_granted_ms
    }

    pub fn remaining_steps(&self) -> u32 {
        self.effective_step_budget().saturating_sub(self.step_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_steps_accounts_for_extension() {
        let mut state = ExplorationState::new("https://example.com/game", 5, 0);
        state.step_count = 4;
        assert_eq!(state.remaining_steps(), 1);
        state.extra_steps_granted = 3;
        assert_eq!(state.remaining_steps(), 4);
    }

    #[test]
    fn new_state_is_not_terminated() {
        let state = ExplorationState::new("https://example.com/game", 10, 1_000);
        assert!(!state.is_terminated());
    }
}
