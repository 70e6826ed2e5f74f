//! Budget: merge the turn's tool results back into the conversation, prune
//! screenshots to the pruning window, place cache breakpoints, grant any
//! pending `request_more_steps`/`request_more_time` extension clamped to the
//! profile ceiling, and decide whether to loop back to think or terminate
//! (spec §4.4 steps 3-4, 8-9; Open Question resolution #2).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::error::AgentError;
use crate::graph::{Next, Node};
use crate::message::{ContentBlock, Message};
use crate::state::{ExplorationState, ImageMarker, TerminationReason};

/// Budget policy, fixed for the lifetime of one exploration run.
#[derive(Clone, Debug)]
pub struct BudgetPolicy {
    /// Most recent screenshots kept verbatim in the conversation (spec §4.4
    /// step 3, K=2).
    pub screenshot_window: usize,
    /// Hard cap on simultaneous ephemeral cache markers (Open Question #2).
    pub max_cache_markers: usize,
    /// Ceiling `effective_step_budget()` may never cross, regardless of how
    /// much the model requests via `request_more_steps` (profile's
    /// `maxTotalSteps`, spec §6/§4.4 step 8).
    pub max_total_steps: u32,
    /// Ceiling `effective_deadline_unix_ms()` may never cross, regardless of
    /// how much the model requests via `request_more_time` (derived from the
    /// profile's `maxTotalTimeout`).
    pub max_deadline_unix_ms: i64,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            screenshot_window: 2,
            max_cache_markers: 4,
            max_total_steps: u32::MAX,
            max_deadline_unix_ms: i64::MAX,
        }
    }
}

pub struct BudgetNode {
    policy: BudgetPolicy,
    cancel_flag: Arc<AtomicBool>,
}

impl BudgetNode {
    pub fn new(policy: BudgetPolicy, cancel_flag: Arc<AtomicBool>) -> Self {
        Self { policy, cancel_flag }
    }

    /// Appends one user message containing a tool_result block per call plus
    /// (if any) a single image block for the last screenshot produced this
    /// turn — earlier screenshots were already superseded (spec §4.4 step 6).
    fn merge_tool_results(state: &mut ExplorationState) {
        if state.tool_results.is_empty() {
            return;
        }
        let mut content = Vec::with_capacity(state.tool_results.len() + 1);
        let mut last_image: Option<String> = None;
        for result in state.tool_results.drain(..) {
            content.push(ContentBlock::ToolResult {
                tool_use_id: result.tool_call_id,
                content: if result.text.is_empty() {
                    format!("{} executed", result.tool_name)
                } else {
                    result.text
                },
                is_error: result.is_error,
                cache_control: None,
            });
            if let Some(data) = result.image_base64 {
                last_image = Some(data);
            }
        }
        let image_block_index = last_image.as_ref().map(|_| content.len());
        if let Some(data) = last_image {
            content.push(ContentBlock::image_webp_base64(data));
        }
        state.messages.push(Message::User { content });

        if let Some(block_index) = image_block_index {
            state.image_markers.push(ImageMarker {
                message_index: state.messages.len() - 1,
                block_index,
                step_number: state.step_count,
            });
        }
    }

    /// Replaces every image block outside the trailing `window` with a text
    /// placeholder (spec §4.4 step 3).
    fn prune_screenshots(state: &mut ExplorationState, window: usize) {
        if state.image_markers.len() <= window {
            return;
        }
        let prune_count = state.image_markers.len() - window;
        for marker in state.image_markers.drain(..prune_count) {
            if let Some(message) = state.messages.get_mut(marker.message_index) {
                if let Some(block) = message.content_mut().get_mut(marker.block_index) {
                    if block.is_image() {
                        *block = ContentBlock::text(format!(
                            "[screenshot elided: step {}]",
                            marker.step_number
                        ));
                    }
                }
            }
        }
    }

    /// Strips every existing marker, then marks the last content block of
    /// the most recent `max_markers` messages (Open Question #2).
    fn place_cache_markers(state: &mut ExplorationState, max_markers: usize) {
        for message in &mut state.messages {
            for block in message.content_mut() {
                block.clear_cache_marker();
            }
        }
        let mut marked = 0usize;
        for message in state.messages.iter_mut().rev() {
            if marked >= max_markers {
                break;
            }
            if let Some(block) = message.content_mut().last_mut() {
                block.set_cache_marker();
                marked += 1;
            }
        }
        debug_assert!(marked <= max_markers);
    }

    /// Grants whatever the model just requested via `request_more_steps`/
    /// `request_more_time`, clamped to how much room is left under the
    /// profile's ceiling (spec §4.4 step 8). A request that doesn't fit is
    /// granted partially rather than rejected outright; a request arriving
    /// after the ceiling is already exhausted is granted zero.
    fn maybe_extend(&self, state: &mut ExplorationState) {
        if let Some(requested) = state.pending_step_request.take() {
            let room = self.policy.max_total_steps.saturating_sub(state.effective_step_budget());
            let granted = requested.min(room);
            state.extra_steps_granted += granted;
            info!(requested, granted, ceiling = self.policy.max_total_steps, "budget: step extension requested by the model");
        }
        if let Some(requested_ms) = state.pending_time_request_ms.take() {
            let room = (self.policy.max_deadline_unix_ms - state.effective_deadline_unix_ms()).max(0);
            let granted_ms = requested_ms.min(room);
            state.extra_time_granted_ms += granted_ms;
            info!(requested_ms, granted_ms, ceiling_unix_ms = self.policy.max_deadline_unix_ms, "budget: time extension requested by the model");
        }
    }
}

#[async_trait]
impl Node<ExplorationState> for BudgetNode {
    fn id(&self) -> &str {
        "budget"
    }

    async fn run(&self, mut state: ExplorationState) -> Result<(ExplorationState, Next), AgentError> {
        Self::merge_tool_results(&mut state);
        Self::prune_screenshots(&mut state, self.policy.screenshot_window);
        Self::place_cache_markers(&mut state, self.policy.max_cache_markers);

        if self.cancel_flag.load(Ordering::SeqCst) {
            state.terminated = Some(TerminationReason::Cancelled);
            return Ok((state, Next::End));
        }
        if state.step_count >= state.effective_step_budget() {
            state.terminated = Some(TerminationReason::StepBudgetExhausted);
            return Ok((state, Next::End));
        }
        let now_ms = Utc::now().timestamp_millis();
        if now_ms >= state.effective_deadline_unix_ms() {
            state.terminated = Some(TerminationReason::TimeBudgetExhausted);
            return Ok((state, Next::End));
        }

        self.maybe_extend(&mut state);

        Ok((state, Next::Node("think".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ToolResult;

    fn state_with_image_results(n: usize) -> ExplorationState {
        let mut state = ExplorationState::new("https://example.com/game", 10, i64::MAX);
        for i in 0..n {
            state.step_count += 1;
            state.tool_results.push(ToolResult {
                tool_call_id: format!("tc{i}"),
                tool_name: "screenshot".into(),
                text: "ok".into(),
                image_base64: Some(format!("img{i}")),
                is_error: false,
                duration_ms: 5,
            });
        }
        state
    }

    #[test]
    fn merge_keeps_only_last_image_of_a_multi_call_turn() {
        let mut state = state_with_image_results(3);
        BudgetNode::merge_tool_results(&mut state);
        let images: Vec<&ContentBlock> = state
            .messages
            .last()
            .unwrap()
            .content()
            .iter()
            .filter(|b| b.is_image())
            .collect();
        assert_eq!(images.len(), 1);
    }

    #[test]
    fn prune_elides_screenshots_outside_the_window() {
        let mut state = ExplorationState::new("https://example.com/game", 10, i64::MAX);
        for i in 0..4u32 {
            state.messages.push(Message::User {
                content: vec![ContentBlock::image_webp_base64(format!("img{i}"))],
            });
            state.image_markers.push(ImageMarker {
                message_index: state.messages.len() - 1,
                block_index: 0,
                step_number: i + 1,
            });
        }
        BudgetNode::prune_screenshots(&mut state, 2);
        let remaining_images = state
            .messages
            .iter()
            .flat_map(|m| m.content().iter())
            .filter(|b| b.is_image())
            .count();
        assert_eq!(remaining_images, 2);
        assert_eq!(state.image_markers.len(), 2);
    }

    #[test]
    fn place_cache_markers_never_exceeds_max() {
        let mut state = ExplorationState::new("https://example.com/game", 10, i64::MAX);
        for i in 0..10 {
            state.messages.push(Message::user_text(format!("msg {i}")));
        }
        BudgetNode::place_cache_markers(&mut state, 4);
        let marked = state
            .messages
            .iter()
            .flat_map(|m| m.content().iter())
            .filter(|b| b.has_cache_marker())
            .count();
        assert_eq!(marked, 4);
    }

    #[tokio::test]
    async fn terminates_on_step_budget_exhaustion() {
        let node = BudgetNode::new(BudgetPolicy::default(), Arc::new(AtomicBool::new(false)));
        let mut state = ExplorationState::new("https://example.com/game", 1, i64::MAX);
        state.step_count = 1;
        let (state, next) = node.run(state).await.unwrap();
        assert!(matches!(next, Next::End));
        assert_eq!(state.terminated, Some(TerminationReason::StepBudgetExhausted));
    }

    #[tokio::test]
    async fn terminates_on_time_budget_exhaustion() {
        let node = BudgetNode::new(BudgetPolicy::default(), Arc::new(AtomicBool::new(false)));
        let state = ExplorationState::new("https://example.com/game", 10, 0);
        let (state, next) = node.run(state).await.unwrap();
        assert!(matches!(next, Next::End));
        assert_eq!(state.terminated, Some(TerminationReason::TimeBudgetExhausted));
    }

    #[tokio::test]
    async fn cancellation_takes_priority_over_remaining_budget() {
        let node = BudgetNode::new(BudgetPolicy::default(), Arc::new(AtomicBool::new(true)));
        let state = ExplorationState::new("https://example.com/game", 10, i64::MAX);
        let (state, next) = node.run(state).await.unwrap();
        assert!(matches!(next, Next::End));
        assert_eq!(state.terminated, Some(TerminationReason::Cancelled));
    }

    #[tokio::test]
    async fn loops_back_to_think_when_budget_remains() {
        let node = BudgetNode::new(BudgetPolicy::default(), Arc::new(AtomicBool::new(false)));
        let state = ExplorationState::new("https://example.com/game", 10, i64::MAX);
        let (state, next) = node.run(state).await.unwrap();
        assert!(matches!(next, Next::Node(ref id) if id.as_str() == "think"));
        assert!(state.terminated.is_none());
    }

    #[tokio::test]
    async fn grants_the_full_step_request_when_it_fits_under_the_ceiling() {
        let policy = BudgetPolicy {
            max_total_steps: 30,
            ..BudgetPolicy::default()
        };
        let node = BudgetNode::new(policy, Arc::new(AtomicBool::new(false)));
        let mut state = ExplorationState::new("https://example.com/game", 20, i64::MAX);
        state.pending_step_request = Some(10);
        let (state, _next) = node.run(state).await.unwrap();
        assert_eq!(state.extra_steps_granted, 10);
        assert_eq!(state.effective_step_budget(), 30);
        assert_eq!(state.pending_step_request, None);
    }

    #[tokio::test]
    async fn clamps_the_step_request_to_the_profile_ceiling() {
        let policy = BudgetPolicy {
            max_total_steps: 25,
            ..BudgetPolicy::default()
        };
        let node = BudgetNode::new(policy, Arc::new(AtomicBool::new(false)));
        let mut state = ExplorationState::new("https://example.com/game", 20, i64::MAX);
        state.pending_step_request = Some(10);
        let (state, _next) = node.run(state).await.unwrap();
        assert_eq!(state.extra_steps_granted, 5);
        assert_eq!(state.effective_step_budget(), 25);
    }

    #[tokio::test]
    async fn clamps_the_time_request_to_the_profile_ceiling() {
        // Both the deadline and the ceiling sit far in the future so the
        // node's own time-budget check never fires before `maybe_extend`
        // runs; only the gap between them (5s) matters here.
        let far_future = i64::MAX - 10_000;
        let policy = BudgetPolicy {
            max_deadline_unix_ms: far_future + 5_000,
            ..BudgetPolicy::default()
        };
        let node = BudgetNode::new(policy, Arc::new(AtomicBool::new(false)));
        let mut state = ExplorationState::new("https://example.com/game", 20, far_future);
        state.pending_time_request_ms = Some(20_000);
        let (state, _next) = node.run(state).await.unwrap();
        assert_eq!(state.extra_time_granted_ms, 5_000);
        assert_eq!(state.effective_deadline_unix_ms(), far_future + 5_000);
    }
}
