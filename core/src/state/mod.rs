//! State carried through the exploration loop's `StateGraph`.
//!
//! [`ExplorationState`] flows through the think → act → budget cycle (spec
//! §4.4): think reads `messages` and appends the model's reply plus any
//! `tool_calls`; act executes them via `ToolSource` and fills in
//! `tool_results`; budget merges results back into `messages`, prunes
//! screenshots, and decides whether to loop back to think or terminate.

mod exploration_state;

pub use exploration_state::{ExplorationState, ImageMarker, ToolCall, ToolResult, TerminationReason};
