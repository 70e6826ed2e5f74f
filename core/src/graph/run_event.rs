//! Minimal run-level events emitted while a compiled graph executes.
//!
//! The exploration loop's own progress events (`agent_step`, `agent_screenshot`,
//! ...) are a separate, durable concern handled by the `store`/event-bus layer
//! (spec §4.6); this type only carries enough to let `invoke` observe the
//! final state and, optionally, let a caller watch per-node state transitions
//! for debugging.

use std::fmt::Debug;

/// What `CompiledStateGraph::stream` reports as the run progresses.
#[derive(Clone, Debug)]
pub enum RunEvent<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    /// State immediately after one node ran.
    Updated { node_id: String, state: S },
    /// Final state, emitted once when the run ends. Always sent regardless
    /// of `RunMode`, so `invoke` can extract it.
    Values(S),
}

/// Which [`RunEvent`] variants a caller of `stream` wants to receive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunMode {
    Updated,
    Values,
}
