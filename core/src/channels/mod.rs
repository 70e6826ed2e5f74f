//! State update strategies for the graph engine.
//!
//! The exploration loop always replaces its state wholesale between nodes
//! ([`ReplaceUpdater`]); [`FieldBasedUpdater`] is kept for callers embedding
//! the graph engine with a state type that needs per-field merge semantics.

mod error;
mod updater;

pub use error::ChannelError;
pub use updater::{boxed_updater, BoxedStateUpdater, FieldBasedUpdater, ReplaceUpdater, StateUpdater};
