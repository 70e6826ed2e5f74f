//! Checkpoint data types: a snapshot of graph state plus enough metadata to
//! resume, branch, or walk history.

use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

pub const CHECKPOINT_VERSION: u32 = 1;

pub const INTERRUPT: &str = "__interrupt__";
pub const RESUME: &str = "__resume__";
pub const ERROR: &str = "__error__";
pub const SCHEDULED: &str = "__scheduled__";

/// Per-channel version counters, used to detect which channels changed
/// between two checkpoints.
pub type ChannelVersions = HashMap<String, u64>;

/// A write pending application on the next step (not used by the exploration
/// loop's single-threaded graph, kept for checkpoint-format compatibility).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingWrite {
    pub task_id: String,
    pub channel: String,
    pub value: serde_json::Value,
}

/// Where a checkpoint's state transition came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointSource {
    /// The initial state passed to `invoke`/`stream`.
    Input,
    /// A normal step inside the run loop.
    Loop,
    /// State updated outside the run loop (e.g. human edit before resume).
    Update,
    /// Checkpoint was forked from an earlier one (time travel / branch).
    Fork,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub source: CheckpointSource,
    pub step: i64,
    pub created_at: Option<SystemTime>,
    pub parents: HashMap<String, String>,
}

impl Default for CheckpointMetadata {
    fn default() -> Self {
        Self {
            source: CheckpointSource::Input,
            step: 0,
            created_at: None,
            parents: HashMap::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Checkpoint<S> {
    pub v: u32,
    pub id: String,
    pub ts: String,
    pub channel_values: S,
    pub channel_versions: ChannelVersions,
    pub versions_seen: HashMap<String, ChannelVersions>,
    pub updated_channels: Option<Vec<String>>,
    pub pending_sends: Vec<PendingWrite>,
    pub metadata: CheckpointMetadata,
}

impl<S> Checkpoint<S> {
    pub fn new(id: impl Into<String>, channel_values: S, metadata: CheckpointMetadata) -> Self {
        Self {
            v: CHECKPOINT_VERSION,
            id: id.into(),
            ts: chrono::Utc::now().to_rfc3339(),
            channel_values,
            channel_versions: ChannelVersions::new(),
            versions_seen: HashMap::new(),
            updated_channels: None,
            pending_sends: Vec::new(),
            metadata,
        }
    }
}

/// A checkpoint's id plus its metadata, without the (potentially large)
/// serialized state, returned by `Checkpointer::list`.
#[derive(Clone, Debug)]
pub struct CheckpointListItem {
    pub checkpoint_id: String,
    pub metadata: CheckpointMetadata,
}

/// A loaded checkpoint paired with its metadata, as returned by
/// `Checkpointer::get_tuple`.
pub type CheckpointTuple<S> = (Checkpoint<S>, CheckpointMetadata);

/// Builds a stable index of pending writes by `(task_id, channel)`, used when
/// replaying writes during a resumed run.
pub fn writes_idx_map(writes: &[PendingWrite]) -> HashMap<(String, String), usize> {
    writes
        .iter()
        .enumerate()
        .map(|(idx, w)| ((w.task_id.clone(), w.channel.clone()), idx))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_idx_map_indexes_by_task_and_channel() {
        let writes = vec![
            PendingWrite {
                task_id: "t1".into(),
                channel: "messages".into(),
                value: serde_json::json!("a"),
            },
            PendingWrite {
                task_id: "t2".into(),
                channel: "messages".into(),
                value: serde_json::json!("b"),
            },
        ];
        let idx = writes_idx_map(&writes);
        assert_eq!(idx[&("t2".to_string(), "messages".to_string())], 1);
    }
}
