//! # Memory: Checkpointing
//!
//! [`Checkpointer`] persists per-thread state snapshots keyed by
//! `(thread_id, checkpoint_ns, checkpoint_id)`, so a run can resume after a
//! crash or restart instead of starting over.
//!
//! ## Config
//!
//! [`RunnableConfig`] is passed to `CompiledStateGraph::invoke`:
//! - `thread_id`: required when a checkpointer is attached. For the
//!   exploration loop this is the analysis id.
//! - `checkpoint_id`: optional, loads a specific checkpoint instead of the
//!   latest (used for resuming a specific phase).
//! - `checkpoint_ns`: optional namespace for subgraphs.
//!
//! ## Implementations
//!
//! | Type             | Persistence | Use case                |
//! |-------------------|-------------|--------------------------|
//! | [`MemorySaver`]    | In-memory   | Tests, single-process dev runs |
//! | `store::SqliteSaver` | SQLite file | Production (see the `store` crate) |
//!
//! [`JsonSerializer`] is required for checkpointers that persist to bytes
//! (state must be `Serialize + DeserializeOwned`).

mod checkpoint;
mod checkpointer;
mod config;
mod memory_saver;
mod serializer;

pub use checkpoint::{
    writes_idx_map, ChannelVersions, Checkpoint, CheckpointListItem, CheckpointMetadata,
    CheckpointSource, CheckpointTuple, PendingWrite, CHECKPOINT_VERSION, ERROR, INTERRUPT, RESUME,
    SCHEDULED,
};
pub use checkpointer::{CheckpointError, Checkpointer};
pub use config::RunnableConfig;
pub use memory_saver::MemorySaver;
pub use serializer::{JsonSerializer, Serializer};
