//! The supervisor forwards every progress event to a [`ProgressSink`]
//! (spec §4.2 step 3: "forwards to C6 (persist + broadcast)") rather than
//! depending on `store`/the event bus directly, so the same supervisor code
//! runs against a live SQLite-backed sink in production and a recording
//! stand-in in tests.

use async_trait::async_trait;
use protocol::ProgressEvent;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("progress sink failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn handle(&self, event: ProgressEvent) -> Result<(), SinkError>;
}
