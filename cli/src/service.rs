//! The six external operations (spec §6) as a single async trait: the
//! library-level entry point a REST/HTTP façade (out of scope here) would
//! sit on top of, mirroring how the teacher exposes `ReactRunner`/
//! `run_agent` without any knowledge of the transport calling them.
//!
//! This lives in `cli` rather than `qa-core` because its request/response
//! types come from `store` and `protocol`, and its implementation drives
//! `admission`/`supervisor` — all of which sit above `qa-core` in the
//! dependency graph. Putting the trait in `qa-core` would force it to
//! depend on crates that depend on it, so the boundary sits one layer up
//! instead (Open Question resolution #4, see DESIGN.md).

use async_trait::async_trait;
use store::models::{AgentStepRow, Analysis, Module};
use tokio::sync::broadcast;

#[derive(Clone, Debug)]
pub struct StartAnalysisRequest {
    pub url: String,
    pub modules: Vec<Module>,
    pub profile: String,
    pub agent_mode: bool,
    pub viewport: String,
    pub adaptive_steps: bool,
    pub adaptive_time: bool,
    pub creator: Option<String>,
    pub project_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("analysis not found: {0}")]
    NotFound(String),
    #[error("unknown profile: {0}")]
    UnknownProfile(String),
    #[error(transparent)]
    Store(#[from] store::StoreError),
    #[error(transparent)]
    Supervisor(#[from] supervisor::SupervisorError),
    #[error("{0}")]
    Admission(String),
}

/// `StartAnalysis` / `GetAnalysis` / `ListSteps` / `CancelAnalysis` /
/// `ContinueAnalysis` / `SubscribeEvents` (spec §6).
#[async_trait]
pub trait QaService: Send + Sync {
    async fn start_analysis(&self, req: StartAnalysisRequest) -> Result<Analysis, ServiceError>;
    async fn get_analysis(&self, id: &str) -> Result<Option<Analysis>, ServiceError>;
    async fn list_steps(&self, id: &str) -> Result<Vec<AgentStepRow>, ServiceError>;
    async fn cancel_analysis(&self, id: &str) -> Result<(), ServiceError>;
    async fn continue_analysis(&self, id: &str) -> Result<Analysis, ServiceError>;
    /// Subscribes to an analysis's live progress events. `after_seq` lets a
    /// reconnecting client reconcile: the returned backlog holds whatever
    /// buffered events are still newer than it, and the receiver carries
    /// everything broadcast from this point on (spec §4.6).
    async fn subscribe_events(
        &self,
        id: &str,
        after_seq: Option<u64>,
    ) -> Result<
        (
            Vec<protocol::SequencedEvent>,
            broadcast::Receiver<protocol::SequencedEvent>,
        ),
        ServiceError,
    >;
}
