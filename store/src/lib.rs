//! SQLite persistence for the QA platform (spec §3, §4.6): analyses, agent
//! steps, checkpoints, and test runs, behind a single-writer WAL database.
//!
//! Three independent stores share one database file:
//!
//! - [`AnalysisStore`]: the `analyses` table plus the crash-recovery sweep.
//! - [`StepStore`]: append-only `agent_steps`, plus screenshot file I/O
//!   under `{data}/screenshots/{analysisID}/step-{n}.webp`.
//! - [`TestRunStore`]: `test_runs`.
//!
//! [`SqliteSaver`] additionally implements `qa_core::Checkpointer` for the
//! exploration loop's own node-level resumability (a finer-grained,
//! StateGraph-internal checkpoint distinct from the phase checkpoints the
//! supervisor writes to disk — see the `supervisor` crate).

mod analysis_store;
mod models;
mod schema;
mod sqlite_saver;
mod step_store;
mod test_run_store;

pub use analysis_store::AnalysisStore;
pub use models::{
    Analysis, AgentStepRow, AnalysisStatus, Module, ScenarioOutcome, TestRun, TestRunMode,
    ViewportName,
};
pub use sqlite_saver::SqliteSaver;
pub use step_store::StepStore;
pub use test_run_store::TestRunStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("blocking task panicked: {0}")]
    Join(String),
}

impl From<StoreError> for qa_core::AgentError {
    fn from(e: StoreError) -> Self {
        qa_core::AgentError::ToolExec(e.to_string())
    }
}
