use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn child process: {0}")]
    Spawn(std::io::Error),
    #[error("failed to read child stdout: {0}")]
    Io(std::io::Error),
    #[error("progress sink rejected an event: {0}")]
    Sink(String),
    #[error("supervision was cancelled")]
    Cancelled,
}

impl From<SupervisorError> for qa_core::AgentError {
    fn from(e: SupervisorError) -> Self {
        match e {
            SupervisorError::Cancelled => qa_core::AgentError::Cancelled,
            other => qa_core::AgentError::SubprocessCrash(other.to_string()),
        }
    }
}
