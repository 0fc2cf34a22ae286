use thiserror::Error;

/// Failure classes surfaced by the workflow. Each operation fails whole:
/// a `WorkflowError` means the working document was not touched.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("upstream: {0}")]
    Upstream(String),

    #[error("schema: {0}")]
    Schema(String),
}

impl WorkflowError {
    pub fn validation(msg: impl Into<String>) -> Self {
        WorkflowError::Validation(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        WorkflowError::Upstream(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        WorkflowError::Schema(msg.into())
    }
}
