use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors crossing the port boundary.
///
/// Validation failures are never errors; they surface as reasons inside a
/// `CheckOutcome`. An `EngineError` that a check cannot absorb is an
/// infrastructure failure and drives the fail-closed verdict.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("{service} unavailable: {message}")]
    Unavailable { service: String, message: String },

    #[error("{service} timed out after {after_ms}ms")]
    Timeout { service: String, after_ms: u64 },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    pub fn unavailable(service: impl Into<String>, message: impl ToString) -> Self {
        Self::Unavailable {
            service: service.into(),
            message: message.to_string(),
        }
    }

    /// True when the collaborator could not be reached at all, as opposed to
    /// answering with something unusable.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// Bound a port call by `after`, mapping elapsed deadlines to `EngineError::Timeout`.
pub(crate) async fn with_timeout<T, F>(
    service: &str,
    after: std::time::Duration,
    fut: F,
) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(res) => res,
        Err(_) => Err(EngineError::Timeout {
            service: service.to_string(),
            after_ms: after.as_millis() as u64,
        }),
    }
}
