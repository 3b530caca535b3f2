use std::time::Duration;

/// Represents the ways a remote pipeline operation can fail.
///
/// Every variant is terminal for the attempt that produced it; nothing is
/// retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The request never produced a readable response (connection refused, reset, ...)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The service answered with an envelope whose code is not 200
    #[error("Service rejected the request with code {code}")]
    Rejected { code: i64 },
    /// The response body could not be decoded into the expected payload
    #[error("Malformed payload: {0}")]
    Malformed(String),
    /// The client-side timeout elapsed before the service answered
    #[error("No response within {0:?}")]
    TimedOut(Duration),
    /// The operation was aborted through its cancellation hook
    #[error("Operation cancelled")]
    Cancelled,

    /// The attempt panicked before producing an outcome
    #[error("Operation panicked: {0}")]
    Panicked(String),
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::Malformed(err.to_string())
    }
}

impl RemoteError {
    /// True for failures reported by the service itself rather than by the wire.
    pub fn is_application_failure(&self) -> bool {
        matches!(self, RemoteError::Rejected { .. })
    }
}

/// Reasons a parameter form cannot be turned into a complete snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("File path is empty")]
    MissingFilePath,
    #[error("Article count is empty")]
    MissingArticleCount,
    #[error("Category count is empty")]
    MissingCategoryCount,
    #[error("Dimension reduction is enabled but no threshold was given")]
    MissingReductionThreshold,
    #[error("{field} must be a positive integer, got '{value}'")]
    NotAPositiveInteger { field: &'static str, value: String },
    #[error("{field} is too large, got '{value}'")]
    OutOfRange { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid service URL '{0}'")]
    InvalidServiceUrl(String),
    #[error("Notification timings must be strictly increasing: {0}")]
    InvalidTimings(String),
}
