use std::time::Duration;
use thiserror::Error;

use crate::types::Origin;

/// Errors produced by the pipeline and its components.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The caller supplied unusable input (e.g. a blank topic).
    ///
    /// Raised before any stage is invoked.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Missing credential or invalid configuration detected at construction time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// One of the two pipeline stages failed; `cause` carries the backend error.
    #[error("{stage} stage failed: {cause}")]
    StageFailure {
        /// Which stage failed.
        stage: Origin,
        /// The underlying failure.
        #[source]
        cause: Box<PipelineError>,
    },

    /// Low-level HTTP transport failure (connection refused, reset, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON parsing failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error with status code, response body, and optional Retry-After hint.
    ///
    /// Nothing in this crate retries; the hint is kept for callers that wrap
    /// [`Pipeline::run`](crate::Pipeline::run) in their own retry policy.
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// HTTP status code (e.g. 401, 429, 500).
        status: u16,
        /// Response body text.
        body: String,
        /// Parsed `Retry-After` header value, if present.
        retry_after: Option<Duration>,
    },

    /// The provider reported an error inside an otherwise successful stream.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The paper-search collaborator failed.
    #[error("Search failed: {0}")]
    Search(String),

    /// The run was cancelled via its cancellation flag.
    #[error("Pipeline was cancelled")]
    Cancelled,

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Wrap `cause` as a failure of `stage`.
    pub fn stage(stage: Origin, cause: PipelineError) -> Self {
        PipelineError::StageFailure {
            stage,
            cause: Box::new(cause),
        }
    }

    /// The stage this error is attributed to, if it is a [`StageFailure`](Self::StageFailure).
    pub fn failed_stage(&self) -> Option<Origin> {
        match self {
            PipelineError::StageFailure { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn stage_failure_display_names_stage_and_cause() {
        let err = PipelineError::stage(Origin::Producer, PipelineError::Provider("quota".into()));
        assert_eq!(err.to_string(), "producer stage failed: Provider error: quota");
        assert_eq!(err.failed_stage(), Some(Origin::Producer));
        assert!(err.source().is_some());
    }

    #[test]
    fn non_stage_errors_have_no_stage() {
        assert_eq!(PipelineError::InvalidInput("blank".into()).failed_stage(), None);
        assert_eq!(PipelineError::Cancelled.failed_stage(), None);
    }
}
