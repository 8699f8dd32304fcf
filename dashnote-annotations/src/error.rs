use dashnote_core::http::BackendError;
use thiserror::Error;

/// Errors raised by the annotation layer.
///
/// Payloads are strings so the type stays `Clone` and can be handed to every
/// caller awaiting a shared fetch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("annotations coordinator used before init")]
    NotInitialized,
    #[error("datasource not found: {0}")]
    UnknownDatasource(String),
    #[error("datasource {name} of type {kind} cannot serve annotations")]
    UnsupportedDatasource { name: String, kind: String },
    #[error("datasource {0} has no write endpoint")]
    NotWritable(String),
    #[error("annotation has no id")]
    MissingId,
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("time-series request failed: {0}")]
    Transport(String),
    #[error("time-series query error: {0}")]
    Query(String),
    #[error("failed to decode annotation payload: {0}")]
    Decode(String),
}

impl AnnotationError {
    /// Text shown to the user: the backend's own message when it sent one,
    /// otherwise the error itself.
    pub fn notification_detail(&self) -> String {
        match self {
            AnnotationError::Backend(err) => err
                .backend_message()
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string()),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for AnnotationError {
    fn from(err: reqwest::Error) -> Self {
        AnnotationError::Transport(err.to_string())
    }
}
