use dashnote::BootstrapError;
use dashnote_annotations::AnnotationError;
use dashnote_core::errors::ConfigError;
use dashnote_core::http::BackendError;
use dashnote_protocol::time::TimeRangeError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("backend request failed: {0}")]
    Backend(#[from] BackendError),
    #[error("annotation request failed: {0}")]
    Annotation(#[from] AnnotationError),
    #[error("dashboard could not be loaded: {0}")]
    Bootstrap(#[from] BootstrapError),
    #[error("invalid time range: {0}")]
    TimeRange(#[from] TimeRangeError),
    #[error("annotation {0} not found in the selected range")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
}
