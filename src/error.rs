use thiserror::Error;

/// Failures that abort a dashboard bootstrap.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BootstrapError {
    #[error("missing route parameter: {0}")]
    MissingParameter(&'static str),
    #[error("failed to fetch dashboard: {0}")]
    Fetch(String),
    #[error("failed to build dashboard model: {0}")]
    Model(String),
}
