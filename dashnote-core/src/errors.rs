use thiserror::Error;

/// Result type used across the dashnote core crate.
pub type Result<T> = std::result::Result<T, DashnoteError>;

/// Canonical error representation shared by the dashnote crates.
#[derive(Debug, Error)]
pub enum DashnoteError {
    #[error("invalid dashboard document: {0}")]
    InvalidDashboard(String),

    #[error("general error: {0}")]
    GeneralError(String),
}

/// Dedicated configuration error used by the configuration module.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for environment variable {key}: {message}")]
    InvalidEnvVar { key: String, message: String },
}
