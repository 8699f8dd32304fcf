use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::SubscriberBuilder;

use crate::config::CoreConfig;
use crate::errors::{DashnoteError, Result};

/// Installs the stderr subscriber used by the binaries.
///
/// `RUST_LOG` wins over `level`. Compact output drops targets and colors.
pub fn init_tracing_with(level: &str, compact: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if compact {
        builder.compact().with_target(false).with_ansi(false).try_init()
    } else {
        builder
            .with_target(true)
            .with_ansi(atty::is(atty::Stream::Stderr))
            .try_init()
    };
    installed.map_err(|err| DashnoteError::GeneralError(err.to_string()))
}

pub fn init_tracing(level: Option<&str>) -> Result<()> {
    init_tracing_with(level.unwrap_or("info"), false)
}

/// Level from `DASHNOTE_LOG`; production deployments get compact lines.
pub fn init_from_config(config: &CoreConfig) -> Result<()> {
    init_tracing_with(&config.log_level, config.is_production())
}
