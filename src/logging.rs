use anyhow::{Error, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;

/// Installs the stderr subscriber. `RUST_LOG` wins over the configured level.
pub fn init(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(Error::msg)?;
    Ok(())
}
