//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Log lines go through the progress bar writer so they never tear the task
//! spinners drawn by the executor. The filter is read from `ASSETLINE_LOG`
//! (e.g. `debug`, `assetline=trace`) and defaults to `info`.

use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "ASSETLINE_LOG";

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let indicatif = IndicatifLayer::new();

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(indicatif.get_stderr_writer()),
        )
        .with(indicatif)
        .try_init()?;

    Ok(())
}
