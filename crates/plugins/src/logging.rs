//! Tracing subscriber setup

use bingo_core::LoggingSettings;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber described by `settings`.
///
/// `RUST_LOG` takes precedence over the configured level. Returns `false`
/// if a subscriber was already installed, which is common when the host
/// sets up logging itself.
pub fn init_tracing(settings: &LoggingSettings) -> anyhow::Result<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.level)
            .map_err(|e| anyhow::anyhow!("Invalid log level '{}': {}", settings.level, e))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if settings.json {
        builder.json().try_init().is_ok()
    } else {
        builder.with_ansi(true).try_init().is_ok()
    };

    if installed {
        tracing::debug!("Tracing initialised at '{}'", settings.level);
    }
    Ok(installed)
}
