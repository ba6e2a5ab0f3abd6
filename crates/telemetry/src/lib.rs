//! Tracing subscriber bootstrap shared by the server and the CLI.

use anyhow::{anyhow, Context};
use bookstore_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::EnvFilter;

/// Build the event filter: `RUST_LOG` wins over the configured level.
pub fn env_filter(settings: &TelemetrySettings) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.log_level)
            .with_context(|| format!("invalid log level '{}'", settings.log_level)),
    }
}

/// Install the global tracing subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = env_filter(settings)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match settings.log_format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))?;

    tracing::info!(
        target: "bookstore-telemetry",
        format = ?settings.log_format,
        "telemetry initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_level_is_reported() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let settings = TelemetrySettings {
            log_format: LogFormat::Pretty,
            log_level: "bookstore=loudest".to_string(),
        };
        assert!(env_filter(&settings).is_err());
    }

    #[test]
    fn second_init_fails() {
        let settings = TelemetrySettings::default();
        init(&settings).unwrap();
        assert!(init(&settings).is_err());
    }
}
