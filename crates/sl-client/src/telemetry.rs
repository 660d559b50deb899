//! Tracing subscriber setup

use crate::config::LoggingConfig;
use anyhow::Context;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a filter directive, e.g. `sl_catalog=debug`
pub const ENV_LOG: &str = "SPATIALLAB_LOG";

/// Build the filter: `SPATIALLAB_LOG` when set, else the configured level
///
/// # Errors
/// Fails if neither source holds a valid directive.
pub fn filter(logging: &LoggingConfig) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_env(ENV_LOG) {
        return Ok(filter);
    }
    EnvFilter::try_new(&logging.level)
        .with_context(|| format!("invalid log level {:?}", logging.level))
}

/// Install the global `fmt` subscriber
///
/// Returns `Ok(false)` if a subscriber was already installed, which is
/// harmless (tests and embedding applications often install their own).
///
/// # Errors
/// Fails only for an invalid filter directive.
pub fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<bool> {
    let filter = filter(logging)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if logging.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };
    if installed {
        tracing::debug!("Tracing initialised (json={})", logging.json);
    }
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_is_used() {
        let logging = LoggingConfig {
            level: "sl_catalog=debug,warn".into(),
            json: false,
        };
        assert!(filter(&logging).is_ok());
    }

    #[test]
    fn garbage_level_is_rejected() {
        let logging = LoggingConfig {
            level: "sl_catalog=loudest".into(),
            json: false,
        };
        // Only meaningful when the override is absent
        if std::env::var(ENV_LOG).is_err() {
            assert!(filter(&logging).is_err());
        }
    }

    #[test]
    fn second_install_is_harmless() {
        let logging = LoggingConfig::default();
        init_tracing(&logging).unwrap();
        assert!(!init_tracing(&logging).unwrap());
    }
}
