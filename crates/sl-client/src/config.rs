//! Client configuration
//!
//! One TOML document with a section per component. Every field has a
//! default, so an empty file is a valid configuration:
//!
//! ```toml
//! [remote]
//! base_url = "https://gis.example.com"
//! timeout_secs = 10
//!
//! [catalog]
//! cascade = "detach_layers"
//!
//! [logging]
//! level = "debug"
//! json = true
//! ```

use serde::{Deserialize, Serialize};
use sl_catalog::CatalogOptions;
use sl_composition::CompositionOptions;
use sl_remote::RemoteConfig;
use std::path::Path;

/// Environment variable overriding `remote.base_url`
pub const ENV_API_URL: &str = "SPATIALLAB_API_URL";
/// Environment variable overriding `remote.access_token`
pub const ENV_ACCESS_TOKEN: &str = "SPATIALLAB_ACCESS_TOKEN";

/// Logging section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `SPATIALLAB_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete client configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// GIS service connection
    pub remote: RemoteConfig,
    /// Catalog store tuning
    pub catalog: CatalogOptions,
    /// Map composition tuning
    pub composition: CompositionOptions,
    /// Tracing output
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With remote connection settings
    #[inline]
    #[must_use]
    pub fn with_remote(mut self, remote: RemoteConfig) -> Self {
        self.remote = remote;
        self
    }

    /// With catalog options
    #[inline]
    #[must_use]
    pub fn with_catalog(mut self, catalog: CatalogOptions) -> Self {
        self.catalog = catalog;
        self
    }

    /// With composition options
    #[inline]
    #[must_use]
    pub fn with_composition(mut self, composition: CompositionOptions) -> Self {
        self.composition = composition;
        self
    }

    /// With logging settings
    #[inline]
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Parse a TOML document
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for values that parse but make no sense.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file and apply environment overrides
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            message: source.to_string(),
        })?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override fields from environment lookups
    ///
    /// Takes the lookup as a function so callers (and tests) decide where
    /// values come from.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.remote.base_url = url;
        }
        if let Some(token) = lookup(ENV_ACCESS_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.remote.access_token = Some(token);
        }
    }

    /// Serialize back to TOML
    ///
    /// # Errors
    /// Returns [`ConfigError::Serialize`] if a value has no TOML form
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Check values serde cannot
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first bad field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.remote.base_url.starts_with("http://") && !self.remote.base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "remote.base_url must be an http(s) URL, got {:?}",
                self.remote.base_url
            )));
        }
        if self.remote.timeout_secs == 0 {
            return Err(ConfigError::Invalid("remote.timeout_secs must be positive".into()));
        }
        self.composition
            .default_style
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("composition.default_style: {e}")))?;
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.level must not be empty".into()));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("cannot read {path}: {message}")]
    Io {
        /// File path
        path: String,
        /// OS error text
        message: String,
    },

    /// Malformed TOML or wrong field types
    #[error("invalid TOML: {0}")]
    Parse(String),

    /// Well-formed but unusable value
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// Serialization failed
    #[error("serialization failed: {0}")]
    Serialize(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sl_remote::{CascadePolicy, StyleOptions};
    use std::io::Write;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(ClientConfig::from_toml_str("").unwrap(), ClientConfig::default());
    }

    #[test]
    fn sections_override_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
            [remote]
            base_url = "https://gis.example.com"
            timeout_secs = 5

            [catalog]
            cascade = "detach_layers"

            [logging]
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.remote.base_url, "https://gis.example.com");
        assert_eq!(config.remote.timeout_secs, 5);
        assert_eq!(config.remote.access_token, None);
        assert_eq!(config.catalog.cascade, CascadePolicy::DetachLayers);
        assert_eq!(config.catalog.event_capacity, 64);
        assert_eq!(config.composition.default_style, StyleOptions::DEFAULT);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.json);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            ClientConfig::from_toml_str("[remote]\ntimeout_secs = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ClientConfig::from_toml_str("[remote]\nbase_url = \"ftp://x\""),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ClientConfig::from_toml_str("[remote]\ntimeout_secs = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ClientConfig::from_toml_str(
                r##"
                [composition.default_style]
                fillColor = "#ff0000"
                strokeColor = "#ff0000"
                lineWidth = 1.0
                fillOpacity = 2.0
                strokeOpacity = 1.0
                "##
            ),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn env_overrides_remote_settings() {
        let mut config = ClientConfig::default();
        config.apply_env(|key| match key {
            ENV_API_URL => Some("https://override.example.com".into()),
            ENV_ACCESS_TOKEN => Some("secret".into()),
            _ => None,
        });
        assert_eq!(config.remote.base_url, "https://override.example.com");
        assert_eq!(config.remote.access_token.as_deref(), Some("secret"));

        // Blank values are ignored
        config.apply_env(|_| Some("  ".into()));
        assert_eq!(config.remote.base_url, "https://override.example.com");
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[catalog]\nevent_capacity = 8").unwrap();

        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.catalog.event_capacity, 8);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn toml_round_trip() {
        let config = ClientConfig::new()
            .with_remote(RemoteConfig::new("https://a.example").with_timeout_secs(3))
            .with_catalog(CatalogOptions::new().with_cascade(CascadePolicy::DetachLayers))
            .with_logging(LoggingConfig {
                level: "debug".into(),
                json: true,
            });
        let text = config.to_toml_string().unwrap();
        assert_eq!(ClientConfig::from_toml_str(&text).unwrap(), config);
    }
}
