//! Typed mech configuration
//!
//! Parses `mech.yaml` from the configuration directory. Every field has a
//! default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::load_yaml;

/// Name of the main configuration file inside the configuration directory
pub const CONFIG_FILE: &str = "mech.yaml";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MechConfig {
    /// Host name reported in the status document (system host name if unset)
    pub name: Option<String>,

    /// Status endpoint and HTTP client settings
    pub http: HttpConfig,

    /// Static provider directory
    pub directory: DirectoryConfig,

    /// Rule book path, relative to the configuration directory
    pub rules: PathBuf,

    /// Cycle and tolerance settings
    pub timing: TimingConfig,

    /// Maximum size of the rendered status document, in bytes
    pub status_limit: usize,
}

impl Default for MechConfig {
    fn default() -> Self {
        Self {
            name: None,
            http: HttpConfig::default(),
            directory: DirectoryConfig::default(),
            rules: PathBuf::from("rules.yaml"),
            timing: TimingConfig::default(),
            status_limit: mech_core::DEFAULT_STATUS_LIMIT,
        }
    }
}

/// HTTP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Address the status endpoint listens on
    pub listen: String,

    /// Ceiling on the duration of one provider request
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Provider base URLs per service category
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Providers that own control points
    pub control: Vec<String>,

    /// Providers that keep the event and sensor history
    pub history: Vec<String>,
}

/// Cycle and tolerance settings, in seconds unless noted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Period of the background tick
    pub tick_secs: u64,

    /// Minimum delay between two control discovery scans
    pub discovery_interval_secs: i64,

    /// Minimum delay between two probes of a history stream
    pub poll_interval_secs: i64,

    /// How far the "since" watermark is kept behind the newest record,
    /// in the unit of the record timestamps
    pub watermark_tolerance: i64,

    /// Minimum delay between two checks of the rule book file
    pub rules_reload_secs: i64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_secs: 1,
            discovery_interval_secs: 2,
            poll_interval_secs: 2,
            watermark_tolerance: 5,
            rules_reload_secs: 10,
        }
    }
}

impl MechConfig {
    /// Load the configuration from a config directory
    pub fn load(config_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        let config_dir = config_dir.as_ref();
        let yaml = load_yaml(config_dir, CONFIG_FILE)?;
        let config = Self::from_yaml(yaml)?;

        info!(
            control = config.directory.control.len(),
            history = config.directory.history.len(),
            "Loaded configuration from {:?}",
            config_dir.join(CONFIG_FILE)
        );

        Ok(config)
    }

    /// Parse configuration from a processed YAML value
    pub fn from_yaml(yaml: Value) -> ConfigResult<Self> {
        if yaml.is_null() {
            return Ok(Self::default());
        }

        let config: Self =
            serde_yaml::from_value(yaml).map_err(|e| ConfigError::Invalid {
                key: CONFIG_FILE.to_string(),
                reason: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.timing.tick_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "timing.tick_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.timing.watermark_tolerance < 0 {
            return Err(ConfigError::Invalid {
                key: "timing.watermark_tolerance".to_string(),
                reason: "must not be negative".to_string(),
            });
        }
        let providers = [
            ("control", &self.directory.control),
            ("history", &self.directory.history),
        ];
        for (category, urls) in providers {
            if let Some(url) = urls
                .iter()
                .find(|url| !(url.starts_with("http://") || url.starts_with("https://")))
            {
                return Err(ConfigError::ProviderUrl {
                    category,
                    url: url.clone(),
                });
            }
        }
        Ok(())
    }

    /// Rule book path resolved against the configuration directory
    pub fn rules_path(&self, config_dir: &Path) -> PathBuf {
        if self.rules.is_absolute() {
            self.rules.clone()
        } else {
            config_dir.join(&self.rules)
        }
    }
}
