//! YAML configuration loading for mech
//!
//! The configuration directory holds `mech.yaml`, an optional `secrets.yaml`
//! and the rule book. Files are plain YAML with three custom tags:
//! `!include path`, `!secret key` and `!env_var NAME [default]`.
//!
//! # Example
//!
//! ```ignore
//! use mech_config::MechConfig;
//!
//! let config = MechConfig::load("/etc/mech")?;
//! println!("status on {}", config.http.listen);
//! ```

mod error;
mod loader;
mod mech_config;
mod secrets;

pub use error::{ConfigError, ConfigResult};
pub use loader::load_yaml;
pub use mech_config::{DirectoryConfig, HttpConfig, MechConfig, TimingConfig, CONFIG_FILE};
pub use secrets::{Secrets, SECRETS_FILE};

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
