use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Why a configuration file could not be turned into a [`crate::MechConfig`]
/// or a rule book value
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid YAML: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `!secret key` names a key absent from `secrets.yaml`
    #[error("no secret '{key}' in {path}")]
    UnknownSecret { key: String, path: PathBuf },

    /// A `secrets.yaml` entry holding a list or a mapping
    #[error("secret '{key}' is not a plain value")]
    SecretNotScalar { key: String },

    #[error("{path}: {tag} takes a string argument")]
    TagArgument { path: PathBuf, tag: &'static str },

    #[error("{path} includes itself")]
    IncludeCycle { path: PathBuf },

    #[error("environment variable {name} is not set and has no default")]
    UnsetVariable { name: String },

    /// A provider URL in the `directory` section that is not http(s)
    #[error("directory.{category}: '{url}' is not an http(s) URL")]
    ProviderUrl { category: &'static str, url: String },

    #[error("{key}: {reason}")]
    Invalid { key: String, reason: String },
}
