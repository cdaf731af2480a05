//! Error types for rule loading and execution

use mech_config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for rule operations
pub type RuleResult<T> = Result<T, RuleError>;

/// Errors raised while loading or running rules
#[derive(Debug, Error)]
pub enum RuleError {
    /// The rule book could not be read or parsed as YAML
    #[error("cannot load rules from {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },

    /// The rule book does not have the expected shape
    #[error("invalid rule book: {0}")]
    Format(#[from] serde_yaml::Error),

    /// A rule is structurally valid YAML but makes no sense
    #[error("invalid rule '{key}': {reason}")]
    Invalid { key: String, reason: String },

    /// A template inside a rule failed to compile or render
    #[error("template error in rule '{key}': {message}")]
    Template { key: String, message: String },

    /// The engine was asked to run a rule it does not have
    #[error("unknown rule id {0}")]
    UnknownRule(usize),
}
