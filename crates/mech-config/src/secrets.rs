//! `secrets.yaml`
//!
//! Provider URLs often embed credentials. They can live in `secrets.yaml`
//! next to `mech.yaml` and be referenced with `!secret key`.

use crate::error::{ConfigError, ConfigResult};
use serde_yaml::Value;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SECRETS_FILE: &str = "secrets.yaml";

#[derive(Debug, Clone, Default)]
pub struct Secrets {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl Secrets {
    /// Read the secrets of a configuration directory; none if the file is absent
    pub fn load(config_dir: &Path) -> ConfigResult<Self> {
        let path = config_dir.join(SECRETS_FILE);
        let values = match fs::read_to_string(&path) {
            Ok(text) => parse(&path, &text)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        debug!(count = values.len(), "Secrets from {:?}", path);
        Ok(Self { path, values })
    }

    pub fn get(&self, key: &str) -> ConfigResult<&str> {
        match self.values.get(key) {
            Some(value) => Ok(value),
            None => Err(ConfigError::UnknownSecret {
                key: key.to_string(),
                path: self.path.clone(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn parse(path: &Path, text: &str) -> ConfigResult<HashMap<String, String>> {
    let entries: Option<HashMap<String, Value>> =
        serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;

    entries
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => String::new(),
                _ => return Err(ConfigError::SecretNotScalar { key }),
            };
            Ok((key, text))
        })
        .collect()
}
