//! Tag expansion for the files of a configuration directory
//!
//! `mech.yaml` and the rule book may use:
//! - `!include path`: the content of another file, relative to the including one
//! - `!secret key`: a value from `secrets.yaml`
//! - `!env_var NAME [default]`: an environment variable
//!
//! Other tags are left in place for the consumer to reject.

use crate::error::{ConfigError, ConfigResult};
use crate::secrets::Secrets;
use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Read `file` from `config_dir` and expand its tags
///
/// A relative `file` is taken from `config_dir`, an absolute one as is.
pub fn load_yaml(config_dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    let config_dir = config_dir.into();
    let secrets = Secrets::load(&config_dir)?;
    let mut expander = Expander {
        secrets: &secrets,
        open: Vec::new(),
    };
    expander.file(&config_dir.join(file))
}

struct Expander<'a> {
    secrets: &'a Secrets,
    /// Files being expanded, outermost first
    open: Vec<PathBuf>,
}

impl Expander<'_> {
    fn file(&mut self, path: &Path) -> ConfigResult<Value> {
        if self.open.iter().any(|open| open == path) {
            return Err(ConfigError::IncludeCycle {
                path: path.to_path_buf(),
            });
        }

        debug!("Reading {:?}", path);
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;

        self.open.push(path.to_path_buf());
        let expanded = self.expand(value);
        self.open.pop();
        expanded
    }

    fn expand(&mut self, value: Value) -> ConfigResult<Value> {
        Ok(match value {
            Value::Tagged(tagged) => self.tagged(*tagged)?,
            Value::Mapping(entries) => Value::Mapping(
                entries
                    .into_iter()
                    .map(|(key, value)| self.expand(value).map(|value| (key, value)))
                    .collect::<ConfigResult<Mapping>>()?,
            ),
            Value::Sequence(items) => Value::Sequence(
                items
                    .into_iter()
                    .map(|item| self.expand(item))
                    .collect::<ConfigResult<Vec<_>>>()?,
            ),
            other => other,
        })
    }

    fn tagged(&mut self, tagged: TaggedValue) -> ConfigResult<Value> {
        let name = tagged.tag.to_string();
        trace!(tag = %name, "Expanding tag");

        match name.trim_start_matches('!') {
            "include" => {
                let file = self.argument("!include", tagged.value)?;
                let path = self.beside_current(Path::new(&file));
                self.file(&path)
            }
            "secret" => {
                let key = self.argument("!secret", tagged.value)?;
                Ok(Value::String(self.secrets.get(&key)?.to_string()))
            }
            "env_var" => {
                let spec = self.argument("!env_var", tagged.value)?;
                env_var(&spec).map(Value::String)
            }
            _ => Ok(Value::Tagged(Box::new(TaggedValue {
                tag: tagged.tag,
                value: self.expand(tagged.value)?,
            }))),
        }
    }

    fn argument(&self, tag: &'static str, value: Value) -> ConfigResult<String> {
        match value {
            Value::String(text) => Ok(text),
            _ => Err(ConfigError::TagArgument {
                path: self.current().to_path_buf(),
                tag,
            }),
        }
    }

    fn current(&self) -> &Path {
        self.open.last().map(PathBuf::as_path).unwrap_or(Path::new(""))
    }

    fn beside_current(&self, file: &Path) -> PathBuf {
        match self.current().parent() {
            Some(dir) => dir.join(file),
            None => file.to_path_buf(),
        }
    }
}

/// `NAME` or `NAME default`
fn env_var(spec: &str) -> ConfigResult<String> {
    let spec = spec.trim();
    let (name, default) = match spec.split_once(char::is_whitespace) {
        Some((name, default)) => (name, Some(default.trim())),
        None => (spec, None),
    };

    match (std::env::var(name), default) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(default)) => Ok(default.to_string()),
        (Err(_), None) => Err(ConfigError::UnsetVariable {
            name: name.to_string(),
        }),
    }
}
