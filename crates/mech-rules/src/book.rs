//! YAML rule book
//!
//! A rule book maps rule keys to a list of steps:
//!
//! ```yaml
//! EVENT.DOOR.front.OPEN:
//!   - do: start
//!     point: porch_light
//!     pulse: 300
//!     reason: "front door {{ key }}"
//!
//! SENSOR.garden:
//!   - do: event
//!     when: "args[0] == 'moisture' and args[1] | int < 20"
//!     category: GARDEN
//!     name: "{{ args[0] }}"
//!     action: DRY
//!     text: "reading {{ args[1] }}"
//!
//! POINT.pump:
//!   - do: cancel
//!     when: "args[0] == 'off'"
//! ```
//!
//! Every string field is a template rendered with `key` and `args`. The
//! optional `when` is an expression; the step is skipped unless it holds.
//! The book is ready once loaded, and is reloaded when its file changes.

use crate::engine::{RuleEngine, RuleHost, RuleId};
use crate::error::{RuleError, RuleResult};
use crate::DEFAULT_REASON;
use indexmap::IndexMap;
use mech_config::load_yaml;
use minijinja::{context, Environment, Value};
use serde::Deserialize;
use serde_yaml::Value as YamlValue;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// One step of a rule
#[derive(Debug, Clone, Deserialize)]
struct Step {
    #[serde(default)]
    when: Option<String>,
    #[serde(flatten)]
    action: Action,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "do", rename_all = "lowercase")]
enum Action {
    Start {
        point: String,
        #[serde(default)]
        pulse: i64,
        #[serde(default)]
        reason: Option<String>,
    },
    Cancel {
        #[serde(default)]
        point: Option<String>,
        #[serde(default)]
        reason: Option<String>,
    },
    Event {
        category: String,
        name: String,
        action: String,
        #[serde(default)]
        text: String,
    },
}

impl Action {
    fn templates(&self) -> Vec<&str> {
        match self {
            Action::Start { point, reason, .. } => {
                let mut t = vec![point.as_str()];
                t.extend(reason.as_deref());
                t
            }
            Action::Cancel { point, reason } => point.iter().chain(reason).map(String::as_str).collect(),
            Action::Event {
                category,
                name,
                action,
                text,
            } => vec![category.as_str(), name.as_str(), action.as_str(), text.as_str()],
        }
    }
}

/// Where the rule book comes from
#[derive(Debug, Clone)]
struct Source {
    config_dir: PathBuf,
    file: PathBuf,
    reload_interval: i64,
    last_check: Option<i64>,
    modified: Option<SystemTime>,
    last_error: Option<String>,
}

/// A [`RuleEngine`] backed by a YAML file
pub struct RuleBook {
    rules: IndexMap<String, Vec<Step>>,
    loaded: bool,
    source: Option<Source>,
}

impl RuleBook {
    /// A rule book read from `file` (relative to `config_dir`)
    ///
    /// Nothing is read until the first [`RuleEngine::background`] call, or
    /// an explicit [`RuleBook::load`].
    pub fn from_file(
        config_dir: impl Into<PathBuf>,
        file: impl Into<PathBuf>,
        reload_interval: i64,
    ) -> Self {
        Self {
            rules: IndexMap::new(),
            loaded: false,
            source: Some(Source {
                config_dir: config_dir.into(),
                file: file.into(),
                reload_interval,
                last_check: None,
                modified: None,
                last_error: None,
            }),
        }
    }

    /// A rule book parsed from a YAML string, ready immediately
    pub fn from_yaml_str(content: &str) -> RuleResult<Self> {
        let value: YamlValue = serde_yaml::from_str(content)?;
        let mut book = Self {
            rules: IndexMap::new(),
            loaded: false,
            source: None,
        };
        book.install(value)?;
        Ok(book)
    }

    /// Read the rule book file now
    ///
    /// On failure the rules previously loaded stay in place.
    pub fn load(&mut self) -> RuleResult<()> {
        let Some(source) = &self.source else {
            return Ok(());
        };
        let path = source.config_dir.join(&source.file);
        let modified = modified_time(&path);

        let value = load_yaml(&source.config_dir, &source.file)
            .map_err(|e| RuleError::Load { path: path.clone(), source: e })?;
        self.install(value)?;

        if let Some(source) = &mut self.source {
            source.modified = modified;
        }
        info!(rules = self.rules.len(), "Loaded rule book from {:?}", path);
        Ok(())
    }

    fn install(&mut self, value: YamlValue) -> RuleResult<()> {
        let rules: IndexMap<String, Vec<Step>> = if value.is_null() {
            IndexMap::new()
        } else {
            serde_yaml::from_value(value)?
        };
        validate(&rules)?;

        self.rules = rules;
        self.loaded = true;
        Ok(())
    }

    /// Reload if the file changed since the last load
    fn check_reload(&mut self, now: i64) {
        let Some(source) = &mut self.source else {
            return;
        };
        if let Some(last) = source.last_check {
            if now - last < source.reload_interval {
                return;
            }
        }
        source.last_check = Some(now);

        let path = source.config_dir.join(&source.file);
        let modified = modified_time(&path);
        if self.loaded && modified == source.modified {
            return;
        }

        debug!("Rule book changed, reloading {:?}", path);
        let result = self.load();
        let Some(source) = &mut self.source else {
            return;
        };
        match result {
            Ok(()) => source.last_error = None,
            Err(e) => {
                let message = e.to_string();
                if source.last_error.as_deref() != Some(message.as_str()) {
                    warn!(error = %message, "Cannot load rule book");
                }
                source.last_error = Some(message);
                source.modified = modified;
            }
        }
    }
}

impl RuleEngine for RuleBook {
    fn ready(&self) -> bool {
        self.loaded
    }

    fn lookup(&self, key: &str) -> Option<RuleId> {
        self.rules.get_index_of(key).map(RuleId)
    }

    fn invoke(&mut self, rule: RuleId, args: &[&str], host: &mut dyn RuleHost) -> RuleResult<()> {
        let (key, steps) = self
            .rules
            .get_index(rule.0)
            .ok_or(RuleError::UnknownRule(rule.0))?;
        let env = Environment::new();
        let ctx = context! { key => key, args => args };

        for step in steps {
            if let Some(when) = &step.when {
                if !holds(&env, key, when, &ctx)? {
                    continue;
                }
            }

            match &step.action {
                Action::Start {
                    point,
                    pulse,
                    reason,
                } => {
                    let point = render(&env, key, point, &ctx)?;
                    let reason = match reason {
                        Some(r) => render(&env, key, r, &ctx)?,
                        None => DEFAULT_REASON.to_string(),
                    };
                    if !host.start(&point, *pulse, &reason) {
                        debug!(key = %key, point = %point, "Start refused");
                    }
                }
                Action::Cancel { point, reason } => {
                    let point = point
                        .as_ref()
                        .map(|p| render(&env, key, p, &ctx))
                        .transpose()?;
                    let reason = match reason {
                        Some(r) => render(&env, key, r, &ctx)?,
                        None => DEFAULT_REASON.to_string(),
                    };
                    host.cancel(point.as_deref(), &reason);
                }
                Action::Event {
                    category,
                    name,
                    action,
                    text,
                } => {
                    let category = render(&env, key, category, &ctx)?;
                    let name = render(&env, key, name, &ctx)?;
                    let action = render(&env, key, action, &ctx)?;
                    let text = render(&env, key, text, &ctx)?;
                    host.event(&category, &name, &action, &text);
                }
            }
        }
        Ok(())
    }

    fn background(&mut self, now: i64) {
        self.check_reload(now);
    }

    fn len(&self) -> usize {
        self.rules.len()
    }
}

fn validate(rules: &IndexMap<String, Vec<Step>>) -> RuleResult<()> {
    let env = Environment::new();
    for (key, steps) in rules {
        for step in steps {
            if let Action::Start { pulse, .. } = step.action {
                if pulse < 0 {
                    return Err(RuleError::Invalid {
                        key: key.clone(),
                        reason: format!("negative pulse {}", pulse),
                    });
                }
            }
            if let Some(when) = &step.when {
                env.compile_expression(when)
                    .map_err(|e| template_error(key, e))?;
            }
            for template in step.action.templates() {
                env.template_from_str(template)
                    .map_err(|e| template_error(key, e))?;
            }
        }
    }
    Ok(())
}

fn render<'s>(env: &Environment<'s>, key: &str, template: &'s str, ctx: &Value) -> RuleResult<String> {
    env.template_from_str(template)
        .and_then(|t| t.render(ctx))
        .map_err(|e| template_error(key, e))
}

fn holds<'s>(env: &Environment<'s>, key: &str, expr: &'s str, ctx: &Value) -> RuleResult<bool> {
    env.compile_expression(expr)
        .and_then(|e| e.eval(ctx))
        .map(|v| v.is_true())
        .map_err(|e| template_error(key, e))
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn template_error(key: &str, e: minijinja::Error) -> RuleError {
    RuleError::Template {
        key: key.to_string(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingHost {
        calls: Vec<String>,
        known: Vec<String>,
    }

    impl RuleHost for RecordingHost {
        fn start(&mut self, point: &str, pulse: i64, reason: &str) -> bool {
            self.calls.push(format!("start {} {} {}", point, pulse, reason));
            self.known.iter().any(|k| k == point)
        }

        fn cancel(&mut self, point: Option<&str>, reason: &str) {
            self.calls
                .push(format!("cancel {} {}", point.unwrap_or("*"), reason));
        }

        fn state(&mut self, _point: &str) -> String {
            String::new()
        }

        fn event(&mut self, category: &str, name: &str, action: &str, text: &str) {
            self.calls
                .push(format!("event {} {} {} {}", category, name, action, text));
        }
    }

    fn run(book: &mut RuleBook, key: &str, args: &[&str]) -> Vec<String> {
        let mut host = RecordingHost::default();
        let rule = book.lookup(key).unwrap();
        book.invoke(rule, args, &mut host).unwrap();
        host.calls
    }

    #[test]
    fn test_start_with_template_and_default_reason() {
        let mut book = RuleBook::from_yaml_str(
            r#"
EVENT.DOOR.front:
  - do: start
    point: "{{ args[0] | lower }}_light"
    pulse: 300
"#,
        )
        .unwrap();

        assert!(book.ready());
        assert_eq!(
            run(&mut book, "EVENT.DOOR.front", &["PORCH"]),
            vec!["start porch_light 300 MECH TRIGGER"]
        );
    }

    #[test]
    fn test_when_guard() {
        let mut book = RuleBook::from_yaml_str(
            r#"
POINT.pump:
  - do: cancel
    point: valve
    when: "args[0] == 'off'"
    reason: "pump {{ args[0] }}"
  - do: event
    category: PUMP
    name: "{{ key }}"
    action: "{{ args[0] | upper }}"
"#,
        )
        .unwrap();

        assert_eq!(
            run(&mut book, "POINT.pump", &["off"]),
            vec!["cancel valve pump off", "event PUMP POINT.pump OFF "]
        );
        assert_eq!(
            run(&mut book, "POINT.pump", &["on"]),
            vec!["event PUMP POINT.pump ON "]
        );
    }

    #[test]
    fn test_cancel_all() {
        let mut book = RuleBook::from_yaml_str(
            r#"
EVENT.HOUSE.mode.AWAY:
  - do: cancel
    reason: leaving
"#,
        )
        .unwrap();

        assert_eq!(
            run(&mut book, "EVENT.HOUSE.mode.AWAY", &[]),
            vec!["cancel * leaving"]
        );
    }

    #[test]
    fn test_lookup() {
        let book = RuleBook::from_yaml_str("EVENT.A: []\nEVENT.A.B: []\n").unwrap();

        assert_eq!(book.len(), 2);
        assert!(book.lookup("EVENT.A.B").is_some());
        assert!(book.lookup("EVENT.A.B.C").is_none());
    }

    #[test]
    fn test_empty_book_is_ready() {
        let book = RuleBook::from_yaml_str("").unwrap();
        assert!(book.ready());
        assert!(book.is_empty());
    }

    #[test]
    fn test_negative_pulse_is_rejected() {
        let err = RuleBook::from_yaml_str(
            "POINT.pump:\n  - do: start\n    point: pump\n    pulse: -5\n",
        )
        .err()
        .unwrap();

        assert!(matches!(err, RuleError::Invalid { .. }));
    }

    #[test]
    fn test_bad_template_is_rejected() {
        let err = RuleBook::from_yaml_str(
            "POINT.pump:\n  - do: start\n    point: \"{{ args[0 }}\"\n",
        )
        .err()
        .unwrap();

        assert!(matches!(err, RuleError::Template { .. }));
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let err = RuleBook::from_yaml_str("POINT.pump:\n  - do: explode\n")
            .err()
            .unwrap();
        assert!(matches!(err, RuleError::Format(_)));
    }

    #[test]
    fn test_file_book_loads_on_first_background() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("rules.yaml"),
            "EVENT.A:\n  - do: event\n    category: X\n    name: Y\n    action: Z\n",
        )
        .unwrap();

        let mut book = RuleBook::from_file(dir.path(), "rules.yaml", 10);
        assert!(!book.ready());

        book.background(100);
        assert!(book.ready());
        assert!(book.lookup("EVENT.A").is_some());
    }

    #[test]
    fn test_file_book_reloads_after_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.yaml");
        fs::write(&path, "EVENT.A: []\n").unwrap();

        let mut book = RuleBook::from_file(dir.path(), "rules.yaml", 10);
        book.background(100);
        assert!(book.lookup("EVENT.B").is_none());

        fs::write(&path, "EVENT.A: []\nEVENT.B: []\n").unwrap();
        let later = SystemTime::now() + std::time::Duration::from_secs(5);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();

        // Not due yet
        book.background(105);
        assert!(book.lookup("EVENT.B").is_none());

        book.background(110);
        assert!(book.lookup("EVENT.B").is_some());
    }

    #[test]
    fn test_broken_reload_keeps_previous_rules() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.yaml");
        fs::write(&path, "EVENT.A: []\n").unwrap();

        let mut book = RuleBook::from_file(dir.path(), "rules.yaml", 10);
        book.background(100);

        fs::write(&path, "EVENT.A: [\n").unwrap();
        let later = SystemTime::now() + std::time::Duration::from_secs(5);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();

        book.background(110);
        assert!(book.ready());
        assert!(book.lookup("EVENT.A").is_some());
    }

    #[test]
    fn test_missing_file_is_not_ready() {
        let dir = TempDir::new().unwrap();
        let mut book = RuleBook::from_file(dir.path(), "rules.yaml", 10);

        book.background(100);
        assert!(!book.ready());
    }
}
