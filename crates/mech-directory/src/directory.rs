//! The directory seam and its static implementation

use dashmap::DashMap;
use mech_config::DirectoryConfig;
use mech_core::categories;
use std::sync::Arc;
use tracing::{debug, info};

/// Lists the providers of a service category
pub trait Directory: Send + Sync {
    /// Base URLs of the providers currently offering `category`
    fn list_providers(&self, category: &str) -> Vec<String>;

    /// Whether the provider set of `category` changed at or after `since` (seconds)
    fn changed_since(&self, category: &str, since: i64) -> bool;
}

/// Thread-safe handle to a directory
pub type SharedDirectory = Arc<dyn Directory>;

struct Membership {
    providers: Vec<String>,
    changed: i64,
}

/// A directory whose membership is set explicitly
///
/// Built from the `directory:` section of the configuration. Membership can
/// be replaced at runtime with [`StaticDirectory::update`], which records the
/// change time used by [`Directory::changed_since`].
#[derive(Default)]
pub struct StaticDirectory {
    categories: DashMap<String, Membership>,
}

impl StaticDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory from configuration, stamped as changed at `now`
    pub fn from_config(config: &DirectoryConfig, now: i64) -> Self {
        let directory = Self::new();
        directory.update(categories::CONTROL, config.control.clone(), now);
        directory.update(categories::HISTORY, config.history.clone(), now);
        directory
    }

    /// Replace the providers of a category
    ///
    /// The change time only moves when the provider set actually differs.
    pub fn update(&self, category: &str, providers: Vec<String>, now: i64) {
        let mut entry = self
            .categories
            .entry(category.to_string())
            .or_insert_with(|| Membership {
                providers: Vec::new(),
                changed: i64::MIN,
            });

        if entry.providers == providers {
            debug!(category, "Directory membership unchanged");
            return;
        }

        info!(category, count = providers.len(), "Directory membership changed");
        entry.providers = providers;
        entry.changed = now;
    }
}

impl Directory for StaticDirectory {
    fn list_providers(&self, category: &str) -> Vec<String> {
        self.categories
            .get(category)
            .map(|m| m.providers.clone())
            .unwrap_or_default()
    }

    fn changed_since(&self, category: &str, since: i64) -> bool {
        self.categories
            .get(category)
            .map(|m| m.changed >= since)
            .unwrap_or(false)
    }
}
