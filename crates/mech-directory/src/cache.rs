//! Provider cache for one service category

use crate::Directory;
use serde::Serialize;
use tracing::debug;

/// A periodically refreshed list of provider URLs for one category
///
/// A refresh is due when `interval` seconds have passed since the last one,
/// or earlier when the directory reports a membership change. A refresh
/// discards the previous list entirely before re-enumerating.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderCache {
    #[serde(skip)]
    category: String,
    #[serde(skip)]
    interval: i64,
    #[serde(skip)]
    last_refresh: i64,
    providers: Vec<String>,
}

impl ProviderCache {
    /// Create an empty cache for `category`
    pub fn new(category: impl Into<String>, interval: i64) -> Self {
        Self {
            category: category.into(),
            interval,
            last_refresh: 0,
            providers: Vec::new(),
        }
    }

    /// Category this cache follows
    pub fn category(&self) -> &str {
        &self.category
    }

    /// The providers found by the last refresh
    pub fn providers(&self) -> &[String] {
        &self.providers
    }

    /// Force the next call to [`ProviderCache::refresh`] to rescan
    pub fn invalidate(&mut self) {
        self.last_refresh = 0;
    }

    /// Whether a refresh is due at `now`
    pub fn is_due(&self, directory: &dyn Directory, now: i64) -> bool {
        if self.last_refresh > 0 && directory.changed_since(&self.category, self.last_refresh) {
            return true;
        }
        now > self.last_refresh + self.interval
    }

    /// Rebuild the list if due; returns true when the list was rebuilt
    pub fn refresh(&mut self, directory: &dyn Directory, now: i64) -> bool {
        if !self.is_due(directory, now) {
            return false;
        }
        self.last_refresh = now;

        debug!(category = %self.category, "Reset providers cache");
        self.providers.clear();
        self.providers = directory.list_providers(&self.category);
        true
    }
}
