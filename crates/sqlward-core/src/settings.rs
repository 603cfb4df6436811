//! Hot-reloadable rule settings.
//!
//! Sessions take a snapshot when they start, so a change made with
//! `inception set <rule> <value>` or a SIGHUP reload only affects sessions
//! opened afterwards.

use crate::config::{ConfigError, RuleSettings};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Shared store of the current rule settings.
#[derive(Debug)]
pub struct SettingsStore {
    current: RwLock<Arc<RuleSettings>>,
    source: Option<PathBuf>,
}

impl SettingsStore {
    pub fn new(settings: RuleSettings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
            source: None,
        }
    }

    /// Store backed by a rules file that [`SettingsStore::reload`] re-reads.
    pub fn with_source(settings: RuleSettings, source: impl Into<PathBuf>) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
            source: Some(source.into()),
        }
    }

    /// Settings as of now.
    pub fn snapshot(&self) -> Arc<RuleSettings> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn replace(&self, settings: RuleSettings) {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::new(settings);
    }

    /// Update one setting by name. Copy-on-write: running sessions keep the
    /// snapshot they started with.
    pub fn set(&self, name: &str, value: &str) -> Result<(), ConfigError> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut next = RuleSettings::clone(&guard);
        next.set(name, value)?;
        *guard = Arc::new(next);
        tracing::info!(setting = name, value, "Rule setting updated");
        Ok(())
    }

    /// Re-read the rules file this store was created from.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let Some(path) = self.source.clone() else {
            return Err(ConfigError::Config("no rules file to reload".into()));
        };
        self.reload_from_file(&path)
    }

    pub fn reload_from_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let settings = RuleSettings::from_yaml(&content)?;
        self.replace(settings);
        tracing::info!(path = %path.as_ref().display(), "Rule settings reloaded");
        Ok(())
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(RuleSettings::default())
    }
}
