//! Configuration types for the Sqlward gateway.
//!
//! Configuration is loaded from a single YAML file (`sqlward.yaml`). Rule
//! settings can live inline under `rules:` or in a separate file referenced by
//! `rules_file`, resolved relative to the main configuration file.

pub mod audit;
pub mod execution;
pub mod proxy;
pub mod rules;
pub mod security;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use audit::AuditConfig;
pub use execution::ExecutionConfig;
pub use proxy::ProxyConfig;
pub use rules::{RuleLevels, RuleLimits, RuleSettings};
pub use security::SecurityConfig;

/// Complete gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Client-facing listener.
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Audit logging.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Rule levels and limits (inline).
    #[serde(default)]
    pub rules: RuleSettings,

    /// Path to a rules file (alternative to inline).
    #[serde(default)]
    pub rules_file: Option<PathBuf>,

    /// Forwarding and throttling.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Credential defaults and encryption key.
    #[serde(default)]
    pub security: SecurityConfig,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration and resolve `rules_file`.
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        if let Some(rules_path) = config.rules_path(&base_dir) {
            if !rules_path.exists() {
                return Err(ConfigError::Config(format!(
                    "rules file not found: {}",
                    rules_path.display()
                )));
            }
            let content = fs::read_to_string(&rules_path)?;
            config.rules = RuleSettings::from_yaml(&content)?;
            config.rules_file = Some(rules_path);
        }

        config.validate()?;
        Ok(config)
    }

    /// Absolute location of the rules file, if one is configured.
    pub fn rules_path(&self, base_dir: &Path) -> Option<PathBuf> {
        self.rules_file.as_ref().map(|file| {
            if file.is_absolute() {
                file.clone()
            } else {
                base_dir.join(file)
            }
        })
    }

    /// Reject settings the gateway cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.proxy.listen_port == 0 {
            return Err(ConfigError::Config("proxy.listen_port must be set".into()));
        }
        if self.proxy.max_connections == 0 {
            return Err(ConfigError::Config(
                "proxy.max_connections must be greater than zero".into(),
            ));
        }
        if self.execution.poll_interval_ms == 0 {
            return Err(ConfigError::Config(
                "execution.poll_interval_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RuleLevel;
    use std::io::Write;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = GatewayConfig::from_yaml("{}").unwrap();
        assert_eq!(config.proxy.listen_port, 4000);
        assert!(config.audit.enabled);
        assert_eq!(config.execution.query_timeout_secs, 600);
        assert_eq!(config.rules.limits.max_update_rows, 10000);
        assert!(config.security.key().is_none());
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
proxy:
  listen_port: 6033
  users:
    dba: secret
audit:
  stdout: true
rules:
  levels:
    check_nullable: ERROR
execution:
  max_threads_running: 64
security:
  encrypt_key: k3y
"#;
        let config = GatewayConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.proxy.bind_address(), "0.0.0.0:6033");
        assert!(config.audit.stdout);
        assert_eq!(config.rules.levels.check_nullable, RuleLevel::Error);
        assert_eq!(config.execution.max_threads_running, 64);
        assert_eq!(config.security.key(), Some("k3y"));
    }

    #[test]
    fn test_rules_file_resolved_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();

        let mut rules = fs::File::create(dir.path().join("rules.yaml")).unwrap();
        writeln!(rules, "levels:\n  check_primary_key: OFF").unwrap();

        let main = dir.path().join("sqlward.yaml");
        fs::write(&main, "rules_file: rules.yaml\n").unwrap();

        let config = GatewayConfig::load_with_context(&main).unwrap();
        assert_eq!(config.rules.levels.check_primary_key, RuleLevel::Off);
        assert_eq!(config.rules_file, Some(dir.path().join("rules.yaml")));
    }

    #[test]
    fn test_missing_rules_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("sqlward.yaml");
        fs::write(&main, "rules_file: nope.yaml\n").unwrap();

        let err = GatewayConfig::load_with_context(&main).unwrap_err();
        assert!(matches!(err, ConfigError::Config(_)));
    }
}
