//! Audit logging configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the JSONL audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether audit logging is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Append audit records to this file.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Also print audit records to stdout.
    #[serde(default)]
    pub stdout: bool,

    /// Maximum characters of statement text kept in a statement record.
    #[serde(default = "default_max_sql_length")]
    pub max_sql_length: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            file: None,
            stdout: false,
            max_sql_length: default_max_sql_length(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_max_sql_length() -> usize {
    4096
}
