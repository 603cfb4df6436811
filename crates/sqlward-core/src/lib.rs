//! # sqlward-core
//!
//! Types shared by every sqlward crate:
//!
//! - [`config`]: YAML configuration for the gateway (proxy, audit, rules,
//!   execution throttling, credentials)
//! - [`settings`]: the hot-reloadable rule settings store
//! - [`record`]: the per-statement audit/execution record
//! - [`target`]: the client traits used to talk to target databases
//! - [`types`]: ordered enums for rule levels, severities, stages and modes

pub mod config;
pub mod record;
pub mod settings;
pub mod target;
pub mod types;

pub use config::{
    AuditConfig, ConfigError, ExecutionConfig, GatewayConfig, ProxyConfig, RuleLevels,
    RuleLimits, RuleSettings, SecurityConfig,
};
pub use record::StatementRecord;
pub use settings::SettingsStore;
pub use target::{
    QueryRows, RemoteWarning, TargetConnection, TargetConnector, TargetDescriptor, TargetError,
};
pub use types::{CostTier, DbType, DbVersion, OpMode, RuleLevel, Severity, SqlKind, Stage};
