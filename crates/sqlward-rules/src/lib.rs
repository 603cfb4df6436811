//! # sqlward-rules
//!
//! The audit side of the gateway:
//!
//! - [`engine`]: [`RuleEngine`], one rule family per statement kind
//! - [`simulator`]: objects created earlier in the same session
//! - [`catalog`]: existence and size lookups against the target
//! - [`cost`]: ALTER TABLE cost prediction
//! - [`sqltypes`]: the statement kinds the gateway audits
//!
//! Rules only ever raise a statement's severity, and a rule configured
//! `OFF` never produces a finding.

pub mod catalog;
pub mod context;
pub mod cost;
pub mod engine;
pub mod simulator;
pub mod sqltypes;

mod checks;
mod keywords;

pub use catalog::{Catalog, RemoteCatalog, RemoteColumn};
pub use checks::must_have::RequiredColumn;
pub use context::AuditContext;
pub use cost::predict_cost;
pub use engine::{RuleEngine, connect_error_message};
pub use simulator::SchemaSimulator;
pub use sqltypes::{SqlTypeEntry, sql_types};
