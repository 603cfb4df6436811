//! # sqlward-audit
//!
//! Audit logging for the sqlward gateway.
//!
//! Every closed session and every statement that reaches a forwarding
//! decision is written as one JSON object per line:
//!
//! | `type` | Written when |
//! |--------|--------------|
//! | `statement` | A statement was executed, skipped or rejected |
//! | `session` | A bracketed session closed |
//!
//! Backends: file (append), console, dual (both), null and memory.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sqlward_audit::{AuditLogger, SessionIdentity};
//! use sqlward_core::{AuditConfig, OpMode};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let logger = AuditLogger::new(AuditConfig::default())?;
//! let identity = SessionIdentity {
//!     user: "dba".into(),
//!     client_host: "10.0.0.5".into(),
//!     target: "db1:3306".into(),
//!     target_user: "root".into(),
//! };
//! logger.log_session(&identity, OpMode::Execute, 12, 0, 840).await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod event;
pub mod logger;
pub mod storage;

pub use error::AuditError;
pub use event::{AuditEvent, SessionEvent, SessionIdentity, StatementEvent, truncate_sql};
pub use logger::AuditLogger;
pub use storage::{
    AuditStorage, ConsoleStorage, DualStorage, FileStorage, MemoryStorage, NullStorage,
};
