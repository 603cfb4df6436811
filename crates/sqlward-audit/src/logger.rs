//! Audit logger implementation.

use sqlward_core::{AuditConfig, OpMode, StatementRecord};
use std::sync::Arc;

use crate::error::AuditError;
use crate::event::{AuditEvent, SessionIdentity};
use crate::storage::{AuditStorage, ConsoleStorage, DualStorage, FileStorage, NullStorage};

/// The main audit logger.
///
/// Cheap to clone; sessions share one logger. Storage failures are traced
/// and swallowed by the `log_*` helpers so auditing never fails a session.
#[derive(Clone)]
pub struct AuditLogger {
    config: AuditConfig,
    storage: Arc<dyn AuditStorage>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AuditLogger {
    /// Create a new audit logger with the given configuration.
    pub fn new(config: AuditConfig) -> Result<Self, AuditError> {
        let storage: Arc<dyn AuditStorage> = match (&config.file, config.stdout) {
            _ if !config.enabled => Arc::new(NullStorage::new()),
            (Some(path), true) => Arc::new(DualStorage::new(path)?),
            (Some(path), false) => Arc::new(FileStorage::new(path)?),
            (None, true) => Arc::new(ConsoleStorage::new()),
            (None, false) => {
                tracing::info!("Audit enabled without file or stdout; events are discarded");
                Arc::new(NullStorage::new())
            }
        };

        Ok(Self { config, storage })
    }

    /// Create a logger with a custom storage backend.
    pub fn with_storage(config: AuditConfig, storage: Arc<dyn AuditStorage>) -> Self {
        Self { config, storage }
    }

    /// Create a disabled (no-op) logger.
    pub fn disabled() -> Self {
        Self {
            config: AuditConfig {
                enabled: false,
                ..Default::default()
            },
            storage: Arc::new(NullStorage::new()),
        }
    }

    /// Check if logging is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Log an audit event.
    pub async fn log(&self, event: AuditEvent) -> Result<(), AuditError> {
        if !self.config.enabled {
            return Ok(());
        }

        tracing::debug!(event_type = event.kind(), "Audit event");

        self.storage.store(&event).await
    }

    async fn log_or_trace(&self, event: AuditEvent) {
        if let Err(e) = self.log(event).await {
            tracing::warn!(error = %e, "Failed to write audit event");
        }
    }

    /// Log a closed session.
    pub async fn log_session(
        &self,
        identity: &SessionIdentity,
        mode: OpMode,
        statements: usize,
        errors: usize,
        duration_ms: u64,
    ) {
        self.log_or_trace(AuditEvent::session(identity, mode, statements, errors, duration_ms))
            .await;
    }

    /// Log one statement with its outcome.
    pub async fn log_statement(&self, identity: &SessionIdentity, record: &StatementRecord) {
        self.log_or_trace(AuditEvent::statement(
            identity,
            record,
            self.config.max_sql_length,
        ))
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use sqlward_core::SqlKind;

    #[tokio::test]
    async fn test_disabled_logger() {
        let logger = AuditLogger::disabled();
        assert!(!logger.is_enabled());

        // Should not error even when logging
        logger
            .log(AuditEvent::session(&SessionIdentity::default(), OpMode::Check, 0, 0, 0))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_statement_sql_is_truncated() {
        let storage = Arc::new(MemoryStorage::new());
        let config = AuditConfig {
            max_sql_length: 10,
            ..Default::default()
        };
        let logger = AuditLogger::with_storage(config, storage.clone());

        let record = StatementRecord::new(1, "SELECT * FROM orders WHERE id = 1", SqlKind::Select);
        logger.log_statement(&SessionIdentity::default(), &record).await;

        let events = storage.events();
        let AuditEvent::Statement(event) = &events[0] else {
            panic!("expected a statement event");
        };
        assert_eq!(event.sql, "SELECT * F...");
        assert_eq!(event.result, "OK");
    }

    #[tokio::test]
    async fn test_new_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AuditConfig {
            file: Some(dir.path().join("audit.jsonl")),
            ..Default::default()
        };
        let logger = AuditLogger::new(config).unwrap();
        logger
            .log_session(&SessionIdentity::default(), OpMode::Execute, 2, 0, 10)
            .await;
        let content = std::fs::read_to_string(dir.path().join("audit.jsonl")).unwrap();
        assert!(content.contains("\"type\":\"session\""));
    }
}
