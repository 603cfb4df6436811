//! Audit event types.
//!
//! Two events are written: one per statement that reaches a forwarding
//! decision, and one per closed session. Both serialize to a single JSON
//! object tagged with `type`.

use serde::{Deserialize, Serialize};
use sqlward_core::{OpMode, Severity, StatementRecord};

/// Local time in the audit log format.
pub fn now() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Cut `sql` to `max` characters, marking the cut with `...`.
pub fn truncate_sql(sql: &str, max: usize) -> String {
    match sql.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &sql[..cut]),
        None => sql.to_string(),
    }
}

/// Who is talking to which target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionIdentity {
    /// Client user on the gateway connection.
    pub user: String,
    pub client_host: String,
    /// `host:port` of the target.
    pub target: String,
    pub target_user: String,
}

/// A closed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub time: String,
    pub user: String,
    pub client_host: String,
    pub target: String,
    pub target_user: String,
    pub mode: String,
    pub statements: usize,
    pub errors: usize,
    pub duration_ms: u64,
}

/// One audited or executed statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementEvent {
    pub time: String,
    pub user: String,
    pub client_host: String,
    pub target: String,
    pub id: u32,
    pub sql: String,
    /// `OK` or `ERROR`.
    pub result: String,
    pub affected_rows: i64,
    pub execute_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    Session(SessionEvent),
    Statement(StatementEvent),
}

impl AuditEvent {
    pub fn session(
        identity: &SessionIdentity,
        mode: OpMode,
        statements: usize,
        errors: usize,
        duration_ms: u64,
    ) -> Self {
        Self::Session(SessionEvent {
            time: now(),
            user: identity.user.clone(),
            client_host: identity.client_host.clone(),
            target: identity.target.clone(),
            target_user: identity.target_user.clone(),
            mode: mode.to_string(),
            statements,
            errors,
            duration_ms,
        })
    }

    pub fn statement(identity: &SessionIdentity, record: &StatementRecord, max_sql: usize) -> Self {
        let result = if record.severity() == Severity::Error {
            "ERROR"
        } else {
            "OK"
        };
        Self::Statement(StatementEvent {
            time: now(),
            user: identity.user.clone(),
            client_host: identity.client_host.clone(),
            target: identity.target.clone(),
            id: record.id,
            sql: truncate_sql(&record.sql_text, max_sql),
            result: result.to_string(),
            affected_rows: record.affected_rows,
            execute_time: record.execute_time.clone(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Session(_) => "session",
            Self::Statement(_) => "statement",
        }
    }

    /// Human-readable single line for console output.
    pub fn to_log_line(&self) -> String {
        match self {
            Self::Session(e) => format!(
                "[{}] SESSION user={} client={} target={} mode={} statements={} errors={} duration_ms={}",
                e.time, e.user, e.client_host, e.target, e.mode, e.statements, e.errors, e.duration_ms
            ),
            Self::Statement(e) => {
                let preview = truncate_sql(&e.sql, 100).replace('\n', " ");
                format!(
                    "[{}] STATEMENT user={} target={} id={} result={} rows={} sql=\"{}\"",
                    e.time, e.user, e.target, e.id, e.result, e.affected_rows, preview
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlward_core::SqlKind;

    fn identity() -> SessionIdentity {
        SessionIdentity {
            user: "dba".into(),
            client_host: "10.0.0.5".into(),
            target: "db1:3306".into(),
            target_user: "root".into(),
        }
    }

    #[test]
    fn test_truncate_sql() {
        assert_eq!(truncate_sql("SELECT 1", 100), "SELECT 1");
        assert_eq!(truncate_sql("SELECT 1", 6), "SELECT...");
        assert_eq!(truncate_sql("héllo", 2), "hé...");
    }

    #[test]
    fn test_statement_event_json() {
        let mut record = StatementRecord::new(3, "DELETE FROM t WHERE id = 1", SqlKind::Delete);
        record.affected_rows = 1;
        record.append_error("boom");
        let event = AuditEvent::statement(&identity(), &record, 4096);

        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "statement");
        assert_eq!(json["result"], "ERROR");
        assert_eq!(json["id"], 3);
        assert_eq!(json["target"], "db1:3306");
        assert_eq!(json["time"].as_str().unwrap().len(), 19);
    }

    #[test]
    fn test_session_event_roundtrip_and_line() {
        let event = AuditEvent::session(&identity(), OpMode::Execute, 4, 1, 120);
        let line = serde_json::to_string(&event).unwrap();
        let back: AuditEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(back, event);
        assert_eq!(event.kind(), "session");
        assert!(event.to_log_line().contains("mode=EXECUTE"));
    }
}
