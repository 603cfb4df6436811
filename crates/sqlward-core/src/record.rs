//! Per-statement audit and execution record.

use crate::types::{CostTier, RuleLevel, Severity, SqlKind, Stage};
use serde::{Deserialize, Serialize};

/// Outcome of one intercepted statement within a session.
///
/// Severity only ever goes up and findings are append-only: every rule that
/// fires goes through [`StatementRecord::report`], [`append_warning`] or
/// [`append_error`].
///
/// [`append_warning`]: StatementRecord::append_warning
/// [`append_error`]: StatementRecord::append_error
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatementRecord {
    /// 1-based position within the session.
    pub id: u32,
    pub sql_text: String,
    pub db_name: String,
    pub table_name: String,
    pub kind: SqlKind,
    /// Fine-grained subtype, e.g. the ALTER sub-operations.
    pub sub_type: Option<String>,
    pub stage: Stage,
    pub stage_status: String,
    severity: Severity,
    findings: Vec<String>,
    /// Estimated rows during audit, actual rows after execution.
    pub affected_rows: i64,
    pub sequence: String,
    pub backup_dbname: String,
    /// Execution duration in seconds, formatted `%.3f`.
    pub execute_time: String,
    pub fingerprint: String,
    pub cost: Option<CostTier>,
}

impl StatementRecord {
    pub fn new(id: u32, sql_text: impl Into<String>, kind: SqlKind) -> Self {
        Self {
            id,
            sql_text: sql_text.into(),
            kind,
            execute_time: "0".to_string(),
            ..Default::default()
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn findings(&self) -> &[String] {
        &self.findings
    }

    /// Append a finding and raise severity to ERROR.
    pub fn append_error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message.into());
    }

    /// Append a finding and raise severity to at least WARNING.
    pub fn append_warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message.into());
    }

    /// Report a rule violation at the rule's configured level.
    ///
    /// Does nothing when the level is `Off`.
    pub fn report(&mut self, level: RuleLevel, message: impl Into<String>) {
        if level.is_off() {
            return;
        }
        self.push(Severity::from(level), message.into());
    }

    fn push(&mut self, severity: Severity, message: String) {
        self.findings.push(message);
        if self.severity < severity {
            self.severity = severity;
        }
    }

    /// Findings joined by newlines, `None` when there are none.
    pub fn findings_text(&self) -> String {
        if self.findings.is_empty() {
            "None".to_string()
        } else {
            self.findings.join("\n")
        }
    }

    /// Kind with subtype, e.g. `ALTER_TABLE.ADD_COLUMN`.
    pub fn sql_type_label(&self) -> String {
        match &self.sub_type {
            Some(sub) if !sub.is_empty() => format!("{}.{}", self.kind, sub),
            _ => self.kind.to_string(),
        }
    }

    /// Stage label, with session-state statements that ran shown as `RERUN`.
    pub fn stage_label(&self) -> String {
        if self.stage == Stage::Executed && self.kind.is_session_state() {
            "RERUN".to_string()
        } else {
            self.stage.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_never_decreases() {
        let mut record = StatementRecord::new(1, "DROP TABLE t", SqlKind::DropTable);
        record.append_error("first");
        record.append_warning("second");
        record.report(RuleLevel::Warning, "third");
        assert_eq!(record.severity(), Severity::Error);
        assert_eq!(record.findings().len(), 3);
    }

    #[test]
    fn test_report_off_is_noop() {
        let mut record = StatementRecord::new(1, "SELECT 1", SqlKind::Select);
        record.report(RuleLevel::Off, "ignored");
        assert_eq!(record.severity(), Severity::Ok);
        assert!(record.findings().is_empty());
        assert_eq!(record.findings_text(), "None");
    }

    #[test]
    fn test_report_levels_raise_severity() {
        let mut record = StatementRecord::new(1, "SELECT 1", SqlKind::Select);
        record.report(RuleLevel::Warning, "w");
        assert_eq!(record.severity(), Severity::Warning);
        record.report(RuleLevel::Error, "e");
        assert_eq!(record.severity(), Severity::Error);
        assert_eq!(record.findings_text(), "w\ne");
    }

    #[test]
    fn test_labels() {
        let mut record = StatementRecord::new(2, "ALTER TABLE t ADD c INT", SqlKind::AlterTable);
        record.sub_type = Some("ADD_COLUMN".to_string());
        assert_eq!(record.sql_type_label(), "ALTER_TABLE.ADD_COLUMN");

        let mut use_db = StatementRecord::new(3, "USE db", SqlKind::UseDatabase);
        use_db.stage = Stage::Executed;
        assert_eq!(use_db.stage_label(), "RERUN");
    }
}
