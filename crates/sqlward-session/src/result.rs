//! Tabular results returned to the client.

use crate::registry::SessionSummary;
use serde::Serialize;
use sqlward_core::{DbType, DbVersion, StatementRecord};
use sqlward_rules::SqlTypeEntry;

/// Column names of the CHECK/EXECUTE result.
pub const CHECK_COLUMNS: &[&str] = &[
    "id",
    "stage",
    "err_level",
    "stage_status",
    "err_message",
    "sql_text",
    "affected_rows",
    "sequence",
    "backup_dbname",
    "execute_time",
    "sql_sha1",
    "sql_type",
    "ddl_algorithm",
    "db_type",
    "db_version",
];

/// A result set of text cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One merged group produced in SPLIT mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitGroup {
    pub sql: String,
    /// Set when the group contains an ALTER TABLE or DROP TABLE.
    pub ddl_flag: bool,
}

impl ResultTable {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One row per statement record. `profile` is the detected dialect and
    /// version, `None` when no connection was made.
    pub fn check(records: &[StatementRecord], profile: Option<(DbType, DbVersion)>) -> Self {
        let (db_type, db_version) = match profile {
            Some((db_type, version)) => (db_type.to_string(), version.to_string()),
            None => ("Unknown".to_string(), String::new()),
        };

        let mut table = Self::new(CHECK_COLUMNS);
        for record in records {
            table.push_row(vec![
                record.id.to_string(),
                record.stage_label(),
                record.severity().code().to_string(),
                record.stage_status.clone(),
                record.findings_text(),
                record.sql_text.clone(),
                record.affected_rows.to_string(),
                record.sequence.clone(),
                record.backup_dbname.clone(),
                record.execute_time.clone(),
                record.fingerprint.clone(),
                record.sql_type_label(),
                record.cost.map(|c| c.to_string()).unwrap_or_default(),
                db_type.clone(),
                db_version.clone(),
            ]);
        }
        table
    }

    pub fn split(groups: &[SplitGroup]) -> Self {
        let mut table = Self::new(&["id", "sql_statement", "ddlflag"]);
        for (i, group) in groups.iter().enumerate() {
            table.push_row(vec![
                (i + 1).to_string(),
                group.sql.clone(),
                u8::from(group.ddl_flag).to_string(),
            ]);
        }
        table
    }

    /// `rows` holds the statement text and its JSON query tree.
    pub fn tree(rows: &[(String, String)]) -> Self {
        let mut table = Self::new(&["id", "sql_text", "query_tree"]);
        for (i, (sql, tree)) in rows.iter().enumerate() {
            table.push_row(vec![(i + 1).to_string(), sql.clone(), tree.clone()]);
        }
        table
    }

    pub fn sessions(summaries: &[SessionSummary]) -> Self {
        let mut table = Self::new(&[
            "thread_id",
            "host",
            "port",
            "user",
            "mode",
            "db_type",
            "sleep_ms",
            "total_sql",
            "executed_sql",
            "elapsed",
            "threads_running",
            "repl_delay",
        ]);
        for s in summaries {
            let repl_delay = if s.repl_delay < 0 {
                "-".to_string()
            } else {
                format!("{}s", s.repl_delay)
            };
            table.push_row(vec![
                s.id.to_string(),
                s.host.clone(),
                s.port.to_string(),
                s.user.clone(),
                s.mode.to_string(),
                s.db_type.clone(),
                s.sleep_ms.to_string(),
                s.total_sql.to_string(),
                s.executed_sql.to_string(),
                format!("{:.1}s", s.elapsed_secs),
                s.threads_running.to_string(),
                repl_delay,
            ]);
        }
        table
    }

    pub fn sql_types(entries: &[SqlTypeEntry]) -> Self {
        let mut table = Self::new(&["sqltype", "description", "audited"]);
        for entry in entries {
            table.push_row(vec![
                entry.sql_type.clone(),
                entry.description.to_string(),
                if entry.audited { "YES" } else { "NO" }.to_string(),
            ]);
        }
        table
    }

    pub fn encrypted_password(value: String) -> Self {
        Self::single("encrypted_password", value)
    }

    /// One column, one row.
    pub fn single(column: &str, value: String) -> Self {
        let mut table = Self::new(&[column]);
        table.push_row(vec![value]);
        table
    }
}
