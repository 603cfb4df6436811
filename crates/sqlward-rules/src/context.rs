//! Per-session state the rule engine reads and updates while auditing.

use crate::catalog::{Catalog, RemoteColumn};
use crate::simulator::SchemaSimulator;
use sqlward_core::{DbType, DbVersion, TargetError};
use std::collections::HashSet;

/// Everything a rule may consult besides the statement itself.
///
/// The context borrows the session's simulator and catalog for the duration
/// of one statement. `catalog` is `None` when the target is unreachable, in
/// which case existence lookups answer "unknown" and the dependent rules are
/// skipped.
pub struct AuditContext<'a> {
    pub simulator: &'a mut SchemaSimulator,
    /// `db.table` keys already altered in this session.
    pub altered_tables: &'a mut HashSet<String>,
    pub ambient_db: &'a str,
    pub db_type: DbType,
    pub db_version: DbVersion,
    pub catalog: Option<&'a mut dyn Catalog>,
    /// Connection failure text, reported once per statement.
    pub connect_error: Option<&'a str>,
}

fn unknown<T>(what: &str, err: TargetError) -> Option<T> {
    tracing::warn!(lookup = what, error = %err, "Catalog lookup failed, skipping rule");
    None
}

impl<'a> AuditContext<'a> {
    pub fn new(
        simulator: &'a mut SchemaSimulator,
        altered_tables: &'a mut HashSet<String>,
        ambient_db: &'a str,
    ) -> Self {
        Self {
            simulator,
            altered_tables,
            ambient_db,
            db_type: DbType::default(),
            db_version: DbVersion::default(),
            catalog: None,
            connect_error: None,
        }
    }

    pub fn with_catalog(mut self, catalog: &'a mut dyn Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_target(mut self, db_type: DbType, db_version: DbVersion) -> Self {
        self.db_type = db_type;
        self.db_version = db_version;
        self
    }

    pub fn with_connect_error(mut self, message: &'a str) -> Self {
        self.connect_error = Some(message);
        self
    }

    pub fn is_tidb(&self) -> bool {
        self.db_type == DbType::TiDb
    }

    /// Whether the target can be asked at all.
    pub fn has_catalog(&self) -> bool {
        self.catalog.is_some()
    }

    /// Remote-only database lookup. `None` means unknown.
    pub async fn remote_database_exists(&mut self, db: &str) -> Option<bool> {
        let catalog = self.catalog.as_deref_mut()?;
        catalog
            .database_exists(db)
            .await
            .map_or_else(|e| unknown("database", e), Some)
    }

    /// Remote-only table lookup. `None` means unknown.
    pub async fn remote_table_exists(&mut self, db: &str, table: &str) -> Option<bool> {
        let catalog = self.catalog.as_deref_mut()?;
        catalog
            .table_exists(db, table)
            .await
            .map_or_else(|e| unknown("table", e), Some)
    }

    /// Simulator first, then the target.
    pub async fn table_exists(&mut self, db: &str, table: &str) -> Option<bool> {
        if self.simulator.has_table(db, table) {
            return Some(true);
        }
        self.remote_table_exists(db, table).await
    }

    /// Column lookup against a simulated table, or the target when the
    /// table was not created in this session.
    pub async fn column_exists(&mut self, db: &str, table: &str, column: &str) -> Option<bool> {
        if self.simulator.has_table(db, table) {
            return self.simulator.column_exists(db, table, column);
        }
        let catalog = self.catalog.as_deref_mut()?;
        catalog
            .column_exists(db, table, column)
            .await
            .map_or_else(|e| unknown("column", e), Some)
    }

    pub async fn index_exists(&mut self, db: &str, table: &str, index: &str) -> Option<bool> {
        let catalog = self.catalog.as_deref_mut()?;
        catalog
            .index_exists(db, table, index)
            .await
            .map_or_else(|e| unknown("index", e), Some)
    }

    pub async fn table_rows(&mut self, db: &str, table: &str) -> Option<i64> {
        let catalog = self.catalog.as_deref_mut()?;
        catalog
            .table_rows(db, table)
            .await
            .unwrap_or_else(|e| unknown("table_rows", e))
    }

    pub async fn column_info(&mut self, db: &str, table: &str, column: &str) -> Option<RemoteColumn> {
        let catalog = self.catalog.as_deref_mut()?;
        catalog
            .column_info(db, table, column)
            .await
            .unwrap_or_else(|e| unknown("column_info", e))
    }

    /// EXPLAIN estimate, falling back to `TABLE_ROWS`.
    pub async fn estimate_rows(&mut self, db: &str, table: &str, sql: &str) -> Option<i64> {
        let db_type = self.db_type;
        let catalog = self.catalog.as_deref_mut()?;
        match catalog.explain_rows(db, sql, db_type).await {
            Ok(Some(rows)) => return Some(rows),
            Ok(None) => {}
            Err(e) => tracing::debug!(error = %e, "EXPLAIN failed, using TABLE_ROWS"),
        }
        self.table_rows(db, table).await
    }
}
