//! Session-scoped shadow of the schema objects created within a batch.

use std::collections::{HashMap, HashSet};

/// Databases, tables and columns created earlier in the same session.
///
/// Later statements consult it before asking the target, so a batch can
/// reference objects that do not exist remotely yet. It only grows: a
/// DROP COLUMN leaves the column recorded. All names compare
/// case-insensitively.
#[derive(Debug, Default, Clone)]
pub struct SchemaSimulator {
    databases: HashSet<String>,
    tables: HashMap<String, SimulatedTable>,
}

#[derive(Debug, Default, Clone)]
struct SimulatedTable {
    columns: HashSet<String>,
    /// False when the table was copied from a structure this session never
    /// saw, so a column missing from `columns` may still exist.
    complete: bool,
}

fn fold(name: &str) -> String {
    name.to_ascii_lowercase()
}

fn table_key(db: &str, table: &str) -> String {
    format!("{}.{}", fold(db), fold(table))
}

impl SchemaSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_database(&mut self, db: &str) {
        self.databases.insert(fold(db));
    }

    /// Record a created table with its columns, replacing any earlier entry.
    pub fn record_table<'a>(&mut self, db: &str, table: &str, columns: impl IntoIterator<Item = &'a str>) {
        let columns = columns.into_iter().map(fold).collect();
        self.tables.insert(
            table_key(db, table),
            SimulatedTable {
                columns,
                complete: true,
            },
        );
    }

    /// Record a column added to a table. Unknown tables are created.
    pub fn record_column(&mut self, db: &str, table: &str, column: &str) {
        self.tables
            .entry(table_key(db, table))
            .or_insert_with(|| SimulatedTable {
                columns: HashSet::new(),
                complete: true,
            })
            .columns
            .insert(fold(column));
    }

    /// Record `to` as a copy of `from` (CREATE TABLE ... LIKE).
    ///
    /// When `from` is simulated its columns are copied. Otherwise `to` is
    /// recorded with an unknown column set and `false` is returned.
    pub fn copy_table(&mut self, from_db: &str, from: &str, to_db: &str, to: &str) -> bool {
        let source = self.tables.get(&table_key(from_db, from)).cloned();
        let known = source.is_some();
        let copy = source.unwrap_or_default();
        self.tables.insert(table_key(to_db, to), copy);
        known
    }

    pub fn has_database(&self, db: &str) -> bool {
        self.databases.contains(&fold(db))
    }

    pub fn has_table(&self, db: &str, table: &str) -> bool {
        self.tables.contains_key(&table_key(db, table))
    }

    /// Whether `column` is known to be recorded on a simulated table.
    pub fn has_column(&self, db: &str, table: &str, column: &str) -> bool {
        self.tables
            .get(&table_key(db, table))
            .is_some_and(|t| t.columns.contains(&fold(column)))
    }

    /// Column lookup on a simulated table. `None` when the table is not
    /// simulated, or when its column set is unknown and the column was not
    /// recorded.
    pub fn column_exists(&self, db: &str, table: &str, column: &str) -> Option<bool> {
        let t = self.tables.get(&table_key(db, table))?;
        if t.columns.contains(&fold(column)) {
            Some(true)
        } else if t.complete {
            Some(false)
        } else {
            None
        }
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}
