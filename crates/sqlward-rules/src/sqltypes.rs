//! Statement kinds the gateway recognizes and whether rules exist for them.

use serde::Serialize;
use sqlward_core::SqlKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlTypeEntry {
    /// `KIND` or `ALTER_TABLE.SUB`.
    pub sql_type: String,
    pub description: &'static str,
    pub audited: bool,
}

const KINDS: &[(SqlKind, &str, bool)] = &[
    (SqlKind::CreateTable, "Create a new table", true),
    (SqlKind::AlterTable, "Alter table structure", true),
    (SqlKind::DropTable, "Drop a table", true),
    (SqlKind::RenameTable, "Rename a table", true),
    (SqlKind::Truncate, "Truncate a table", true),
    (SqlKind::CreateIndex, "Create an index", true),
    (SqlKind::DropIndex, "Drop an index", true),
    (SqlKind::CreateDatabase, "Create a new database", true),
    (SqlKind::DropDatabase, "Drop a database", true),
    (SqlKind::AlterDatabase, "Alter database attributes", false),
    (SqlKind::UseDatabase, "Switch current database (USE)", true),
    (SqlKind::Insert, "Insert rows", true),
    (SqlKind::InsertSelect, "Insert rows from SELECT", true),
    (SqlKind::Replace, "Replace rows", true),
    (SqlKind::ReplaceSelect, "Replace rows from SELECT", true),
    (SqlKind::Update, "Update rows", true),
    (SqlKind::Delete, "Delete rows", true),
    (SqlKind::Select, "Select query", true),
    (SqlKind::Set, "Set session/global variable", false),
    (SqlKind::CreateView, "Create a view", false),
    (SqlKind::DropView, "Drop a view", false),
    (SqlKind::CreateTrigger, "Create a trigger", false),
    (SqlKind::DropTrigger, "Drop a trigger", false),
    (SqlKind::CreateUser, "Create a user account", false),
    (SqlKind::DropUser, "Drop a user account", false),
    (SqlKind::Grant, "Grant privileges", false),
    (SqlKind::Revoke, "Revoke privileges", false),
    (SqlKind::LockTables, "Lock tables", false),
    (SqlKind::UnlockTables, "Unlock tables", false),
];

const ALTER_SUB_TYPES: &[(&str, &str, bool)] = &[
    ("ADD_COLUMN", "Add new column(s)", true),
    ("DROP_COLUMN", "Drop column(s)", true),
    ("MODIFY_COLUMN", "Modify/change column definition", true),
    ("CHANGE_DEFAULT", "Change column default value", false),
    ("COLUMN_ORDER", "Reorder columns (FIRST/AFTER)", false),
    ("ADD_INDEX", "Add new index", true),
    ("DROP_INDEX", "Drop index", true),
    ("RENAME_INDEX", "Rename index", false),
    ("RENAME", "Rename table", true),
    ("OPTIONS", "Change table options (ENGINE, COMMENT, etc.)", true),
    ("ADD_PARTITION", "Add partition", false),
    ("DROP_PARTITION", "Drop partition", false),
    ("OTHER", "Other table changes", false),
];

/// Every kind, with the ALTER TABLE sub-operations listed right after
/// `ALTER_TABLE`.
pub fn sql_types() -> Vec<SqlTypeEntry> {
    let mut entries = Vec::new();
    for &(kind, description, audited) in KINDS {
        entries.push(SqlTypeEntry {
            sql_type: kind.as_str().to_string(),
            description,
            audited,
        });
        if kind == SqlKind::AlterTable {
            entries.extend(ALTER_SUB_TYPES.iter().map(|&(sub, description, audited)| {
                SqlTypeEntry {
                    sql_type: format!("ALTER_TABLE.{sub}"),
                    description,
                    audited,
                }
            }));
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alter_sub_types_follow_alter_table() {
        let entries = sql_types();
        let alter = entries
            .iter()
            .position(|e| e.sql_type == "ALTER_TABLE")
            .unwrap();
        assert_eq!(entries[alter + 1].sql_type, "ALTER_TABLE.ADD_COLUMN");
        assert!(entries.iter().any(|e| e.sql_type == "UNLOCK_TABLES" && !e.audited));
    }
}
