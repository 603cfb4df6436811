//! Query-tree extraction: which tables and columns a statement touches, and how.

use crate::model::{AlterOp, ColumnRef, ParsedStatement, Select, StatementBody, TableRef};
use serde_json::{Value, json};

/// Build the JSON description of `stmt`.
///
/// ```json
/// {"sql_type": "SELECT",
///  "tables": [{"db": "shop", "table": "users", "usage": "select"}],
///  "columns": [{"db": "shop", "table": "users", "column": "id", "usage": "where"}]}
/// ```
///
/// Unqualified tables take `ambient_db`. Column qualifiers are resolved
/// through table aliases; an unqualified column is attributed to the only
/// table in scope, or left with an empty table name when there are several.
pub fn query_tree(stmt: &ParsedStatement, ambient_db: &str) -> Value {
    let mut tree = TreeBuilder::new(ambient_db);

    match &stmt.body {
        StatementBody::CreateTable(create) => {
            tree.table(&create.table, "create");
            for column in &create.columns {
                tree.column_of(&create.table, &column.name, "create");
            }
            if let Some(like) = &create.like {
                tree.table(like, "select");
            }
        }
        StatementBody::AlterTable(alter) => {
            tree.table(&alter.table, "alter");
            for op in &alter.ops {
                match op {
                    AlterOp::AddColumn(column) | AlterOp::ModifyColumn { column, .. } => {
                        tree.column_of(&alter.table, &column.name, "alter")
                    }
                    AlterOp::DropColumn(name)
                    | AlterOp::ChangeDefault(name)
                    | AlterOp::ColumnOrder(name) => tree.column_of(&alter.table, name, "alter"),
                    AlterOp::AddIndex(index) => {
                        for part in &index.parts {
                            tree.column_of(&alter.table, &part.column, "alter");
                        }
                    }
                    AlterOp::RenameTable(to) => tree.table(to, "create"),
                    _ => {}
                }
            }
        }
        StatementBody::DropTable { tables } => {
            for table in tables {
                tree.table(table, "drop");
            }
        }
        StatementBody::Truncate { table } => tree.table(table, "drop"),
        StatementBody::Insert(insert) => {
            tree.table(&insert.table, "insert");
            for column in &insert.columns {
                tree.column_of(&insert.table, column, "insert");
            }
            if let Some(select) = &insert.select {
                tree.select(select);
            }
        }
        StatementBody::Update(update) => {
            tree.scope = update.tables.clone();
            for table in &update.tables {
                tree.table(table, "update");
            }
            for column in &update.assignments {
                tree.column(column, "update");
            }
            if let Some(predicate) = &update.predicate {
                tree.columns(&predicate.columns(), "where");
            }
        }
        StatementBody::Delete(delete) => {
            tree.scope = delete.tables.clone();
            for table in &delete.tables {
                tree.table(table, "delete");
            }
            if let Some(predicate) = &delete.predicate {
                tree.columns(&predicate.columns(), "where");
            }
        }
        StatementBody::Select(select) => tree.select(select),
        StatementBody::Other { tables } => {
            for table in tables {
                tree.table(table, "select");
            }
        }
        StatementBody::CreateDatabase { .. }
        | StatementBody::DropDatabase { .. }
        | StatementBody::Use { .. }
        | StatementBody::Set => {}
    }

    json!({
        "sql_type": stmt.kind.as_str(),
        "tables": tree.tables,
        "columns": tree.columns,
    })
}

struct TreeBuilder<'a> {
    ambient_db: &'a str,
    scope: Vec<TableRef>,
    tables: Vec<Value>,
    columns: Vec<Value>,
}

impl<'a> TreeBuilder<'a> {
    fn new(ambient_db: &'a str) -> Self {
        Self {
            ambient_db,
            scope: Vec::new(),
            tables: Vec::new(),
            columns: Vec::new(),
        }
    }

    fn table(&mut self, table: &TableRef, usage: &str) {
        let entry = json!({
            "db": table.db_or(self.ambient_db),
            "table": table.name,
            "usage": usage,
        });
        if !self.tables.contains(&entry) {
            self.tables.push(entry);
        }
    }

    fn column_of(&mut self, table: &TableRef, column: &str, usage: &str) {
        let entry = json!({
            "db": table.db_or(self.ambient_db),
            "table": table.name,
            "column": column,
            "usage": usage,
        });
        if !self.columns.contains(&entry) {
            self.columns.push(entry);
        }
    }

    fn column(&mut self, column: &ColumnRef, usage: &str) {
        let owner = match &column.qualifier {
            Some(qualifier) => self
                .scope
                .iter()
                .find(|t| t.answers_to(qualifier))
                .cloned()
                .unwrap_or_else(|| TableRef::new(None, qualifier.as_str())),
            None if self.scope.len() == 1 => self.scope[0].clone(),
            None => TableRef::new(None, ""),
        };
        self.column_of(&owner, &column.name, usage);
    }

    fn columns(&mut self, columns: &[ColumnRef], usage: &str) {
        for column in columns {
            self.column(column, usage);
        }
    }

    fn select(&mut self, select: &Select) {
        let outer = std::mem::replace(&mut self.scope, select.tables.clone());
        for table in &select.tables {
            self.table(table, "select");
        }
        self.columns(&select.columns, "select");
        if let Some(predicate) = &select.predicate {
            self.columns(&predicate.columns(), "where");
        }
        self.columns(&select.join_columns, "join");
        self.columns(&select.group_by, "group_by");
        self.columns(&select.order_by, "order_by");
        self.scope = outer;
    }
}
