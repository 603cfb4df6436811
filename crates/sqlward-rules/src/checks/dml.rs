//! INSERT, UPDATE, DELETE and SELECT rules.

use super::check_in_lists;
use crate::context::AuditContext;
use sqlward_core::{RuleLevel, RuleSettings, StatementRecord};
use sqlward_sql::{ColumnRef, Delete, Insert, Predicate, Select, TableRef, Update};
use std::collections::HashSet;

/// Whether the target table exists; reports when it definitely does not.
async fn require_table(
    ctx: &mut AuditContext<'_>,
    db: &str,
    table: &str,
    record: &mut StatementRecord,
) -> Option<bool> {
    let exists = ctx.table_exists(db, table).await;
    if exists == Some(false) {
        record.append_error(format!("Table '{db}.{table}' does not exist on remote server."));
    }
    exists
}

async fn check_columns_exist<'c>(
    level: RuleLevel,
    ctx: &mut AuditContext<'_>,
    db: &str,
    table: &str,
    columns: impl IntoIterator<Item = &'c str>,
    record: &mut StatementRecord,
) {
    if level.is_off() {
        return;
    }
    for column in columns {
        if ctx.column_exists(db, table, column).await == Some(false) {
            record.report(
                level,
                format!("Column '{column}' does not exist in '{db}.{table}'."),
            );
        }
    }
}

pub(crate) async fn check_insert(
    rules: &RuleSettings,
    insert: &Insert,
    ctx: &mut AuditContext<'_>,
    record: &mut StatementRecord,
) {
    let levels = &rules.levels;
    let db = insert.table.db_or(ctx.ambient_db).to_string();
    let table = insert.table.name.as_str();
    let exists = require_table(ctx, &db, table, record).await;

    if insert.columns.is_empty() {
        record.report(
            levels.check_insert_column,
            "INSERT/REPLACE should specify an explicit column list.",
        );
    } else if let Some(values) = insert
        .row_lengths
        .iter()
        .find(|len| **len != insert.columns.len())
    {
        record.report(
            levels.check_insert_values_match,
            format!(
                "INSERT column count {} does not match value count {values}.",
                insert.columns.len()
            ),
        );
    }

    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for column in &insert.columns {
        let folded = column.to_ascii_lowercase();
        if !seen.insert(folded.clone()) && reported.insert(folded) {
            record.report(
                levels.check_insert_duplicate_column,
                format!("Duplicate column '{column}' in INSERT column list."),
            );
        }
    }

    if let Some(select) = &insert.select {
        if select.predicate.is_none() {
            record.report(
                levels.check_dml_where,
                "INSERT ... SELECT without a WHERE clause on the SELECT.",
            );
        }
        check_in_lists(rules, select.predicate.as_ref(), record);
    }

    if exists == Some(true) {
        check_columns_exist(
            levels.check_column_exists,
            ctx,
            &db,
            table,
            insert.columns.iter().map(String::as_str),
            record,
        )
        .await;
    }
}

/// The shared shape of UPDATE and DELETE.
struct Modification<'s> {
    verb: &'static str,
    tables: &'s [TableRef],
    predicate: Option<&'s Predicate>,
    has_limit: bool,
    has_order_by: bool,
}

/// Checks UPDATE and DELETE share. Returns the target table's database and
/// whether it is known to exist.
async fn check_modification(
    rules: &RuleSettings,
    m: &Modification<'_>,
    sql: &str,
    ctx: &mut AuditContext<'_>,
    record: &mut StatementRecord,
) -> Option<(String, bool)> {
    let levels = &rules.levels;
    let verb = m.verb;
    let target = m.tables.first()?;
    let db = target.db_or(ctx.ambient_db).to_string();
    let table = target.name.as_str();
    let exists = require_table(ctx, &db, table, record).await;

    if m.predicate.is_none() {
        record.report(
            levels.check_dml_where,
            format!("{verb} without a WHERE clause is not allowed."),
        );
    }
    if m.has_limit {
        record.report(
            levels.check_dml_limit,
            format!("{verb} with LIMIT is not recommended."),
        );
    }
    if m.has_order_by {
        record.report(
            levels.check_orderby_in_dml,
            format!("{verb} with ORDER BY is not recommended."),
        );
    }
    check_in_lists(rules, m.predicate, record);

    // Tables created in this session are empty on the target.
    let simulated = ctx.simulator.has_table(&db, table);
    if exists == Some(true) && !simulated {
        if let Some(rows) = ctx.estimate_rows(&db, table, sql).await {
            record.affected_rows = rows;
            let max = rules.limits.max_update_rows;
            if max > 0 && rows > max as i64 {
                record.append_warning(format!(
                    "Table '{db}.{table}' has approximately {rows} rows, exceeds max {max}. Consider batching the {verb}."
                ));
            }
        }
    }
    Some((db, exists == Some(true)))
}

pub(crate) async fn check_update(
    rules: &RuleSettings,
    update: &Update,
    sql: &str,
    ctx: &mut AuditContext<'_>,
    record: &mut StatementRecord,
) {
    let m = Modification {
        verb: "UPDATE",
        tables: &update.tables,
        predicate: update.predicate.as_ref(),
        has_limit: update.has_limit,
        has_order_by: update.has_order_by,
    };
    let Some((db, true)) = check_modification(rules, &m, sql, ctx, record).await else {
        return;
    };
    let target = &update.tables[0];
    let assigned: Vec<&str> = update
        .assignments
        .iter()
        .filter(|c| targets(c, target, update.tables.len()))
        .map(|c| c.name.as_str())
        .collect();
    check_columns_exist(
        rules.levels.check_column_exists,
        ctx,
        &db,
        &target.name,
        assigned,
        record,
    )
    .await;
}

/// Whether an assignment column belongs to `target`.
fn targets(column: &ColumnRef, target: &TableRef, table_count: usize) -> bool {
    match &column.qualifier {
        Some(qualifier) => target.answers_to(qualifier),
        None => table_count == 1,
    }
}

pub(crate) async fn check_delete(
    rules: &RuleSettings,
    delete: &Delete,
    sql: &str,
    ctx: &mut AuditContext<'_>,
    record: &mut StatementRecord,
) {
    record.report(
        rules.levels.check_delete,
        "DELETE statement is restricted by audit policy.",
    );
    let m = Modification {
        verb: "DELETE",
        tables: &delete.tables,
        predicate: delete.predicate.as_ref(),
        has_limit: delete.has_limit,
        has_order_by: delete.has_order_by,
    };
    check_modification(rules, &m, sql, ctx, record).await;
}

pub(crate) fn check_select(rules: &RuleSettings, select: &Select, record: &mut StatementRecord) {
    if select.star {
        record.report(
            rules.levels.check_select_star,
            "SELECT * is not recommended; specify columns.",
        );
    }
    if select.order_by_rand {
        record.report(
            rules.levels.check_orderby_rand,
            "ORDER BY RAND() is not recommended; causes full table scan.",
        );
    }
    check_in_lists(rules, select.predicate.as_ref(), record);
}
