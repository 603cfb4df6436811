//! ALTER TABLE rules, including type-narrowing detection.

use super::column::check_column;
use super::index::{check_index_length, check_index_shape, display_name};
use crate::catalog::RemoteColumn;
use crate::context::AuditContext;
use crate::cost::predict_cost;
use sqlward_core::{RuleSettings, StatementRecord};
use sqlward_sql::{AlterOp, AlterTable, ColumnDef, ColumnType, IndexDef};

pub(crate) async fn check_alter_table(
    rules: &RuleSettings,
    alter: &AlterTable,
    ctx: &mut AuditContext<'_>,
    record: &mut StatementRecord,
) {
    let levels = &rules.levels;
    let db = alter.table.db_or(ctx.ambient_db).to_string();
    let table = alter.table.name.as_str();

    record.sub_type = Some(alter.sub_type());

    let simulated = ctx.simulator.has_table(&db, table);
    // Remote per-operation lookups only make sense when the table exists.
    let mut remote = false;
    if !simulated {
        match ctx.remote_table_exists(&db, table).await {
            Some(false) => record.append_error(format!(
                "Table '{db}.{table}' does not exist on remote server."
            )),
            Some(true) => {
                remote = true;
                if let Some(rows) = ctx.table_rows(&db, table).await {
                    record.affected_rows = rows;
                }
            }
            None => {}
        }
    }

    for op in &alter.ops {
        match op {
            AlterOp::AddColumn(column) => {
                check_column(rules, ctx.db_type, ctx.db_version, column, record);
                let name = column.name.as_str();
                if simulated {
                    if ctx.simulator.has_column(&db, table, name) {
                        record.append_error(format!(
                            "Column '{name}' already exists in '{db}.{table}'."
                        ));
                    } else {
                        ctx.simulator.record_column(&db, table, name);
                    }
                } else if remote && ctx.column_exists(&db, table, name).await == Some(true) {
                    record.append_error(format!(
                        "Column '{name}' already exists in '{db}.{table}' on remote server."
                    ));
                }
            }
            AlterOp::DropColumn(name) => {
                record.append_warning(format!("Dropping column '{name}' is a high-risk operation."));
                check_column_present(ctx, &db, table, name, simulated, remote, record).await;
            }
            AlterOp::ModifyColumn { old_name, column } => {
                check_column(rules, ctx.db_type, ctx.db_version, column, record);
                check_column_present(ctx, &db, table, old_name, simulated, remote, record).await;
                if remote {
                    if let Some(existing) = ctx.column_info(&db, table, old_name).await {
                        check_narrowing(rules, ctx.is_tidb(), &existing, column, record);
                    }
                }
            }
            AlterOp::AddIndex(index) => {
                check_index_shape(rules, ctx.db_type, index, record);
                let types = index_part_types(alter, index, ctx, &db, table, remote).await;
                check_index_length(rules, index, &types, record);
            }
            AlterOp::DropIndex(name) => {
                if remote && ctx.index_exists(&db, table, name).await == Some(false) {
                    record.append_error(format!(
                        "Index '{name}' does not exist in '{db}.{table}' on remote server."
                    ));
                }
            }
            AlterOp::RenameTable(_) => {
                record.append_warning(format!(
                    "Renaming table '{db}.{table}' is a high-risk operation."
                ));
            }
            AlterOp::Options {
                engine: Some(engine),
            } if !engine.eq_ignore_ascii_case("InnoDB") => {
                record.report(
                    levels.check_engine_innodb,
                    format!("Changing engine to '{engine}' is not allowed; must use InnoDB."),
                );
            }
            _ => {}
        }
    }

    let key = format!("{}.{}", db.to_ascii_lowercase(), table.to_ascii_lowercase());
    if !ctx.altered_tables.insert(key) {
        record.report(
            levels.check_merge_alter_table,
            format!(
                "Table '{db}.{table}' has been altered before in this session; consider merging into a single ALTER TABLE statement."
            ),
        );
    }

    if ctx.is_tidb() && needs_tidb_split(alter) {
        record.report(
            levels.check_tidb_merge_alter,
            "TiDB does not support multiple operations in a single ALTER TABLE; split into separate statements.",
        );
    }

    record.cost = Some(predict_cost(alter, ctx.db_version));
}

async fn check_column_present(
    ctx: &mut AuditContext<'_>,
    db: &str,
    table: &str,
    column: &str,
    simulated: bool,
    remote: bool,
    record: &mut StatementRecord,
) {
    if simulated {
        if ctx.simulator.column_exists(db, table, column) == Some(false) {
            record.append_error(format!("Column '{column}' does not exist in '{db}.{table}'."));
        }
    } else if remote && ctx.column_exists(db, table, column).await == Some(false) {
        record.append_error(format!(
            "Column '{column}' does not exist in '{db}.{table}' on remote server."
        ));
    }
}

/// Resolve each index part: columns added by the same ALTER first, then
/// the target's catalog.
async fn index_part_types(
    alter: &AlterTable,
    index: &IndexDef,
    ctx: &mut AuditContext<'_>,
    db: &str,
    table: &str,
    remote: bool,
) -> Vec<Option<ColumnType>> {
    let mut types = Vec::with_capacity(index.parts.len());
    for part in &index.parts {
        let added = alter.ops.iter().find_map(|op| match op {
            AlterOp::AddColumn(c) | AlterOp::ModifyColumn { column: c, .. }
                if c.name.eq_ignore_ascii_case(&part.column) =>
            {
                Some(c.ty.clone())
            }
            _ => None,
        });
        let ty = match added {
            Some(ty) => Some(ty),
            None if remote => ctx
                .column_info(db, table, &part.column)
                .await
                .map(|c| c.column_type()),
            None => None,
        };
        if ty.is_none() {
            tracing::debug!(index = display_name(index), column = %part.column, "Index column type unknown");
        }
        types.push(ty);
    }
    types
}

/// Operation categories for the TiDB single-operation rule.
fn category(op: &AlterOp) -> Option<&'static str> {
    Some(match op {
        AlterOp::AddColumn(_) => "add_column",
        AlterOp::DropColumn(_) => "drop_column",
        AlterOp::ModifyColumn { .. } => "modify_column",
        AlterOp::AddIndex(_) => "add_index",
        AlterOp::DropIndex(_) => "drop_index",
        AlterOp::RenameTable(_) => "rename",
        AlterOp::Options { .. } => "options",
        _ => return None,
    })
}

fn needs_tidb_split(alter: &AlterTable) -> bool {
    let mut categories: Vec<&str> = alter.ops.iter().filter_map(category).collect();
    let added = categories.iter().filter(|c| **c == "add_column").count();
    categories.sort_unstable();
    categories.dedup();
    categories.len() > 1 || added > 1
}

fn is_string(ty: &ColumnType) -> bool {
    matches!(ty, ColumnType::Char(_) | ColumnType::Varchar(_))
}

/// Compare a MODIFY/CHANGE definition with the column as it exists now.
fn check_narrowing(
    rules: &RuleSettings,
    tidb: bool,
    existing: &RemoteColumn,
    column: &ColumnDef,
    record: &mut StatementRecord,
) {
    let levels = &rules.levels;
    let name = column.name.as_str();
    let old = existing.column_type();
    let new = &column.ty;

    match (&old, new) {
        (ColumnType::Decimal { .. }, ColumnType::Decimal { .. }) => {
            if old != *new {
                record.report(
                    levels.check_decimal_change,
                    format!("Column '{name}' DECIMAL precision/scale changed."),
                );
                if tidb {
                    record.report(
                        levels.check_tidb_decimal_change,
                        format!("TiDB does not support changing DECIMAL precision/scale for column '{name}'."),
                    );
                }
            }
        }
        (old_ty, new_ty) if is_string(old_ty) && is_string(new_ty) => {
            let (Some(old_len), Some(new_len)) = (old_ty.char_length(), new_ty.char_length())
            else {
                return;
            };
            if new_len < old_len {
                record.report(
                    levels.check_varchar_shrink,
                    format!("Column '{name}' length reduced: {old_len} -> {new_len}, may truncate data."),
                );
                if tidb {
                    record.report(
                        levels.check_tidb_varchar_shrink,
                        format!("TiDB does not support shrinking VARCHAR length: '{name}' {old_len} -> {new_len}."),
                    );
                }
            }
        }
        (old_ty, new_ty) if is_lossy(old_ty, new_ty) => {
            let (from, to) = (old_ty.name(), new_ty.name());
            record.report(
                levels.check_lossy_type_change,
                format!("Column '{name}' type narrowing: {from} -> {to}, may truncate data."),
            );
            if tidb {
                record.report(
                    levels.check_tidb_lossy_type_change,
                    format!("TiDB does not support lossy type change: '{name}' {from} -> {to}."),
                );
            }
        }
        _ => {}
    }
}

fn is_lossy(old: &ColumnType, new: &ColumnType) -> bool {
    match (old, new) {
        (ColumnType::Integer(from), ColumnType::Integer(to)) => to < from,
        (ColumnType::Double, ColumnType::Float) => true,
        (ColumnType::DateTime | ColumnType::Timestamp, ColumnType::Date) => true,
        (ColumnType::Text, to) => is_string(to),
        (from, to) if is_string(from) => !is_string(to) && !matches!(to, ColumnType::Text),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlward_core::{RuleLevel, Severity, SqlKind};
    use sqlward_sql::TableRef;

    fn remote(data_type: &str, len: Option<i64>) -> RemoteColumn {
        RemoteColumn {
            data_type: data_type.into(),
            char_max_length: len,
            numeric_precision: None,
            numeric_scale: None,
        }
    }

    #[test]
    fn test_integer_narrowing_on_tidb() {
        let rules = RuleSettings::default();
        let mut record = StatementRecord::new(1, "", SqlKind::AlterTable);
        check_narrowing(&rules, true, &remote("bigint", None), &ColumnDef::new("n", "INT"), &mut record);
        assert_eq!(
            record.findings(),
            [
                "Column 'n' type narrowing: BIGINT -> INT, may truncate data.",
                "TiDB does not support lossy type change: 'n' BIGINT -> INT.",
            ]
        );
        assert_eq!(record.severity(), Severity::Error);
    }

    #[test]
    fn test_varchar_shrink_and_widen() {
        let rules = RuleSettings::default();
        let mut record = StatementRecord::new(1, "", SqlKind::AlterTable);
        check_narrowing(&rules, false, &remote("varchar", Some(200)), &ColumnDef::new("s", "VARCHAR(100)"), &mut record);
        assert_eq!(
            record.findings(),
            ["Column 's' length reduced: 200 -> 100, may truncate data."]
        );

        let mut record = StatementRecord::new(1, "", SqlKind::AlterTable);
        check_narrowing(&rules, false, &remote("varchar", Some(200)), &ColumnDef::new("s", "VARCHAR(255)"), &mut record);
        assert!(record.findings().is_empty());
    }

    #[test]
    fn test_decimal_change_is_opt_in() {
        let mut rules = RuleSettings::default();
        let existing = RemoteColumn {
            data_type: "decimal".into(),
            char_max_length: None,
            numeric_precision: Some(10),
            numeric_scale: Some(2),
        };
        let column = ColumnDef::new("d", "DECIMAL(12,4)");
        let mut record = StatementRecord::new(1, "", SqlKind::AlterTable);
        check_narrowing(&rules, false, &existing, &column, &mut record);
        assert!(record.findings().is_empty());

        rules.levels.check_decimal_change = RuleLevel::Warning;
        check_narrowing(&rules, false, &existing, &column, &mut record);
        assert_eq!(record.findings(), ["Column 'd' DECIMAL precision/scale changed."]);
    }

    #[test]
    fn test_tidb_split_rule() {
        let add = |n: &str| AlterOp::AddColumn(ColumnDef::new(n, "INT"));
        let alter = |ops| AlterTable {
            table: TableRef::new(None, "t"),
            ops,
        };
        assert!(!needs_tidb_split(&alter(vec![add("a")])));
        assert!(needs_tidb_split(&alter(vec![add("a"), add("b")])));
        assert!(needs_tidb_split(&alter(vec![add("a"), AlterOp::DropIndex("idx_x".into())])));
        assert!(!needs_tidb_split(&alter(vec![
            AlterOp::DropIndex("idx_x".into()),
            AlterOp::DropIndex("idx_y".into()),
        ])));
    }
}
