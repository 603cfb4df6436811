//! CREATE/DROP for tables and databases, and TRUNCATE.

use super::column::check_column;
use super::index::{check_index_length, check_index_shape, display_name};
use super::must_have::check_must_have_columns;
use super::{disallowed_charset, exceeds, is_identifier};
use crate::context::AuditContext;
use crate::keywords::is_reserved;
use sqlward_core::{RuleSettings, StatementRecord};
use sqlward_sql::{CreateTable, IndexDef, IndexKind, TableRef};

pub(crate) async fn check_create_table(
    rules: &RuleSettings,
    create: &CreateTable,
    ctx: &mut AuditContext<'_>,
    record: &mut StatementRecord,
) {
    let levels = &rules.levels;
    let limits = &rules.limits;
    let db = create.table.db_or(ctx.ambient_db).to_string();
    let table = create.table.name.as_str();

    if !create.if_not_exists {
        if ctx.simulator.has_table(&db, table) {
            record.append_error(format!(
                "Table '{db}.{table}' already exists (created earlier in this batch)."
            ));
        } else if ctx.remote_table_exists(&db, table).await == Some(true) {
            record.append_error(format!("Table '{db}.{table}' already exists on remote server."));
        }
    }

    // LIKE copies a structure that has already passed review. The copy is
    // recorded even when the source only exists on the target.
    if let Some(like) = &create.like {
        let like_db = like.db_or(ctx.ambient_db);
        ctx.simulator.copy_table(like_db, &like.name, &db, table);
        return;
    }

    if create.primary_key().is_none() {
        record.report(levels.check_primary_key, "Table must have a PRIMARY KEY.");
    }
    if create.comment.as_deref().is_none_or(str::is_empty) {
        record.report(levels.check_table_comment, "Table must have a comment.");
    }
    if let Some(engine) = create.engine.as_deref() {
        if !engine.eq_ignore_ascii_case("InnoDB") {
            record.report(
                levels.check_engine_innodb,
                format!("Table engine must be InnoDB (found '{engine}')."),
            );
        }
    }
    if let Some(charset) = disallowed_charset(rules, create.charset.as_deref()) {
        record.append_error(format!(
            "Table charset '{charset}' is not in allowed list '{}'.",
            rules.support_charset
        ));
    }
    if create.from_select {
        record.report(levels.check_create_select, "CREATE TABLE ... SELECT is not allowed.");
    }
    if exceeds(table.len(), limits.max_table_name_length) {
        record.append_warning(format!(
            "Table name '{table}' length {} exceeds max {}.",
            table.len(),
            limits.max_table_name_length
        ));
    }
    if !is_identifier(table) {
        record.report(
            levels.check_identifier,
            format!("Table name '{table}' should be lowercase letters, digits and underscores."),
        );
    }
    if is_reserved(table) {
        record.report(
            levels.check_identifier_keyword,
            format!("Table name '{table}' is a MySQL reserved keyword."),
        );
    }
    if exceeds(create.columns.len(), limits.max_columns) {
        record.append_warning(format!(
            "Table has {} columns, exceeds max {}.",
            create.columns.len(),
            limits.max_columns
        ));
    }

    for column in &create.columns {
        check_column(rules, ctx.db_type, ctx.db_version, column, record);
    }

    let secondary: Vec<&IndexDef> = create
        .indexes
        .iter()
        .filter(|i| !matches!(i.kind, IndexKind::Primary | IndexKind::Foreign))
        .collect();
    if exceeds(secondary.len(), limits.max_indexes) {
        record.append_warning(format!(
            "Table has {} indexes, exceeds max {}.",
            secondary.len(),
            limits.max_indexes
        ));
    }

    for index in &create.indexes {
        check_index_shape(rules, ctx.db_type, index, record);
        let types: Vec<_> = index
            .parts
            .iter()
            .map(|part| create.column(&part.column).map(|c| c.ty.clone()))
            .collect();
        check_index_length(rules, index, &types, record);
    }

    if let Some(pk) = create.primary_key() {
        if exceeds(pk.parts.len(), limits.max_primary_key_parts) {
            record.append_warning(format!(
                "PRIMARY KEY has {} columns, exceeds max {}.",
                pk.parts.len(),
                limits.max_primary_key_parts
            ));
        }
    }

    for (shorter, longer) in redundant_indexes(&secondary) {
        record.report(
            levels.check_duplicate_index,
            format!(
                "Index '{}' is a prefix of '{}' and may be redundant.",
                display_name(shorter),
                display_name(longer)
            ),
        );
    }

    if create.partitioned {
        record.report(levels.check_partition, "Partitioned tables are not recommended.");
    }

    check_must_have_columns(
        levels.check_must_have_columns,
        &rules.must_have_columns,
        create,
        record,
    );

    if let Some(init) = create.auto_increment.filter(|v| *v > 1) {
        record.report(
            levels.check_autoincrement_init_value,
            format!("AUTO_INCREMENT initial value is {init}, should be 1."),
        );
    }

    ctx.simulator
        .record_table(&db, table, create.columns.iter().map(|c| c.name.as_str()));
}

/// Pairs where the first index's columns are a leading prefix of the
/// second's. Identical indexes are reported once.
fn redundant_indexes<'i>(indexes: &[&'i IndexDef]) -> Vec<(&'i IndexDef, &'i IndexDef)> {
    let keys: Vec<Vec<String>> = indexes.iter().map(|i| i.column_key()).collect();
    let mut pairs = Vec::new();
    for (i, short) in keys.iter().enumerate() {
        for (j, long) in keys.iter().enumerate() {
            if i == j || short.is_empty() || !long.starts_with(short) {
                continue;
            }
            if short.len() < long.len() || i > j {
                pairs.push((indexes[i], indexes[j]));
            }
        }
    }
    pairs
}

pub(crate) async fn check_create_database(
    rules: &RuleSettings,
    name: &str,
    charset: Option<&str>,
    ctx: &mut AuditContext<'_>,
    record: &mut StatementRecord,
) {
    if ctx.remote_database_exists(name).await == Some(true) {
        record.append_error(format!("Database '{name}' already exists on remote server."));
    }
    if !is_identifier(name) {
        record.report(
            rules.levels.check_identifier,
            format!("Database name '{name}' should be lowercase letters, digits and underscores."),
        );
    }
    let max = rules.limits.max_table_name_length;
    if exceeds(name.len(), max) {
        record.append_warning(format!(
            "Database name '{name}' length {} exceeds max {max}.",
            name.len()
        ));
    }
    if let Some(charset) = disallowed_charset(rules, charset) {
        record.append_error(format!(
            "Database charset '{charset}' is not in allowed list '{}'.",
            rules.support_charset
        ));
    }
    ctx.simulator.record_database(name);
}

pub(crate) async fn check_drop_database(
    rules: &RuleSettings,
    name: &str,
    ctx: &mut AuditContext<'_>,
    record: &mut StatementRecord,
) {
    record.report(
        rules.levels.check_drop_database,
        format!("DROP DATABASE will permanently remove database '{name}'."),
    );
    if !ctx.simulator.has_database(name) && ctx.remote_database_exists(name).await == Some(false) {
        record.append_warning(format!("Database '{name}' does not exist on remote server."));
    }
}

pub(crate) fn check_drop_table(rules: &RuleSettings, record: &mut StatementRecord) {
    record.report(
        rules.levels.check_drop_table,
        "DROP TABLE will permanently remove the table.",
    );
}

pub(crate) async fn check_truncate(
    rules: &RuleSettings,
    table: &TableRef,
    ctx: &mut AuditContext<'_>,
    record: &mut StatementRecord,
) {
    let db = table.db_or(ctx.ambient_db).to_string();
    let name = table.name.as_str();
    record.report(
        rules.levels.check_truncate_table,
        format!("TRUNCATE TABLE will remove all data from '{db}.{name}'."),
    );
    if ctx.simulator.has_table(&db, name) {
        return;
    }
    match ctx.remote_table_exists(&db, name).await {
        Some(false) => {
            record.append_error(format!("Table '{db}.{name}' does not exist on remote server."))
        }
        Some(true) => {
            if let Some(rows) = ctx.table_rows(&db, name).await {
                record.affected_rows = rows;
            }
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlward_sql::IndexPart;

    fn index(name: &str, columns: &[&str]) -> IndexDef {
        IndexDef {
            name: Some(name.to_string()),
            kind: IndexKind::Normal,
            parts: columns.iter().map(|c| IndexPart::new(*c)).collect(),
        }
    }

    #[test]
    fn test_redundant_index_pairs() {
        let a = index("idx_a", &["a"]);
        let ab = index("idx_ab", &["a", "b"]);
        let ab2 = index("idx_ab2", &["A", "B"]);
        let b = index("idx_b", &["b"]);
        let pairs = redundant_indexes(&[&a, &ab, &ab2, &b]);
        let names: Vec<_> = pairs
            .iter()
            .map(|(s, l)| (display_name(s), display_name(l)))
            .collect();
        assert_eq!(
            names,
            vec![
                ("idx_a", "idx_ab"),
                ("idx_a", "idx_ab2"),
                ("idx_ab2", "idx_ab"),
            ]
        );
    }
}
