//! Index definition rules.

use super::exceeds;
use sqlward_core::{DbType, RuleSettings, StatementRecord};
use sqlward_sql::{ColumnType, IndexDef, IndexKind};

/// utf8mb4 worst case.
const BYTES_PER_CHAR: u64 = 4;

pub(crate) fn display_name(index: &IndexDef) -> &str {
    index.name.as_deref().unwrap_or("(unnamed)")
}

/// Naming, width and foreign-key rules that need nothing but the definition.
pub(crate) fn check_index_shape(
    rules: &RuleSettings,
    db_type: DbType,
    index: &IndexDef,
    record: &mut StatementRecord,
) {
    let levels = &rules.levels;
    let name = display_name(index);
    let lower = name.to_ascii_lowercase();

    if index.kind != IndexKind::Primary && exceeds(index.parts.len(), rules.limits.max_index_parts) {
        record.append_warning(format!(
            "Index '{name}' has {} columns, exceeds max {}.",
            index.parts.len(),
            rules.limits.max_index_parts
        ));
    }

    match index.kind {
        IndexKind::Unique if !lower.starts_with("uniq_") => record.report(
            levels.check_index_prefix,
            format!("Unique index '{name}' should have 'uniq_' prefix."),
        ),
        IndexKind::Normal | IndexKind::Fulltext if !lower.starts_with("idx_") => record.report(
            levels.check_index_prefix,
            format!("Index '{name}' should have 'idx_' prefix."),
        ),
        IndexKind::Foreign => {
            record.report(levels.check_foreign_key, "Foreign keys are not allowed.");
            if db_type == DbType::TiDb {
                record.report(
                    levels.check_tidb_foreign_key,
                    "TiDB does not support FOREIGN KEY constraints.",
                );
            }
        }
        _ => {}
    }
}

/// Key-length rules. `types` holds the resolved type of each index part,
/// `None` where the column could not be found.
pub(crate) fn check_index_length(
    rules: &RuleSettings,
    index: &IndexDef,
    types: &[Option<ColumnType>],
    record: &mut StatementRecord,
) {
    if matches!(index.kind, IndexKind::Foreign | IndexKind::Fulltext) {
        return;
    }
    let name = display_name(index);
    let column_max = rules.limits.index_column_max_bytes;
    let total_max = rules.limits.index_total_max_bytes;
    let mut total = 0u64;

    for (part, ty) in index.parts.iter().zip(types) {
        let Some(ty) = ty else {
            continue;
        };
        let bytes = match (part.prefix, ty.index_bytes(BYTES_PER_CHAR)) {
            (Some(prefix), _) => u64::from(prefix) * BYTES_PER_CHAR,
            (None, Some(bytes)) => bytes,
            (None, None) => {
                record.append_error(format!(
                    "Index '{name}' on BLOB/TEXT column '{}' must specify a prefix length.",
                    part.column
                ));
                continue;
            }
        };
        if column_max > 0 && bytes > column_max {
            record.report(
                rules.levels.check_index_length,
                format!(
                    "Index '{name}' column '{}' key length {bytes} bytes exceeds max {column_max}.",
                    part.column
                ),
            );
        }
        total += bytes;
    }

    if total_max > 0 && total > total_max {
        record.report(
            rules.levels.check_index_length,
            format!("Index '{name}' total key length {total} bytes exceeds max {total_max}."),
        );
    }
}
