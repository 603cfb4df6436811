//! Column definition rules, shared by CREATE TABLE and ALTER TABLE.

use super::{exceeds, is_identifier};
use crate::keywords::is_reserved;
use sqlward_core::{DbType, DbVersion, RuleSettings, StatementRecord};
use sqlward_sql::{ColumnDef, ColumnType, IntWidth};

pub(crate) fn check_column(
    rules: &RuleSettings,
    db_type: DbType,
    db_version: DbVersion,
    column: &ColumnDef,
    record: &mut StatementRecord,
) {
    let levels = &rules.levels;
    let limits = &rules.limits;
    let name = column.name.as_str();
    let blob_like = column.ty.is_blob_like();

    if exceeds(name.len(), limits.max_column_name_length) {
        record.append_warning(format!(
            "Column '{name}' name length {} exceeds max {}.",
            name.len(),
            limits.max_column_name_length
        ));
    }
    if !is_identifier(name) {
        record.report(
            levels.check_identifier,
            format!("Column '{name}' name should be lowercase letters, digits and underscores."),
        );
    }
    if !column.has_comment() {
        record.report(
            levels.check_column_comment,
            format!("Column '{name}' must have a comment."),
        );
    }
    if column.is_nullable() && !blob_like {
        record.report(
            levels.check_nullable,
            format!("Column '{name}' is nullable; consider NOT NULL with a default."),
        );
    }
    if column.nullable == Some(false)
        && !column.has_default()
        && !column.auto_increment
        && !column.primary_key
        && !column.generated
        && !blob_like
    {
        record.report(
            levels.check_not_null_default,
            format!("Column '{name}' is NOT NULL but has no DEFAULT value."),
        );
    }
    if blob_like && column.has_default() && !column.default_is_null() {
        record.report(
            levels.check_json_blob_text_default,
            format!("Column '{name}': explicit DEFAULT on JSON/BLOB/TEXT is not allowed."),
        );
    }

    match &column.ty {
        ColumnType::Text | ColumnType::Blob => record.report(
            levels.check_blob_type,
            format!("Column '{name}' uses BLOB/TEXT type."),
        ),
        ColumnType::Enum => record.report(
            levels.check_enum_type,
            format!("Column '{name}' uses ENUM type, not recommended."),
        ),
        ColumnType::Set => record.report(
            levels.check_set_type,
            format!("Column '{name}' uses SET type, not recommended."),
        ),
        ColumnType::Bit(_) => record.report(
            levels.check_bit_type,
            format!("Column '{name}' uses BIT type, not recommended."),
        ),
        ColumnType::Json
            if db_type == DbType::MySql && db_version < DbVersion::new(5, 7) =>
        {
            record.append_error(format!(
                "Column '{name}': JSON type is not supported in MySQL {db_version}."
            ))
        }
        ColumnType::Json => record.report(
            levels.check_json_type,
            format!("Column '{name}' uses JSON type."),
        ),
        ColumnType::Char(len) if exceeds(*len as usize, limits.max_char_length) => {
            record.append_warning(format!(
                "Column '{name}' CHAR({len}) exceeds max {}; consider VARCHAR.",
                limits.max_char_length
            ))
        }
        _ => {}
    }

    if column.auto_increment {
        if !column.unsigned {
            record.report(
                levels.check_autoincrement,
                format!("Auto-increment column '{name}' should be UNSIGNED."),
            );
        }
        if !matches!(
            column.ty,
            ColumnType::Integer(IntWidth::Int) | ColumnType::Integer(IntWidth::Big)
        ) {
            record.report(
                levels.check_autoincrement,
                format!("Auto-increment column '{name}' should be INT or BIGINT."),
            );
        }
        if !name.eq_ignore_ascii_case("id") {
            record.report(
                levels.check_autoincrement_name,
                format!("Auto-increment column '{name}' should be named 'id'."),
            );
        }
    }

    if column.ty == ColumnType::Timestamp && !column.has_default() && !column.default_now {
        record.report(
            levels.check_timestamp_default,
            format!("TIMESTAMP column '{name}' must have a DEFAULT value."),
        );
    }
    if column.charset.is_some() {
        record.report(
            levels.check_column_charset,
            format!("Column '{name}' specifies a character set; use table default instead."),
        );
    }
    if !column.has_default()
        && !column.default_now
        && !column.auto_increment
        && !column.primary_key
        && !column.generated
        && !blob_like
    {
        record.report(
            levels.check_column_default_value,
            format!("Column '{name}' must have a DEFAULT value."),
        );
    }
    if is_reserved(name) {
        record.report(
            levels.check_identifier_keyword,
            format!("Column name '{name}' is a MySQL reserved keyword."),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlward_core::{RuleLevel, Severity, SqlKind};

    fn run(rules: &RuleSettings, column: &ColumnDef, db_version: DbVersion) -> StatementRecord {
        let mut record = StatementRecord::new(1, "", SqlKind::CreateTable);
        check_column(rules, DbType::MySql, db_version, column, &mut record);
        record
    }

    #[test]
    fn test_plain_column_is_clean_by_default() {
        let mut column = ColumnDef::new("name", "VARCHAR(50)");
        column.nullable = Some(false);
        column.default = Some("''".into());
        column.comment = Some("name".into());
        let record = run(&RuleSettings::default(), &column, DbVersion::default());
        assert!(record.findings().is_empty(), "{:?}", record.findings());
    }

    #[test]
    fn test_auto_increment_rules() {
        let mut column = ColumnDef::new("pk", "SMALLINT");
        column.auto_increment = true;
        let mut rules = RuleSettings::default();
        rules.levels.check_autoincrement_name = RuleLevel::Warning;
        let record = run(&rules, &column, DbVersion::default());
        assert_eq!(
            record.findings(),
            [
                "Auto-increment column 'pk' should be UNSIGNED.",
                "Auto-increment column 'pk' should be INT or BIGINT.",
                "Auto-increment column 'pk' should be named 'id'.",
            ]
        );
        assert_eq!(record.severity(), Severity::Warning);
    }

    #[test]
    fn test_json_on_old_mysql_is_error() {
        let column = ColumnDef::new("attrs", "JSON");
        let record = run(&RuleSettings::default(), &column, DbVersion::new(5, 6));
        assert_eq!(record.severity(), Severity::Error);
        assert_eq!(
            record.findings(),
            ["Column 'attrs': JSON type is not supported in MySQL 5.6."]
        );

        let record = run(&RuleSettings::default(), &column, DbVersion::new(5, 7));
        assert!(record.findings().is_empty());
    }

    #[test]
    fn test_blob_default_and_char_limit() {
        let mut text = ColumnDef::new("body", "TEXT");
        text.default = Some("'x'".into());
        let record = run(&RuleSettings::default(), &text, DbVersion::default());
        assert_eq!(record.severity(), Severity::Error);

        let wide = ColumnDef::new("code", "CHAR(100)");
        let record = run(&RuleSettings::default(), &wide, DbVersion::default());
        assert_eq!(
            record.findings(),
            ["Column 'code' CHAR(100) exceeds max 64; consider VARCHAR."]
        );
    }

    #[test]
    fn test_opt_in_rules() {
        let mut rules = RuleSettings::default();
        rules.levels.check_column_comment = RuleLevel::Error;
        rules.levels.check_nullable = RuleLevel::Warning;
        rules.levels.check_identifier_keyword = RuleLevel::Warning;
        let column = ColumnDef::new("order", "INT");
        let record = run(&rules, &column, DbVersion::default());
        assert_eq!(
            record.findings(),
            [
                "Column 'order' must have a comment.",
                "Column 'order' is nullable; consider NOT NULL with a default.",
                "Column name 'order' is a MySQL reserved keyword.",
            ]
        );
        assert_eq!(record.severity(), Severity::Error);
    }
}
