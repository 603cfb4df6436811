//! Required-column rule for new tables.

use sqlward_core::{RuleLevel, StatementRecord};
use sqlward_sql::{ColumnType, CreateTable};

/// One `;`-separated entry of the `must_have_columns` setting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequiredColumn {
    pub name: String,
    pub type_name: Option<String>,
    pub unsigned: bool,
    pub not_null: bool,
    pub auto_increment: bool,
    pub comment: bool,
}

fn is_keyword(token: &str) -> bool {
    ["UNSIGNED", "NOT", "NULL", "AUTO_INCREMENT", "COMMENT"]
        .iter()
        .any(|k| k.eq_ignore_ascii_case(token))
}

impl RequiredColumn {
    /// Parse `name [TYPE] [UNSIGNED] [NOT NULL] [AUTO_INCREMENT] [COMMENT]`.
    pub fn parse(entry: &str) -> Option<Self> {
        let tokens: Vec<&str> = entry.split_whitespace().collect();
        let (name, rest) = tokens.split_first()?;
        let has = |word: &str| rest.iter().any(|t| t.eq_ignore_ascii_case(word));
        let not_null = rest
            .windows(2)
            .any(|w| w[0].eq_ignore_ascii_case("NOT") && w[1].eq_ignore_ascii_case("NULL"));

        Some(Self {
            name: name.to_string(),
            type_name: rest
                .first()
                .filter(|t| !is_keyword(t))
                .map(|t| t.to_ascii_uppercase()),
            unsigned: has("UNSIGNED"),
            not_null,
            auto_increment: has("AUTO_INCREMENT"),
            comment: has("COMMENT"),
        })
    }

    /// Parse the whole setting; blank entries are skipped.
    pub fn parse_list(list: &str) -> Vec<Self> {
        list.split(';').filter_map(Self::parse).collect()
    }

    fn describe(&self) -> String {
        let mut desc = self.name.clone();
        if let Some(ty) = &self.type_name {
            desc.push(' ');
            desc.push_str(ty);
        }
        for (flag, word) in [
            (self.unsigned, "UNSIGNED"),
            (self.not_null, "NOT NULL"),
            (self.auto_increment, "AUTO_INCREMENT"),
            (self.comment, "COMMENT"),
        ] {
            if flag {
                desc.push(' ');
                desc.push_str(word);
            }
        }
        desc
    }
}

pub(crate) fn check_must_have_columns(
    level: RuleLevel,
    list: &str,
    create: &CreateTable,
    record: &mut StatementRecord,
) {
    if level.is_off() {
        return;
    }
    for required in RequiredColumn::parse_list(list) {
        let name = required.name.as_str();
        let Some(column) = create.column(name) else {
            record.report(
                level,
                format!("Required column is missing: {}.", required.describe()),
            );
            continue;
        };

        if let Some(expected) = &required.type_name {
            let expected = ColumnType::from_sql(expected).name();
            let found = column.ty.name();
            if expected != found {
                record.report(
                    level,
                    format!("Required column '{name}' must be {expected}, but found {found}."),
                );
            }
        }
        if required.unsigned && !column.unsigned {
            record.report(level, format!("Required column '{name}' must be UNSIGNED."));
        }
        if required.not_null && column.is_nullable() {
            record.report(level, format!("Required column '{name}' must be NOT NULL."));
        }
        if required.auto_increment && !column.auto_increment {
            record.report(
                level,
                format!("Required column '{name}' must be AUTO_INCREMENT."),
            );
        }
        if required.comment && !column.has_comment() {
            record.report(level, format!("Required column '{name}' must have a COMMENT."));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlward_core::SqlKind;
    use sqlward_sql::{ColumnDef, TableRef};

    #[test]
    fn test_parse_entries() {
        let list = RequiredColumn::parse_list(
            "id bigint UNSIGNED NOT NULL AUTO_INCREMENT; create_time DATETIME COMMENT; ;",
        );
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].type_name.as_deref(), Some("BIGINT"));
        assert!(list[0].unsigned && list[0].not_null && list[0].auto_increment);
        assert!(!list[0].comment);
        assert_eq!(list[1].describe(), "create_time DATETIME COMMENT");

        let bare = RequiredColumn::parse("updated_at NOT NULL").unwrap();
        assert_eq!(bare.type_name, None);
        assert!(bare.not_null);
    }

    #[test]
    fn test_check_against_table() {
        let mut id = ColumnDef::new("id", "INT");
        id.auto_increment = true;
        let create = CreateTable {
            table: TableRef::new(None, "t"),
            columns: vec![id],
            indexes: Vec::new(),
            engine: None,
            charset: None,
            comment: None,
            auto_increment: None,
            partitioned: false,
            from_select: false,
            like: None,
            if_not_exists: false,
        };
        let mut record = StatementRecord::new(1, "", SqlKind::CreateTable);
        check_must_have_columns(
            RuleLevel::Error,
            "id BIGINT UNSIGNED AUTO_INCREMENT; create_time DATETIME NOT NULL",
            &create,
            &mut record,
        );
        assert_eq!(
            record.findings(),
            [
                "Required column 'id' must be BIGINT, but found INT.",
                "Required column 'id' must be UNSIGNED.",
                "Required column is missing: create_time DATETIME NOT NULL.",
            ]
        );
    }
}
