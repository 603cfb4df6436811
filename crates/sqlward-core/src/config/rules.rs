//! Audit rule levels and limits.
//!
//! Every rule has a name (the field name) so the settings store can update
//! it at runtime by name, e.g. `check_primary_key = WARNING`.

use super::ConfigError;
use crate::types::RuleLevel;
use serde::{Deserialize, Serialize};

/// Declares a settings struct whose fields can also be read and written by name.
macro_rules! named_settings {
    (
        $(#[$smeta:meta])*
        $strukt:ident : $ty:ty {
            $( $(#[$doc:meta])* $name:ident = $default:expr ),* $(,)?
        }
    ) => {
        $(#[$smeta])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $strukt {
            $( $(#[$doc])* pub $name: $ty, )*
        }

        impl Default for $strukt {
            fn default() -> Self {
                Self { $( $name: $default, )* }
            }
        }

        impl $strukt {
            /// All setting names, in declaration order.
            pub const NAMES: &'static [&'static str] = &[$(stringify!($name)),*];

            pub fn get(&self, name: &str) -> Option<$ty> {
                match name {
                    $( stringify!($name) => Some(self.$name), )*
                    _ => None,
                }
            }

            /// Returns `false` when `name` is not a known setting.
            pub fn set(&mut self, name: &str, value: $ty) -> bool {
                match name {
                    $( stringify!($name) => { self.$name = value; true } )*
                    _ => false,
                }
            }
        }
    };
}

named_settings! {
    /// Level of each audit rule.
    RuleLevels: RuleLevel {
        check_primary_key = RuleLevel::Error,
        check_table_comment = RuleLevel::Error,
        check_column_comment = RuleLevel::Off,
        check_engine_innodb = RuleLevel::Error,
        check_dml_where = RuleLevel::Error,
        check_dml_limit = RuleLevel::Off,
        check_insert_column = RuleLevel::Error,
        check_select_star = RuleLevel::Off,
        check_nullable = RuleLevel::Off,
        check_foreign_key = RuleLevel::Off,
        check_blob_type = RuleLevel::Off,
        check_index_prefix = RuleLevel::Warning,
        check_enum_type = RuleLevel::Off,
        check_set_type = RuleLevel::Off,
        check_bit_type = RuleLevel::Off,
        check_json_type = RuleLevel::Off,
        check_json_blob_text_default = RuleLevel::Error,
        check_create_select = RuleLevel::Off,
        check_identifier = RuleLevel::Off,
        check_not_null_default = RuleLevel::Off,
        check_duplicate_index = RuleLevel::Warning,
        check_drop_database = RuleLevel::Error,
        check_drop_table = RuleLevel::Warning,
        check_truncate_table = RuleLevel::Warning,
        check_delete = RuleLevel::Off,
        check_autoincrement = RuleLevel::Warning,
        check_partition = RuleLevel::Warning,
        check_orderby_in_dml = RuleLevel::Warning,
        check_orderby_rand = RuleLevel::Warning,
        check_autoincrement_init_value = RuleLevel::Warning,
        check_autoincrement_name = RuleLevel::Off,
        check_timestamp_default = RuleLevel::Warning,
        check_column_charset = RuleLevel::Off,
        check_column_default_value = RuleLevel::Off,
        check_identifier_keyword = RuleLevel::Off,
        check_merge_alter_table = RuleLevel::Warning,
        check_varchar_shrink = RuleLevel::Warning,
        check_lossy_type_change = RuleLevel::Warning,
        check_decimal_change = RuleLevel::Off,
        check_tidb_merge_alter = RuleLevel::Error,
        check_tidb_varchar_shrink = RuleLevel::Error,
        check_tidb_decimal_change = RuleLevel::Error,
        check_tidb_lossy_type_change = RuleLevel::Error,
        check_tidb_foreign_key = RuleLevel::Error,
        check_index_length = RuleLevel::Warning,
        check_insert_values_match = RuleLevel::Error,
        check_insert_duplicate_column = RuleLevel::Error,
        check_column_exists = RuleLevel::Error,
        check_must_have_columns = RuleLevel::Error,
    }
}

named_settings! {
    /// Numeric limits. Zero disables the limit.
    RuleLimits: u64 {
        max_indexes = 16,
        max_index_parts = 5,
        max_update_rows = 10000,
        max_char_length = 64,
        max_primary_key_parts = 5,
        max_table_name_length = 64,
        max_column_name_length = 64,
        max_columns = 0,
        index_column_max_bytes = 767,
        index_total_max_bytes = 3072,
        max_in_count = 0,
    }
}

/// Everything the rule engine reads from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSettings {
    #[serde(default)]
    pub levels: RuleLevels,

    #[serde(default)]
    pub limits: RuleLimits,

    /// Columns every new table must define, separated by `;`.
    ///
    /// Each entry reads `name [TYPE] [UNSIGNED] [NOT NULL] [AUTO_INCREMENT] [COMMENT]`
    /// and every keyword present becomes a requirement.
    #[serde(default)]
    pub must_have_columns: String,

    /// Comma-separated character sets allowed for tables and databases.
    /// Empty allows any.
    #[serde(default)]
    pub support_charset: String,
}

impl RuleSettings {
    /// Update one setting by name from its textual value.
    ///
    /// Rule levels accept anything and fall back to `OFF`; limits must be
    /// non-negative integers.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        let name = name.trim().to_ascii_lowercase();
        if self.levels.set(&name, RuleLevel::parse_lenient(value)) {
            return Ok(());
        }
        if RuleLimits::NAMES.contains(&name.as_str()) {
            let parsed = value.trim().parse::<u64>().map_err(|_| {
                ConfigError::Config(format!("limit '{name}' expects a number, got '{value}'"))
            })?;
            self.limits.set(&name, parsed);
            return Ok(());
        }
        match name.as_str() {
            "must_have_columns" => self.must_have_columns = value.to_string(),
            "support_charset" => self.support_charset = value.to_string(),
            _ => return Err(ConfigError::Config(format!("unknown rule setting '{name}'"))),
        }
        Ok(())
    }

    /// Allowed character sets, lowercased.
    pub fn allowed_charsets(&self) -> Vec<String> {
        self.support_charset
            .split(',')
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Parse a standalone rules file (the `rules:` section on its own).
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }
}
