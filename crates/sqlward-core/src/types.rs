//! Ordered enums shared across the gateway.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Configured level of a single audit rule.
///
/// Ordered `Off < Warning < Error`. Values that cannot be parsed are read as
/// `Off`, so a typo in the rule configuration disables the rule instead of
/// failing the whole gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum RuleLevel {
    #[default]
    Off,
    Warning,
    Error,
}

impl RuleLevel {
    /// Parse a level from its textual or numeric form; anything else is `Off`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "WARNING" | "WARN" | "1" => Self::Warning,
            "ERROR" | "2" => Self::Error,
            _ => Self::Off,
        }
    }

    pub fn from_number(value: i64) -> Self {
        match value {
            1 => Self::Warning,
            2 => Self::Error,
            _ => Self::Off,
        }
    }

    pub fn is_off(self) -> bool {
        self == Self::Off
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for RuleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RuleLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RuleLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Flag(bool),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Self::from_number(n),
            // YAML reads a bare `off` as boolean false.
            Raw::Flag(_) => Self::Off,
            Raw::Text(s) => Self::parse_lenient(&s),
        })
    }
}

/// Aggregate severity of a statement record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Ok,
    Warning,
    Error,
}

impl Severity {
    /// Numeric form used in the `err_level` result column.
    pub fn code(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Warning => 1,
            Self::Error => 2,
        }
    }
}

impl From<RuleLevel> for Severity {
    fn from(level: RuleLevel) -> Self {
        match level {
            RuleLevel::Off => Self::Ok,
            RuleLevel::Warning => Self::Warning,
            RuleLevel::Error => Self::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        })
    }
}

/// Processing stage of a statement record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stage {
    #[default]
    None,
    Checked,
    Executed,
    Skipped,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "NONE",
            Self::Checked => "CHECKED",
            Self::Executed => "EXECUTED",
            Self::Skipped => "SKIPPED",
        })
    }
}

/// Operating mode selected by the session-open marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpMode {
    #[default]
    Check,
    Execute,
    Split,
    QueryTree,
}

impl fmt::Display for OpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Check => "CHECK",
            Self::Execute => "EXECUTE",
            Self::Split => "SPLIT",
            Self::QueryTree => "QUERY_TREE",
        })
    }
}

/// Dialect of the target database, detected after connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DbType {
    #[default]
    MySql,
    TiDb,
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MySql => "MySQL",
            Self::TiDb => "TiDB",
        })
    }
}

/// `major.minor` version of the target server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DbVersion {
    pub major: u32,
    pub minor: u32,
}

impl Default for DbVersion {
    fn default() -> Self {
        Self { major: 8, minor: 0 }
    }
}

impl DbVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Detect dialect and version from a `SELECT VERSION()` string.
    ///
    /// TiDB reports something like `8.0.11-TiDB-v7.5.1`; the TiDB release is
    /// preferred over the MySQL compatibility prefix.
    pub fn detect(server_info: &str) -> (DbType, Option<DbVersion>) {
        let is_tidb = server_info.contains("TiDB") || server_info.contains("tidb");
        if is_tidb {
            for marker in ["TiDB-v", "tidb-v", "TiDB-", "tidb-"] {
                if let Some(pos) = server_info.find(marker) {
                    if let Some(v) = first_version(&server_info[pos + marker.len()..]) {
                        return (DbType::TiDb, Some(v));
                    }
                }
            }
            return (DbType::TiDb, first_version(server_info));
        }
        (DbType::MySql, first_version(server_info))
    }
}

impl fmt::Display for DbVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Find the first `<digits>.<digits>` pair in `text`.
fn first_version(text: &str) -> Option<DbVersion> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'.' {
            continue;
        }
        let dot = i;
        let mut j = dot + 1;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j == dot + 1 {
            i = j;
            continue;
        }
        let major = text[start..dot].parse().ok()?;
        let minor = text[dot + 1..j].parse().ok()?;
        return Some(DbVersion { major, minor });
    }
    None
}

/// Predicted cost class of applying a schema change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CostTier {
    /// Metadata-only change.
    Instant,
    /// Index rebuild without copying the table.
    Inplace,
    /// Full table copy.
    Copy,
}

impl fmt::Display for CostTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Instant => "INSTANT",
            Self::Inplace => "INPLACE",
            Self::Copy => "COPY",
        })
    }
}

/// Statement kind vocabulary reported in results and by `inception get sqltypes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SqlKind {
    CreateTable,
    AlterTable,
    DropTable,
    RenameTable,
    Truncate,
    CreateIndex,
    DropIndex,
    CreateDatabase,
    DropDatabase,
    AlterDatabase,
    UseDatabase,
    Insert,
    InsertSelect,
    Replace,
    ReplaceSelect,
    Update,
    Delete,
    Select,
    Set,
    CreateView,
    DropView,
    CreateTrigger,
    DropTrigger,
    CreateUser,
    DropUser,
    Grant,
    Revoke,
    LockTables,
    UnlockTables,
    #[default]
    Other,
}

impl SqlKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateTable => "CREATE_TABLE",
            Self::AlterTable => "ALTER_TABLE",
            Self::DropTable => "DROP_TABLE",
            Self::RenameTable => "RENAME_TABLE",
            Self::Truncate => "TRUNCATE",
            Self::CreateIndex => "CREATE_INDEX",
            Self::DropIndex => "DROP_INDEX",
            Self::CreateDatabase => "CREATE_DATABASE",
            Self::DropDatabase => "DROP_DATABASE",
            Self::AlterDatabase => "ALTER_DATABASE",
            Self::UseDatabase => "USE_DATABASE",
            Self::Insert => "INSERT",
            Self::InsertSelect => "INSERT_SELECT",
            Self::Replace => "REPLACE",
            Self::ReplaceSelect => "REPLACE_SELECT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Select => "SELECT",
            Self::Set => "SET",
            Self::CreateView => "CREATE_VIEW",
            Self::DropView => "DROP_VIEW",
            Self::CreateTrigger => "CREATE_TRIGGER",
            Self::DropTrigger => "DROP_TRIGGER",
            Self::CreateUser => "CREATE_USER",
            Self::DropUser => "DROP_USER",
            Self::Grant => "GRANT",
            Self::Revoke => "REVOKE",
            Self::LockTables => "LOCK_TABLES",
            Self::UnlockTables => "UNLOCK_TABLES",
            Self::Other => "OTHER",
        }
    }

    /// DDL kinds, used by SPLIT mode to keep schema and data changes apart.
    pub fn is_ddl(self) -> bool {
        matches!(
            self,
            Self::CreateTable
                | Self::AlterTable
                | Self::DropTable
                | Self::RenameTable
                | Self::Truncate
                | Self::CreateIndex
                | Self::DropIndex
                | Self::CreateDatabase
                | Self::DropDatabase
                | Self::AlterDatabase
                | Self::CreateView
                | Self::DropView
                | Self::CreateTrigger
                | Self::DropTrigger
        )
    }

    /// Statements whose execution changes session state rather than data.
    pub fn is_session_state(self) -> bool {
        matches!(self, Self::UseDatabase | Self::Set)
    }
}

impl fmt::Display for SqlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
