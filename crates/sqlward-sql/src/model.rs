//! Read-only statement model consumed by the rule engine.
//!
//! The model carries only what the audit rules and the query-tree extractor
//! need: tables, columns, types, keys and a predicate tree. Any parser that
//! can fill these types can stand in for [`crate::MySqlParser`].

use serde::Serialize;
pub use sqlward_core::SqlKind;

/// A parsed statement: its kind, original text and structured body.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStatement {
    pub kind: SqlKind,
    pub text: String,
    pub body: StatementBody,
}

impl ParsedStatement {
    /// The table a statement is primarily about, if any.
    pub fn primary_table(&self) -> Option<&TableRef> {
        match &self.body {
            StatementBody::CreateTable(create) => Some(&create.table),
            StatementBody::AlterTable(alter) => Some(&alter.table),
            StatementBody::DropTable { tables } => tables.first(),
            StatementBody::Truncate { table } => Some(table),
            StatementBody::Insert(insert) => Some(&insert.table),
            StatementBody::Update(update) => update.tables.first(),
            StatementBody::Delete(delete) => delete.tables.first(),
            StatementBody::Select(select) => select.tables.first(),
            StatementBody::Other { tables } => tables.first(),
            StatementBody::CreateDatabase { .. }
            | StatementBody::DropDatabase { .. }
            | StatementBody::Use { .. }
            | StatementBody::Set => None,
        }
    }

    /// Database named by the statement itself (CREATE/DROP DATABASE, USE).
    pub fn database_name(&self) -> Option<&str> {
        match &self.body {
            StatementBody::CreateDatabase { name, .. }
            | StatementBody::DropDatabase { name }
            | StatementBody::Use { database: name } => Some(name),
            _ => None,
        }
    }
}

/// Structured body, one variant per rule family.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementBody {
    CreateTable(CreateTable),
    /// ALTER TABLE, and CREATE/DROP INDEX and RENAME TABLE expressed as
    /// single-operation alters.
    AlterTable(AlterTable),
    CreateDatabase {
        name: String,
        charset: Option<String>,
    },
    DropDatabase {
        name: String,
    },
    DropTable {
        tables: Vec<TableRef>,
    },
    Truncate {
        table: TableRef,
    },
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    Select(Select),
    Use {
        database: String,
    },
    Set,
    /// Statements the rule engine has no dedicated checks for.
    Other {
        tables: Vec<TableRef>,
    },
}

/// A possibly database-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TableRef {
    pub db: Option<String>,
    pub name: String,
    #[serde(skip)]
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(db: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            db: db.map(str::to_string),
            name: name.into(),
            alias: None,
        }
    }

    /// The table's database, or `ambient` when unqualified.
    pub fn db_or<'a>(&'a self, ambient: &'a str) -> &'a str {
        self.db.as_deref().unwrap_or(ambient)
    }

    /// Whether a column qualifier (`t.col` or `alias.col`) names this table.
    pub fn answers_to(&self, qualifier: &str) -> bool {
        self.alias
            .as_deref()
            .is_some_and(|a| a.eq_ignore_ascii_case(qualifier))
            || self.name.eq_ignore_ascii_case(qualifier)
    }
}

/// Integer widths, ordered narrowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntWidth {
    Tiny = 1,
    Small = 2,
    Medium = 3,
    Int = 4,
    Big = 5,
}

impl IntWidth {
    /// Storage size in bytes.
    pub fn bytes(self) -> u64 {
        match self {
            Self::Tiny => 1,
            Self::Small => 2,
            Self::Medium => 3,
            Self::Int => 4,
            Self::Big => 8,
        }
    }
}

/// Column data type, reduced to what the rules compare.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer(IntWidth),
    Float,
    Double,
    Decimal { precision: u32, scale: u32 },
    Char(u32),
    Varchar(u32),
    Text,
    Blob,
    Date,
    Time,
    DateTime,
    Timestamp,
    Json,
    Enum,
    Set,
    Bit(u32),
    Other(String),
}

impl ColumnType {
    /// Classify a MySQL type as written in DDL or reported by
    /// `INFORMATION_SCHEMA.COLUMNS.COLUMN_TYPE`, e.g. `bigint(20) unsigned`.
    pub fn from_sql(text: &str) -> Self {
        let upper = text.trim().to_ascii_uppercase();
        let base_end = upper
            .find(|c: char| c == '(' || c.is_whitespace())
            .unwrap_or(upper.len());
        let base = &upper[..base_end];
        let args: Vec<u32> = upper[base_end..]
            .trim_start()
            .strip_prefix('(')
            .and_then(|rest| rest.split_once(')'))
            .map(|(inner, _)| inner.split(',').filter_map(|a| a.trim().parse().ok()).collect())
            .unwrap_or_default();
        let arg = |i: usize, default: u32| args.get(i).copied().unwrap_or(default);

        match base {
            "TINYINT" | "BOOL" | "BOOLEAN" => Self::Integer(IntWidth::Tiny),
            "SMALLINT" => Self::Integer(IntWidth::Small),
            "MEDIUMINT" => Self::Integer(IntWidth::Medium),
            "INT" | "INTEGER" => Self::Integer(IntWidth::Int),
            "BIGINT" => Self::Integer(IntWidth::Big),
            "FLOAT" => Self::Float,
            "DOUBLE" | "REAL" => Self::Double,
            "DECIMAL" | "NUMERIC" | "DEC" => Self::Decimal {
                precision: arg(0, 10),
                scale: arg(1, 0),
            },
            "CHAR" | "CHARACTER" if upper.contains("VARYING") => Self::Varchar(arg(0, 0)),
            "CHAR" | "CHARACTER" => Self::Char(arg(0, 1)),
            "VARCHAR" => Self::Varchar(arg(0, 0)),
            "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" => Self::Text,
            "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => Self::Blob,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "DATETIME" => Self::DateTime,
            "TIMESTAMP" => Self::Timestamp,
            "JSON" => Self::Json,
            "ENUM" => Self::Enum,
            "SET" => Self::Set,
            "BIT" => Self::Bit(arg(0, 1)),
            other => Self::Other(other.to_string()),
        }
    }

    /// BLOB, TEXT and JSON: no literal default, no index without prefix.
    pub fn is_blob_like(&self) -> bool {
        matches!(self, Self::Text | Self::Blob | Self::Json)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Integer(_))
    }

    /// Declared length of CHAR/VARCHAR columns.
    pub fn char_length(&self) -> Option<u32> {
        match self {
            Self::Char(n) | Self::Varchar(n) => Some(*n),
            _ => None,
        }
    }

    /// Bytes an index entry on this type occupies, with `bytes_per_char` for
    /// character types. `None` for types that need a prefix length.
    pub fn index_bytes(&self, bytes_per_char: u64) -> Option<u64> {
        Some(match self {
            Self::Integer(width) => width.bytes(),
            Self::Float => 4,
            Self::Double => 8,
            Self::Decimal { precision, .. } => u64::from(*precision) / 2 + 1,
            Self::Char(n) | Self::Varchar(n) => u64::from(*n) * bytes_per_char,
            Self::Date | Self::Time => 3,
            Self::DateTime => 8,
            Self::Timestamp => 4,
            Self::Enum => 2,
            Self::Set => 8,
            Self::Bit(n) => u64::from(*n).div_ceil(8),
            Self::Text | Self::Blob | Self::Json => return None,
            Self::Other(_) => 0,
        })
    }

    /// Upper-case type name without arguments, for messages.
    pub fn name(&self) -> String {
        match self {
            Self::Integer(IntWidth::Tiny) => "TINYINT".into(),
            Self::Integer(IntWidth::Small) => "SMALLINT".into(),
            Self::Integer(IntWidth::Medium) => "MEDIUMINT".into(),
            Self::Integer(IntWidth::Int) => "INT".into(),
            Self::Integer(IntWidth::Big) => "BIGINT".into(),
            Self::Float => "FLOAT".into(),
            Self::Double => "DOUBLE".into(),
            Self::Decimal { .. } => "DECIMAL".into(),
            Self::Char(_) => "CHAR".into(),
            Self::Varchar(_) => "VARCHAR".into(),
            Self::Text => "TEXT".into(),
            Self::Blob => "BLOB".into(),
            Self::Date => "DATE".into(),
            Self::Time => "TIME".into(),
            Self::DateTime => "DATETIME".into(),
            Self::Timestamp => "TIMESTAMP".into(),
            Self::Json => "JSON".into(),
            Self::Enum => "ENUM".into(),
            Self::Set => "SET".into(),
            Self::Bit(_) => "BIT".into(),
            Self::Other(name) => name.clone(),
        }
    }
}

/// A column definition from CREATE TABLE or ALTER TABLE.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
    /// The type as written, e.g. `VARCHAR(50)`.
    pub type_text: String,
    pub unsigned: bool,
    /// `Some(false)` for NOT NULL, `Some(true)` for explicit NULL.
    pub nullable: Option<bool>,
    /// Rendered DEFAULT expression, if any.
    pub default: Option<String>,
    /// DEFAULT is CURRENT_TIMESTAMP or NOW().
    pub default_now: bool,
    pub on_update_now: bool,
    pub auto_increment: bool,
    pub comment: Option<String>,
    pub charset: Option<String>,
    pub generated: bool,
    /// Inline PRIMARY KEY.
    pub primary_key: bool,
    /// Inline UNIQUE.
    pub unique: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, type_text: &str) -> Self {
        Self {
            name: name.into(),
            ty: ColumnType::from_sql(type_text),
            type_text: type_text.to_string(),
            unsigned: type_text.to_ascii_uppercase().contains("UNSIGNED"),
            nullable: None,
            default: None,
            default_now: false,
            on_update_now: false,
            auto_increment: false,
            comment: None,
            charset: None,
            generated: false,
            primary_key: false,
            unique: false,
        }
    }

    /// Whether the column accepts NULL as declared.
    pub fn is_nullable(&self) -> bool {
        !self.primary_key && self.nullable != Some(false)
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// DEFAULT NULL written out explicitly.
    pub fn default_is_null(&self) -> bool {
        self.default
            .as_deref()
            .is_some_and(|d| d.eq_ignore_ascii_case("NULL"))
    }

    pub fn has_comment(&self) -> bool {
        self.comment.as_deref().is_some_and(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Primary,
    Unique,
    Normal,
    Fulltext,
    Foreign,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPart {
    pub column: String,
    /// Prefix length, e.g. `name(10)`.
    pub prefix: Option<u32>,
}

impl IndexPart {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            prefix: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: Option<String>,
    pub kind: IndexKind,
    pub parts: Vec<IndexPart>,
}

impl IndexDef {
    /// Column names, lowercased, in index order.
    pub fn column_key(&self) -> Vec<String> {
        self.parts.iter().map(|p| p.column.to_ascii_lowercase()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub table: TableRef,
    pub columns: Vec<ColumnDef>,
    /// Table-level keys plus inline PRIMARY KEY / UNIQUE column options.
    pub indexes: Vec<IndexDef>,
    pub engine: Option<String>,
    pub charset: Option<String>,
    pub comment: Option<String>,
    pub auto_increment: Option<u64>,
    pub partitioned: bool,
    /// CREATE TABLE ... SELECT.
    pub from_select: bool,
    /// CREATE TABLE ... LIKE other.
    pub like: Option<TableRef>,
    pub if_not_exists: bool,
}

impl CreateTable {
    pub fn primary_key(&self) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.kind == IndexKind::Primary)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// One ALTER TABLE sub-operation.
#[derive(Debug, Clone, PartialEq)]
pub enum AlterOp {
    AddColumn(ColumnDef),
    DropColumn(String),
    /// MODIFY or CHANGE COLUMN. `old_name` differs from `column.name` on a rename.
    ModifyColumn {
        old_name: String,
        column: ColumnDef,
    },
    /// ALTER COLUMN ... SET/DROP DEFAULT.
    ChangeDefault(String),
    /// FIRST / AFTER on a modified column.
    ColumnOrder(String),
    AddIndex(IndexDef),
    DropIndex(String),
    RenameIndex {
        from: String,
        to: String,
    },
    RenameTable(TableRef),
    /// Table options such as ENGINE or default charset.
    Options {
        engine: Option<String>,
    },
    AddPartition,
    DropPartition,
    Other(String),
}

impl AlterOp {
    /// Sub-operation tag as shown in the `sql_type` result column.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::AddColumn(_) => "ADD_COLUMN",
            Self::DropColumn(_) => "DROP_COLUMN",
            Self::ModifyColumn { .. } => "MODIFY_COLUMN",
            Self::ChangeDefault(_) => "CHANGE_DEFAULT",
            Self::ColumnOrder(_) => "COLUMN_ORDER",
            Self::AddIndex(_) => "ADD_INDEX",
            Self::DropIndex(_) => "DROP_INDEX",
            Self::RenameIndex { .. } => "RENAME_INDEX",
            Self::RenameTable(_) => "RENAME",
            Self::Options { .. } => "OPTIONS",
            Self::AddPartition => "ADD_PARTITION",
            Self::DropPartition => "DROP_PARTITION",
            Self::Other(_) => "OTHER",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterTable {
    pub table: TableRef,
    pub ops: Vec<AlterOp>,
}

impl AlterTable {
    /// Distinct sub-operation tags in first-seen order.
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags = Vec::new();
        for op in &self.ops {
            let tag = op.tag();
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }

    pub fn sub_type(&self) -> String {
        self.tags().join(",")
    }
}

/// A column reference, possibly qualified by a table name or alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn new(qualifier: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            qualifier: qualifier.map(str::to_string),
            name: name.into(),
        }
    }
}

/// WHERE / ON condition, reduced to what the rules inspect.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// `column <op> value` or any other binary comparison.
    Compare {
        columns: Vec<ColumnRef>,
        op: String,
    },
    InList {
        column: Option<ColumnRef>,
        len: usize,
        negated: bool,
    },
    /// Anything else; keeps the column references found inside.
    Other {
        columns: Vec<ColumnRef>,
    },
}

impl Predicate {
    /// Lengths of every IN (...) list in the tree.
    pub fn in_list_sizes(&self) -> Vec<usize> {
        let mut sizes = Vec::new();
        self.walk(&mut |p| {
            if let Predicate::InList { len, .. } = p {
                sizes.push(*len);
            }
        });
        sizes
    }

    /// Every column referenced anywhere in the tree.
    pub fn columns(&self) -> Vec<ColumnRef> {
        let mut out = Vec::new();
        self.walk(&mut |p| match p {
            Predicate::Compare { columns, .. } | Predicate::Other { columns } => {
                out.extend(columns.iter().cloned())
            }
            Predicate::InList {
                column: Some(column),
                ..
            } => out.push(column.clone()),
            _ => {}
        });
        out
    }

    fn walk(&self, visit: &mut impl FnMut(&Predicate)) {
        visit(self);
        match self {
            Predicate::And(items) | Predicate::Or(items) => {
                for item in items {
                    item.walk(visit);
                }
            }
            Predicate::Not(inner) => inner.walk(visit),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: TableRef,
    pub columns: Vec<String>,
    /// Number of values in each VALUES row.
    pub row_lengths: Vec<usize>,
    /// INSERT ... SELECT source.
    pub select: Option<Box<Select>>,
    pub replace: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    /// Target table first, then joined tables.
    pub tables: Vec<TableRef>,
    pub assignments: Vec<ColumnRef>,
    pub predicate: Option<Predicate>,
    pub has_limit: bool,
    pub has_order_by: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub tables: Vec<TableRef>,
    pub predicate: Option<Predicate>,
    pub has_limit: bool,
    pub has_order_by: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    /// FROM tables and joined tables, outer query only.
    pub tables: Vec<TableRef>,
    /// `*` or `t.*` in the projection.
    pub star: bool,
    pub columns: Vec<ColumnRef>,
    pub predicate: Option<Predicate>,
    pub join_columns: Vec<ColumnRef>,
    pub group_by: Vec<ColumnRef>,
    pub order_by: Vec<ColumnRef>,
    pub order_by_rand: bool,
    pub has_limit: bool,
}
