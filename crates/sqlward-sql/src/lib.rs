//! # sqlward-sql
//!
//! Statement handling for the sqlward gateway.
//!
//! - [`model`]: the read-only statement model the rule engine depends on
//! - [`parser`]: a `sqlparser`-backed MySQL parser that fills the model
//! - [`splitter`]: splits client text into statements
//! - [`fingerprint`]: literal-insensitive statement fingerprints
//! - [`tree`]: JSON description of the tables and columns a statement touches
//!
//! ## Example
//!
//! ```rust
//! use sqlward_sql::{MySqlParser, SqlKind, StatementParser, fingerprint};
//!
//! let parsed = MySqlParser::new().parse("ALTER TABLE t ADD COLUMN age INT").unwrap();
//! assert_eq!(parsed.kind, SqlKind::AlterTable);
//!
//! assert_eq!(
//!     fingerprint("SELECT * FROM t WHERE id = 1"),
//!     fingerprint("SELECT * FROM t WHERE id = 2"),
//! );
//! ```

pub mod error;
pub mod fingerprint;
pub mod model;
pub mod parser;
pub mod splitter;
pub mod tree;

mod scan;

pub use error::SqlError;
pub use fingerprint::{fingerprint, normalize};
pub use model::{
    AlterOp, AlterTable, ColumnDef, ColumnRef, ColumnType, CreateTable, Delete, IndexDef,
    IndexKind, IndexPart, Insert, IntWidth, ParsedStatement, Predicate, Select, SqlKind,
    StatementBody, TableRef, Update,
};
pub use parser::{MySqlParser, StatementParser};
pub use scan::{block_comments, strip_comments};
pub use splitter::{split_statements, truncate_at_terminator};
pub use tree::query_tree;
