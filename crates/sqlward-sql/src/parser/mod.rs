//! MySQL parser adapter.
//!
//! [`MySqlParser`] parses one statement with `sqlparser`'s MySQL dialect and
//! converts the AST into the statement model. MySQL forms the parser does not
//! accept (index prefix lengths, `DROP INDEX ... ON`, `RENAME TABLE`, table
//! options inside ALTER, partition clauses, `UPDATE ... LIMIT`) go through a
//! lexical recovery path instead of failing the statement.

mod ddl;
mod dml;
mod recover;

use crate::error::SqlError;
use crate::model::{ParsedStatement, SqlKind, StatementBody, TableRef};
use crate::scan::{self, Token};
use sqlparser::ast::{ObjectName, Statement};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

/// Turns statement text into the statement model.
pub trait StatementParser: Send + Sync {
    fn parse(&self, sql: &str) -> Result<ParsedStatement, SqlError>;
}

/// `sqlparser`-backed MySQL/TiDB parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlParser;

impl MySqlParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse exactly one statement into the `sqlparser` AST.
    pub fn parse_ast(&self, sql: &str) -> Result<Statement, SqlError> {
        let mut statements = Parser::parse_sql(&MySqlDialect {}, sql)
            .map_err(|e| SqlError::Parse(e.to_string()))?;
        match statements.len() {
            0 => Err(SqlError::Empty),
            1 => Ok(statements.remove(0)),
            n => Err(SqlError::MultipleStatements(n)),
        }
    }

    fn convert(&self, text: &str, statement: &Statement) -> ParsedStatement {
        let (kind, body) = match statement {
            Statement::CreateTable(create) => {
                let mut model = ddl::create_table(create);
                recover::fill_table_options(text, &mut model);
                (SqlKind::CreateTable, StatementBody::CreateTable(model))
            }
            Statement::AlterTable {
                name, operations, ..
            } => (
                SqlKind::AlterTable,
                StatementBody::AlterTable(ddl::alter_table(name, operations)),
            ),
            Statement::CreateIndex(index) => (
                SqlKind::CreateIndex,
                StatementBody::AlterTable(ddl::create_index(index)),
            ),
            Statement::Drop {
                object_type, names, ..
            } => drop_statement(&object_type.to_string(), names, text),
            Statement::CreateDatabase { db_name, .. } => (
                SqlKind::CreateDatabase,
                StatementBody::CreateDatabase {
                    name: last_ident(db_name),
                    charset: recover::database_charset(text),
                },
            ),
            Statement::CreateSchema { schema_name, .. } => (
                SqlKind::CreateDatabase,
                StatementBody::CreateDatabase {
                    name: unquote(&schema_name.to_string()),
                    charset: recover::database_charset(text),
                },
            ),
            Statement::Use(_) => (
                SqlKind::UseDatabase,
                StatementBody::Use {
                    database: use_target(text),
                },
            ),
            Statement::SetVariable { .. } | Statement::SetNames { .. } => {
                (SqlKind::Set, StatementBody::Set)
            }
            Statement::Truncate { .. } => match recover::truncate_target(text) {
                Some(table) => (SqlKind::Truncate, StatementBody::Truncate { table }),
                None => (SqlKind::Truncate, StatementBody::Other { tables: Vec::new() }),
            },
            Statement::Insert(insert) => dml::insert(insert),
            Statement::Update {
                table,
                assignments,
                selection,
                ..
            } => {
                let parsed = ParsedStatement {
                    kind: SqlKind::Update,
                    text: text.to_string(),
                    body: StatementBody::Update(dml::update(table, assignments, selection.as_ref())),
                };
                let order_by = scan::find_top_level_word(text, "ORDER").is_some();
                let limit = scan::find_top_level_word(text, "LIMIT").is_some();
                return dml::with_trailing_clauses(parsed, order_by, limit);
            }
            Statement::Delete(delete) => (SqlKind::Delete, StatementBody::Delete(dml::delete(delete))),
            Statement::Query(query) => (SqlKind::Select, StatementBody::Select(dml::select(query))),
            Statement::CreateView { name, .. } => (
                SqlKind::CreateView,
                StatementBody::Other {
                    tables: vec![table_ref(name)],
                },
            ),
            _ => classify_by_keywords(text),
        };

        ParsedStatement {
            kind,
            text: text.to_string(),
            body,
        }
    }
}

impl StatementParser for MySqlParser {
    fn parse(&self, sql: &str) -> Result<ParsedStatement, SqlError> {
        let text = sql.trim().trim_end_matches(';').trim_end();
        if scan::strip_comments(text).trim().is_empty() {
            return Err(SqlError::Empty);
        }

        match self.parse_ast(text) {
            Ok(statement) => Ok(self.convert(text, &statement)),
            Err(SqlError::Parse(message)) => match recover::recover(self, text) {
                Some(parsed) => {
                    tracing::debug!(kind = %parsed.kind, "Recovered statement sqlparser rejected");
                    Ok(parsed)
                }
                None => Err(SqlError::Parse(message)),
            },
            Err(other) => Err(other),
        }
    }
}

fn drop_statement(object_type: &str, names: &[ObjectName], text: &str) -> (SqlKind, StatementBody) {
    let tables: Vec<TableRef> = names.iter().map(table_ref).collect();
    match object_type {
        "TABLE" => (SqlKind::DropTable, StatementBody::DropTable { tables }),
        "VIEW" => (SqlKind::DropView, StatementBody::Other { tables }),
        "SCHEMA" | "DATABASE" => (
            SqlKind::DropDatabase,
            StatementBody::DropDatabase {
                name: names.first().map(last_ident).unwrap_or_default(),
            },
        ),
        _ => classify_by_keywords(text),
    }
}

/// Kind from leading keywords, for statements with no dedicated body.
pub(crate) fn classify_by_keywords(text: &str) -> (SqlKind, StatementBody) {
    let toks = scan::tokens(text);
    let words: Vec<String> = toks
        .iter()
        .take(8)
        .filter_map(|t| t.word().map(str::to_ascii_uppercase))
        .collect();
    let first = words.first().map(String::as_str).unwrap_or_default();
    let has = |w: &str| words.iter().skip(1).any(|x| x == w);

    let kind = match first {
        "SET" => return (SqlKind::Set, StatementBody::Set),
        "GRANT" => SqlKind::Grant,
        "REVOKE" => SqlKind::Revoke,
        "LOCK" => SqlKind::LockTables,
        "UNLOCK" => SqlKind::UnlockTables,
        "RENAME" if has("TABLE") => SqlKind::RenameTable,
        "CREATE" if has("USER") => SqlKind::CreateUser,
        "CREATE" if has("TRIGGER") => SqlKind::CreateTrigger,
        "CREATE" if has("VIEW") => SqlKind::CreateView,
        "DROP" if has("USER") => SqlKind::DropUser,
        "DROP" if has("TRIGGER") => SqlKind::DropTrigger,
        "DROP" if has("VIEW") => SqlKind::DropView,
        "ALTER" if has("DATABASE") || has("SCHEMA") => SqlKind::AlterDatabase,
        _ => SqlKind::Other,
    };
    (kind, StatementBody::Other { tables: Vec::new() })
}

/// `db.table` or `table`.
pub(crate) fn table_ref(name: &ObjectName) -> TableRef {
    let parts: Vec<&str> = name.0.iter().map(|ident| ident.value.as_str()).collect();
    match parts.as_slice() {
        [.., db, table] => TableRef::new(Some(*db), *table),
        [table] => TableRef::new(None, *table),
        [] => TableRef::new(None, ""),
    }
}

pub(crate) fn last_ident(name: &ObjectName) -> String {
    name.0.last().map(|i| i.value.clone()).unwrap_or_default()
}

/// Strip one level of backticks or double quotes.
pub(crate) fn unquote(name: &str) -> String {
    let name = name.trim();
    for quote in ['`', '"'] {
        if let Some(inner) = name
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    name.to_string()
}

/// Database named by `USE db`, `USE DATABASE db` or `USE SCHEMA db`.
fn use_target(text: &str) -> String {
    let toks = scan::tokens(text);
    toks.iter()
        .skip(1)
        .filter(|t| !t.is_kw("DATABASE") && !t.is_kw("SCHEMA"))
        .find_map(Token::word)
        .map(str::to_string)
        .unwrap_or_default()
}
