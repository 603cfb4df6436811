//! Lexical recovery for MySQL syntax `sqlparser` rejects.
//!
//! Each recognizer handles one statement shape and returns `None` when the
//! text does not match it, in which case the original parse error stands.

use super::{MySqlParser, classify_by_keywords, ddl, dml, unquote};
use crate::model::{
    AlterOp, AlterTable, CreateTable, IndexDef, IndexKind, IndexPart, ParsedStatement, SqlKind,
    StatementBody, TableRef,
};
use crate::scan::{self, Token};
use regex::Regex;
use sqlparser::ast::Statement;
use std::sync::LazyLock;

static ALTER_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^\s*ALTER\s+(?:ONLINE\s+|IGNORE\s+)*TABLE\s+((?:`[^`]+`|[\w$]+)(?:\s*\.\s*(?:`[^`]+`|[\w$]+))?)(.*)$",
    )
    .expect("static pattern")
});

static KEY_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(`[^`]+`|[\w$]+)\s*\(\s*(\d+)\s*\)").expect("static pattern")
});

pub(super) fn recover(parser: &MySqlParser, text: &str) -> Option<ParsedStatement> {
    let toks = scan::tokens(text);
    let word = |i: usize| {
        toks.get(i)
            .and_then(Token::word)
            .map(str::to_ascii_uppercase)
            .unwrap_or_default()
    };

    let recovered = match (word(0).as_str(), word(1).as_str()) {
        ("CREATE", "TABLE" | "TEMPORARY") => create_table(parser, text),
        ("CREATE", "DATABASE" | "SCHEMA") => create_database(&toks, text),
        ("DROP", "DATABASE" | "SCHEMA") => drop_database(&toks),
        ("CREATE", "INDEX" | "UNIQUE" | "FULLTEXT" | "SPATIAL") => create_index(&toks),
        ("DROP", "INDEX") => drop_index(&toks),
        ("RENAME", "TABLE") => rename_table(&toks),
        ("ALTER", _) => alter_table(parser, text),
        ("UPDATE" | "DELETE", _) => return trailing_clauses(parser, text),
        _ => None,
    };

    match recovered {
        Some((kind, body)) => Some(ParsedStatement {
            kind,
            text: text.to_string(),
            body,
        }),
        None => {
            let (kind, body) = classify_by_keywords(text);
            (kind != SqlKind::Other).then(|| ParsedStatement {
                kind,
                text: text.to_string(),
                body,
            })
        }
    }
}

type Recovered = Option<(SqlKind, StatementBody)>;

fn word_at(toks: &[Token], i: usize) -> Option<&str> {
    toks.get(i).and_then(Token::word)
}

/// Skip `IF [NOT] EXISTS` starting at `i`.
fn skip_if_exists(toks: &[Token], mut i: usize) -> usize {
    if toks.get(i).is_some_and(|t| t.is_kw("IF")) {
        i += 1;
        if toks.get(i).is_some_and(|t| t.is_kw("NOT")) {
            i += 1;
        }
        if toks.get(i).is_some_and(|t| t.is_kw("EXISTS")) {
            i += 1;
        }
    }
    i
}

/// `db.table` or `table` at `i`; returns the reference and the next index.
fn qualified_name(toks: &[Token], i: usize) -> Option<(TableRef, usize)> {
    let first = word_at(toks, i)?;
    if toks.get(i + 1) == Some(&Token::Punct('.')) {
        if let Some(second) = word_at(toks, i + 2) {
            return Some((TableRef::new(Some(first), second), i + 3));
        }
    }
    Some((TableRef::new(None, first), i + 1))
}

/// Value of `key [=] value`, where `key` may span several words.
fn option_value(toks: &[Token], key: &[&str]) -> Option<String> {
    let start = (0..toks.len()).find(|&i| {
        key.iter()
            .enumerate()
            .all(|(k, kw)| toks.get(i + k).is_some_and(|t| t.is_kw(kw)))
    })?;
    let mut i = start + key.len();
    if toks.get(i) == Some(&Token::Punct('=')) {
        i += 1;
    }
    toks.get(i).and_then(Token::text).map(str::to_string)
}

fn charset_value(toks: &[Token]) -> Option<String> {
    option_value(toks, &["CHARSET"]).or_else(|| option_value(toks, &["CHARACTER", "SET"]))
}

/// Character set named in a CREATE DATABASE statement.
pub(super) fn database_charset(text: &str) -> Option<String> {
    charset_value(&scan::tokens(text))
}

/// Table named by `TRUNCATE [TABLE] name`.
pub(super) fn truncate_target(text: &str) -> Option<TableRef> {
    let toks = scan::tokens(text);
    let i = if toks.get(1).is_some_and(|t| t.is_kw("TABLE")) { 2 } else { 1 };
    qualified_name(&toks, i).map(|(table, _)| table)
}

/// Fill table options the AST did not carry from the text after the column list.
pub(super) fn fill_table_options(text: &str, create: &mut CreateTable) {
    let clean = scan::strip_comments(text);
    let Some(open) = clean.find('(') else {
        return;
    };
    let head = scan::tokens(&clean[..open]);
    if head.iter().any(|t| t.is_kw("SELECT") || t.is_kw("LIKE")) {
        return;
    }
    let Some(close) = scan::matching_paren(&clean, open) else {
        return;
    };
    let tail = scan::tokens(&clean[close + 1..]);

    if create.engine.is_none() {
        create.engine = option_value(&tail, &["ENGINE"]);
    }
    if create.charset.is_none() {
        create.charset = charset_value(&tail);
    }
    if create.comment.is_none() {
        create.comment = option_value(&tail, &["COMMENT"]);
    }
    if create.auto_increment.is_none() {
        create.auto_increment =
            option_value(&tail, &["AUTO_INCREMENT"]).and_then(|v| v.parse().ok());
    }
    let pos = |kw: &str| tail.iter().position(|t| t.is_kw(kw));
    if pos("PARTITION").is_some_and(|i| tail.get(i + 1).is_some_and(|t| t.is_kw("BY"))) {
        create.partitioned = true;
    }
    if pos("SELECT").is_some() {
        create.from_select = true;
    }
}

fn is_key_definition(definition: &str) -> bool {
    let toks = scan::tokens(definition);
    toks.first().is_some_and(|t| {
        ["PRIMARY", "UNIQUE", "KEY", "INDEX", "FULLTEXT", "SPATIAL", "CONSTRAINT"]
            .iter()
            .any(|kw| t.is_kw(kw))
    })
}

/// CREATE TABLE with index prefix lengths or trailing options the parser rejects.
fn create_table(parser: &MySqlParser, text: &str) -> Recovered {
    let clean = scan::strip_comments(text);
    let open = clean.find('(')?;
    let close = scan::matching_paren(&clean, open)?;

    let mut prefixes: Vec<(String, u32)> = Vec::new();
    let definitions: Vec<String> = scan::split_top_level(&clean[open + 1..close], b',')
        .into_iter()
        .map(|definition| {
            if !is_key_definition(definition) {
                return definition.to_string();
            }
            for caps in KEY_PREFIX.captures_iter(definition) {
                if let Ok(len) = caps[2].parse() {
                    prefixes.push((unquote(&caps[1]), len));
                }
            }
            KEY_PREFIX.replace_all(definition, "$1").into_owned()
        })
        .collect();

    let head = format!("{}({})", &clean[..open], definitions.join(","));
    let Statement::CreateTable(create) = parser.parse_ast(&head).ok()? else {
        return None;
    };

    let mut model = ddl::create_table(&create);
    for part in model.indexes.iter_mut().flat_map(|i| i.parts.iter_mut()) {
        if let Some((_, len)) = prefixes
            .iter()
            .find(|(column, _)| column.eq_ignore_ascii_case(&part.column))
        {
            part.prefix = Some(*len);
        }
    }
    fill_table_options(&clean, &mut model);
    Some((SqlKind::CreateTable, StatementBody::CreateTable(model)))
}

fn create_database(toks: &[Token], text: &str) -> Recovered {
    let i = skip_if_exists(toks, 2);
    let name = word_at(toks, i)?.to_string();
    Some((
        SqlKind::CreateDatabase,
        StatementBody::CreateDatabase {
            name,
            charset: database_charset(text),
        },
    ))
}

fn drop_database(toks: &[Token]) -> Recovered {
    let i = skip_if_exists(toks, 2);
    let name = word_at(toks, i)?.to_string();
    Some((SqlKind::DropDatabase, StatementBody::DropDatabase { name }))
}

/// Column list starting at the `(` at `open`, with optional prefix lengths.
fn index_parts(toks: &[Token], open: usize) -> Vec<IndexPart> {
    let mut parts: Vec<IndexPart> = Vec::new();
    let mut depth = 0usize;
    let mut expecting = true;
    for (i, tok) in toks.iter().enumerate().skip(open) {
        match tok {
            Token::Punct('(') => {
                depth += 1;
                if depth == 2 {
                    if let (Some(len), Some(last)) = (word_at(toks, i + 1), parts.last_mut()) {
                        last.prefix = len.parse().ok();
                    }
                }
            }
            Token::Punct(')') => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    break;
                }
            }
            Token::Punct(',') if depth == 1 => expecting = true,
            Token::Word(column) if depth == 1 && expecting => {
                parts.push(IndexPart::new(column));
                expecting = false;
            }
            _ => {}
        }
    }
    parts
}

/// `[CONSTRAINT [sym]] PRIMARY KEY | UNIQUE | INDEX | KEY | FULLTEXT ... (parts)`.
fn key_definition(toks: &[Token]) -> Option<IndexDef> {
    let mut i = 0;
    if toks.first().is_some_and(|t| t.is_kw("CONSTRAINT")) {
        i += 1;
        let keyword = ["PRIMARY", "UNIQUE", "FOREIGN"];
        if toks.get(i).is_some_and(|t| !keyword.iter().any(|k| t.is_kw(k))) {
            i += 1;
        }
    }

    let first = word_at(toks, i)?.to_ascii_uppercase();
    i += 1;
    let kind = match first.as_str() {
        "PRIMARY" => IndexKind::Primary,
        "UNIQUE" => IndexKind::Unique,
        "FULLTEXT" => IndexKind::Fulltext,
        "FOREIGN" => IndexKind::Foreign,
        "SPATIAL" | "INDEX" | "KEY" => IndexKind::Normal,
        _ => return None,
    };
    if toks.get(i).is_some_and(|t| t.is_kw("KEY") || t.is_kw("INDEX")) {
        i += 1;
    }

    let open = toks.iter().skip(i).position(|t| *t == Token::Punct('('))? + i;
    let name = if kind == IndexKind::Primary {
        Some("PRIMARY".to_string())
    } else {
        toks[i..open]
            .iter()
            .find(|t| !t.is_kw("USING"))
            .and_then(Token::word)
            .map(str::to_string)
    };
    Some(IndexDef {
        name,
        kind,
        parts: index_parts(toks, open),
    })
}

fn create_index(toks: &[Token]) -> Recovered {
    let kind = if toks.get(1).is_some_and(|t| t.is_kw("UNIQUE")) {
        IndexKind::Unique
    } else if toks.get(1).is_some_and(|t| t.is_kw("FULLTEXT")) {
        IndexKind::Fulltext
    } else {
        IndexKind::Normal
    };
    let index_kw = toks.iter().position(|t| t.is_kw("INDEX"))?;
    let name = word_at(toks, index_kw + 1)?.to_string();
    let on = toks.iter().position(|t| t.is_kw("ON"))?;
    let (table, next) = qualified_name(toks, on + 1)?;
    let open = toks.iter().skip(next).position(|t| *t == Token::Punct('('))? + next;

    let index = IndexDef {
        name: Some(name),
        kind,
        parts: index_parts(toks, open),
    };
    Some((
        SqlKind::CreateIndex,
        StatementBody::AlterTable(ddl::single_op(table, AlterOp::AddIndex(index))),
    ))
}

fn drop_index(toks: &[Token]) -> Recovered {
    let name = word_at(toks, 2)?.to_string();
    if !toks.get(3).is_some_and(|t| t.is_kw("ON")) {
        return None;
    }
    let (table, _) = qualified_name(toks, 4)?;
    Some((
        SqlKind::DropIndex,
        StatementBody::AlterTable(ddl::single_op(table, AlterOp::DropIndex(name))),
    ))
}

fn rename_table(toks: &[Token]) -> Recovered {
    let (from, next) = qualified_name(toks, 2)?;
    if !toks.get(next).is_some_and(|t| t.is_kw("TO")) {
        return None;
    }
    let (to, _) = qualified_name(toks, next + 1)?;
    Some((
        SqlKind::RenameTable,
        StatementBody::AlterTable(ddl::single_op(from, AlterOp::RenameTable(to))),
    ))
}

/// ALTER TABLE where some clause is MySQL-only: clauses are parsed one at a
/// time and the ones the parser rejects are classified lexically.
fn alter_table(parser: &MySqlParser, text: &str) -> Recovered {
    let clean = scan::strip_comments(text);
    let caps = ALTER_HEAD.captures(&clean)?;
    let raw_name = caps.get(1)?.as_str();
    let rest = caps.get(2)?.as_str();
    let (table, _) = qualified_name(&scan::tokens(raw_name), 0)?;

    let mut ops = Vec::new();
    for clause in scan::split_top_level(rest, b',') {
        let clause = clause.trim();
        if clause.is_empty() {
            continue;
        }
        match parser.parse_ast(&format!("ALTER TABLE {raw_name} {clause}")) {
            Ok(Statement::AlterTable { name, operations, .. }) => {
                ops.extend(ddl::alter_table(&name, &operations).ops)
            }
            _ => ops.push(alter_clause(clause)),
        }
    }
    if ops.is_empty() {
        return None;
    }
    Some((
        SqlKind::AlterTable,
        StatementBody::AlterTable(AlterTable { table, ops }),
    ))
}

fn alter_clause(clause: &str) -> AlterOp {
    let toks = scan::tokens(clause);
    let kw = |i: usize, w: &str| toks.get(i).is_some_and(|t| t.is_kw(w));
    let first = word_at(&toks, 0).unwrap_or_default().to_ascii_uppercase();

    match first.as_str() {
        "ENGINE" => AlterOp::Options {
            engine: option_value(&toks, &["ENGINE"]),
        },
        "DEFAULT" | "CHARSET" | "CHARACTER" | "CONVERT" | "COLLATE" | "COMMENT"
        | "AUTO_INCREMENT" | "ROW_FORMAT" | "KEY_BLOCK_SIZE" => AlterOp::Options { engine: None },
        "RENAME" if kw(1, "INDEX") || kw(1, "KEY") => match (word_at(&toks, 2), word_at(&toks, 4)) {
            (Some(from), Some(to)) if kw(3, "TO") => AlterOp::RenameIndex {
                from: from.to_string(),
                to: to.to_string(),
            },
            _ => AlterOp::Other(clause.to_string()),
        },
        "RENAME" => {
            let at = if kw(1, "TO") || kw(1, "AS") { 2 } else { 1 };
            match qualified_name(&toks, at) {
                Some((table, _)) => AlterOp::RenameTable(table),
                None => AlterOp::Other(clause.to_string()),
            }
        }
        "DROP" if kw(1, "PRIMARY") => AlterOp::DropIndex("PRIMARY".to_string()),
        "DROP" if kw(1, "INDEX") || kw(1, "KEY") => match word_at(&toks, 2) {
            Some(name) => AlterOp::DropIndex(name.to_string()),
            None => AlterOp::Other(clause.to_string()),
        },
        "DROP" if kw(1, "PARTITION") => AlterOp::DropPartition,
        "ADD" if kw(1, "PARTITION") => AlterOp::AddPartition,
        "ADD" => match key_definition(&toks[1..]) {
            Some(index) => AlterOp::AddIndex(index),
            None => AlterOp::Other(clause.to_string()),
        },
        "TRUNCATE" | "COALESCE" | "REMOVE" => AlterOp::DropPartition,
        "PARTITION" | "REORGANIZE" | "EXCHANGE" | "REBUILD" => AlterOp::AddPartition,
        _ => AlterOp::Other(clause.to_string()),
    }
}

/// UPDATE/DELETE with MySQL's trailing ORDER BY / LIMIT.
fn trailing_clauses(parser: &MySqlParser, text: &str) -> Option<ParsedStatement> {
    let clean = scan::strip_comments(text);
    let order = scan::find_top_level_word(&clean, "ORDER").filter(|&pos| {
        scan::tokens(&clean[pos..])
            .get(1)
            .is_some_and(|t| t.is_kw("BY"))
    });
    let limit = scan::find_top_level_word(&clean, "LIMIT");
    let cut = [order, limit].into_iter().flatten().min()?;

    let statement = parser.parse_ast(clean[..cut].trim_end()).ok()?;
    let parsed = parser.convert(text, &statement);
    Some(dml::with_trailing_clauses(parsed, order.is_some(), limit.is_some()))
}
