//! Statement fingerprints.
//!
//! Literals are replaced by `?` and IN lists collapsed to a single element
//! before hashing, so statements that differ only in constant values share a
//! fingerprint.

use crate::parser::MySqlParser;
use crate::scan::{SegmentKind, segments};
use sha2::{Digest, Sha256};
use sqlparser::ast::{Expr, Value, visit_expressions_mut};
use std::ops::ControlFlow;

/// SHA-256 (lower hex) of the normalized statement. `None` for empty input.
pub fn fingerprint(sql: &str) -> Option<String> {
    let normalized = normalize(sql);
    if normalized.is_empty() {
        return None;
    }
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    Some(format!("{:x}", hasher.finalize()))
}

/// Literal-free rendering of `sql`.
///
/// Uses the parser when it accepts the statement, otherwise a text-level
/// normalization that blanks quoted strings and numbers and collapses
/// whitespace.
pub fn normalize(sql: &str) -> String {
    let text = sql.trim().trim_end_matches(';').trim_end();
    match MySqlParser::new().parse_ast(text) {
        Ok(mut statement) => {
            let _ = visit_expressions_mut(&mut statement, |expr| {
                match expr {
                    Expr::Value(value) => *value = Value::Placeholder("?".to_string()),
                    Expr::InList { list, .. } => list.truncate(1),
                    _ => {}
                }
                ControlFlow::<()>::Continue(())
            });
            statement.to_string()
        }
        Err(_) => normalize_text(text),
    }
}

fn normalize_text(text: &str) -> String {
    let mut flat = String::with_capacity(text.len());
    for (kind, range) in segments(text) {
        let piece = &text[range];
        match kind {
            SegmentKind::Quoted if piece.starts_with('`') => flat.push_str(piece),
            SegmentKind::Quoted => flat.push_str(" ? "),
            SegmentKind::Code => flat.push_str(&piece.to_ascii_uppercase()),
            SegmentKind::LineComment | SegmentKind::BlockComment => flat.push(' '),
        }
    }

    let mut out = String::with_capacity(flat.len());
    for word in flat.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        if word.chars().all(|c| c.is_ascii_digit() || c == '.') {
            out.push('?');
        } else {
            out.push_str(word);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals_do_not_change_fingerprint() {
        assert_eq!(
            fingerprint("SELECT * FROM t WHERE id=1"),
            fingerprint("SELECT * FROM t WHERE id=2")
        );
        assert_eq!(
            fingerprint("SELECT * FROM t WHERE name = 'alice'"),
            fingerprint("select *  from t where name='bob';")
        );
    }

    #[test]
    fn test_structure_changes_fingerprint() {
        assert_ne!(
            fingerprint("SELECT * FROM t WHERE id=1"),
            fingerprint("SELECT name FROM t WHERE id=1")
        );
    }

    #[test]
    fn test_in_lists_collapse() {
        assert_eq!(
            fingerprint("DELETE FROM t WHERE id IN (1, 2, 3)"),
            fingerprint("DELETE FROM t WHERE id IN (4)")
        );
    }

    #[test]
    fn test_fallback_for_unparseable_text() {
        let a = fingerprint("FROBNICATE t WITH 'x' 10").unwrap();
        let b = fingerprint("frobnicate   t with 'y' 11").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(fingerprint("  ;"), None);
    }
}
