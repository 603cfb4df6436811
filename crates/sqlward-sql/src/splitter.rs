//! Splits a client message into individual statements.

use crate::scan::{SegmentKind, segments};

/// Split `input` on `;` outside quotes, backticks and comments.
///
/// A comment before a statement stays attached to it, which is how session
/// markers such as `/*--host=...;inception_magic_start;*/` reach the session
/// together with the statement that follows them. Pieces that are empty after
/// trimming are dropped; comment-only pieces are kept.
pub fn split_statements(input: &str) -> Vec<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;

    for (kind, range) in segments(input) {
        if kind != SegmentKind::Code {
            continue;
        }
        for pos in range {
            if bytes[pos] == b';' {
                push_piece(&mut out, &input[start..pos]);
                start = pos + 1;
            }
        }
    }
    push_piece(&mut out, &input[start..]);
    out
}

fn push_piece(out: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        out.push(piece.to_string());
    }
}

/// Cut `text` at its first top-level `;`, for reporting a statement that
/// failed to parse.
pub fn truncate_at_terminator(text: &str) -> &str {
    let bytes = text.as_bytes();
    for (kind, range) in segments(text) {
        if kind != SegmentKind::Code {
            continue;
        }
        if let Some(pos) = range.clone().find(|&p| bytes[p] == b';') {
            return text[..pos].trim_end();
        }
    }
    text.trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_basic() {
        let parts = split_statements("USE db; CREATE TABLE t (id INT);\n INSERT INTO t VALUES (1);");
        assert_eq!(
            parts,
            vec!["USE db", "CREATE TABLE t (id INT)", "INSERT INTO t VALUES (1)"]
        );
    }

    #[test]
    fn test_split_keeps_marker_comment_with_statement() {
        let input = "/*--user=root;--password=x;--host=127.0.0.1;--port=3306;--enable-check=1;inception_magic_start;*/\ninception_magic_start;\nuse db;";
        let parts = split_statements(input);
        assert_eq!(parts.len(), 2);
        assert!(parts[0].starts_with("/*--user=root"));
        assert!(parts[0].ends_with("inception_magic_start"));
        assert_eq!(parts[1], "use db");
    }

    #[test]
    fn test_split_ignores_semicolons_in_literals() {
        let parts = split_statements("INSERT INTO t VALUES ('a;b', \"c;d\"); SELECT `x;y` FROM t -- z;\n");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], "INSERT INTO t VALUES ('a;b', \"c;d\")");
    }

    #[test]
    fn test_comment_only_piece_is_kept() {
        let parts = split_statements("SELECT 1;\n/*--user=root;inception_magic_commit;*/");
        assert_eq!(parts, vec!["SELECT 1", "/*--user=root;inception_magic_commit;*/"]);
    }

    #[test]
    fn test_truncate_at_terminator() {
        assert_eq!(truncate_at_terminator("SELEC 1; SELECT 2"), "SELEC 1");
        assert_eq!(truncate_at_terminator("SELECT ';'"), "SELECT ';'");
    }
}
