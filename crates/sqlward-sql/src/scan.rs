//! Quote- and comment-aware scanning of raw statement text.
//!
//! Shared by the splitter, the bracket-marker lookup and the lexical fallback
//! for MySQL syntax the parser rejects. Only ASCII delimiters are matched, so
//! every range lands on a UTF-8 boundary.

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SegmentKind {
    Code,
    /// `'...'`, `"..."` or `` `...` ``, delimiters included.
    Quoted,
    LineComment,
    BlockComment,
}

/// Cut `text` into code, quoted and comment segments.
pub(crate) fn segments(text: &str) -> Vec<(SegmentKind, Range<usize>)> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    let mut code_start = 0;

    while i < bytes.len() {
        let found = match bytes[i] {
            b'\'' | b'"' | b'`' => Some((SegmentKind::Quoted, quoted_end(bytes, i))),
            b'#' => Some((SegmentKind::LineComment, line_end(bytes, i))),
            b'-' if bytes.get(i + 1) == Some(&b'-')
                && bytes.get(i + 2).is_none_or(|c| c.is_ascii_whitespace()) =>
            {
                Some((SegmentKind::LineComment, line_end(bytes, i)))
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                Some((SegmentKind::BlockComment, block_end(bytes, i)))
            }
            _ => None,
        };

        match found {
            Some((kind, end)) => {
                if code_start < i {
                    out.push((SegmentKind::Code, code_start..i));
                }
                out.push((kind, i..end));
                i = end;
                code_start = end;
            }
            None => i += 1,
        }
    }
    if code_start < bytes.len() {
        out.push((SegmentKind::Code, code_start..bytes.len()));
    }
    out
}

fn quoted_end(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut j = start + 1;
    while j < bytes.len() {
        if bytes[j] == b'\\' && quote != b'`' {
            j += 2;
            continue;
        }
        if bytes[j] == quote {
            if bytes.get(j + 1) == Some(&quote) {
                j += 2;
                continue;
            }
            return j + 1;
        }
        j += 1;
    }
    bytes.len()
}

fn line_end(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |p| start + p)
}

fn block_end(bytes: &[u8], start: usize) -> usize {
    bytes[start + 2..]
        .windows(2)
        .position(|w| w == b"*/")
        .map_or(bytes.len(), |p| start + 2 + p + 2)
}

/// Byte positions of code at parenthesis depth zero.
pub(crate) fn top_level_positions(text: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut out = Vec::new();
    for (kind, range) in segments(text) {
        if kind != SegmentKind::Code {
            continue;
        }
        for pos in range {
            match bytes[pos] {
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                _ if depth == 0 => out.push(pos),
                _ => {}
            }
        }
    }
    out
}

/// Split on `separator` at depth zero, outside quotes and comments.
pub(crate) fn split_top_level(text: &str, separator: u8) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    for pos in top_level_positions(text) {
        if bytes[pos] == separator {
            parts.push(&text[start..pos]);
            start = pos + 1;
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Start of the first depth-zero occurrence of the keyword `word`.
pub(crate) fn find_top_level_word(text: &str, word: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let is_ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_' || b == b'$';
    let positions = top_level_positions(text);
    positions.iter().copied().find(|&pos| {
        let end = pos + word.len();
        end <= bytes.len()
            && bytes[pos..end].eq_ignore_ascii_case(word.as_bytes())
            && (pos == 0 || !is_ident(bytes[pos - 1]))
            && bytes.get(end).is_none_or(|&b| !is_ident(b))
            && positions.binary_search(&(end - 1)).is_ok()
    })
}

/// Position of the `)` matching the `(` at `open`.
pub(crate) fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    for (kind, range) in segments(text) {
        if kind != SegmentKind::Code || range.end <= open {
            continue;
        }
        for pos in range.start.max(open)..range.end {
            match bytes[pos] {
                b'(' => depth += 1,
                b')' => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(pos);
                    }
                }
                _ => {}
            }
        }
    }
    None
}

/// Text with comments replaced by a single space.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (kind, range) in segments(text) {
        match kind {
            SegmentKind::Code | SegmentKind::Quoted => out.push_str(&text[range]),
            SegmentKind::LineComment | SegmentKind::BlockComment => out.push(' '),
        }
    }
    out
}

/// Byte range of every `/* ... */` comment, in order.
pub fn block_comments(text: &str) -> Vec<Range<usize>> {
    segments(text)
        .into_iter()
        .filter(|(kind, _)| *kind == SegmentKind::BlockComment)
        .map(|(_, range)| range)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    /// Bare or backtick-quoted word.
    Word(String),
    /// Single- or double-quoted string, unquoted.
    Str(String),
    Punct(char),
}

impl Token {
    pub(crate) fn is_kw(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }

    pub(crate) fn word(&self) -> Option<&str> {
        match self {
            Token::Word(w) => Some(w),
            _ => None,
        }
    }

    pub(crate) fn text(&self) -> Option<&str> {
        match self {
            Token::Word(w) | Token::Str(w) => Some(w),
            Token::Punct(_) => None,
        }
    }
}

/// Words, strings and punctuation, comments dropped.
pub(crate) fn tokens(text: &str) -> Vec<Token> {
    let mut out = Vec::new();
    for (kind, range) in segments(text) {
        let piece = &text[range];
        match kind {
            SegmentKind::Quoted => {
                let quote = piece.as_bytes()[0];
                let inner = piece
                    .get(1..piece.len().saturating_sub(1).max(1))
                    .unwrap_or_default();
                if quote == b'`' {
                    out.push(Token::Word(inner.replace("``", "`")));
                } else {
                    out.push(Token::Str(inner.to_string()));
                }
            }
            SegmentKind::Code => {
                let mut word = String::new();
                for c in piece.chars() {
                    if c.is_alphanumeric() || c == '_' || c == '$' || c == '@' {
                        word.push(c);
                        continue;
                    }
                    if !word.is_empty() {
                        out.push(Token::Word(std::mem::take(&mut word)));
                    }
                    if !c.is_whitespace() {
                        out.push(Token::Punct(c));
                    }
                }
                if !word.is_empty() {
                    out.push(Token::Word(word));
                }
            }
            SegmentKind::LineComment | SegmentKind::BlockComment => {}
        }
    }
    out
}
