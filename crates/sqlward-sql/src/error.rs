//! Error types for the SQL crate.

use thiserror::Error;

/// Errors produced while turning statement text into the statement model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlError {
    /// The parser rejected the text.
    #[error("{0}")]
    Parse(String),

    /// Nothing but whitespace and comments.
    #[error("empty statement")]
    Empty,

    /// More than one statement was passed to a single-statement parse.
    #[error("expected one statement, found {0}")]
    MultipleStatements(usize),
}
