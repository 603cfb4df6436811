//! Error types for the proxy crate.

use thiserror::Error;

/// Errors that can occur in the wire front end.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Failed to bind to the listen address.
    #[error("failed to bind to {address}: {source}")]
    BindFailed {
        address: String,
        source: std::io::Error,
    },

    /// Failed to accept a connection.
    #[error("failed to accept connection: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Client credentials were rejected.
    #[error("authentication failed for user {0}")]
    AuthenticationFailed(String),

    /// A query arrived before authentication completed.
    #[error("no session for this connection")]
    NoSession,
}
