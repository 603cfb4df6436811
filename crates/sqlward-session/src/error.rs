//! Error types for the session crate.

use thiserror::Error;

/// Errors returned to the client for a single statement.
///
/// The `Display` text is exactly what the client sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The start marker carried an invalid option.
    #[error("Failed to parse inception_magic_start comment")]
    InvalidMarker,

    /// Commit marker outside a session.
    #[error("inception_magic_commit without inception_magic_start")]
    CommitWithoutStart,

    /// Ordinary statement outside a session.
    #[error("Statement must be wrapped in an inception_magic_start/commit bracket.")]
    NotInSession,

    /// Malformed administrative command; carries the usage text.
    #[error("{0}")]
    Usage(String),

    /// `inception <verb> <unknown>`.
    #[error("Unknown inception {verb} command. Supported: {supported}")]
    UnknownCommand {
        verb: &'static str,
        supported: &'static str,
    },

    /// Admin command addressed a session that is not running.
    #[error("Thread {0} not found or not in active inception session.")]
    SessionNotFound(u32),

    #[error(
        "inception_password_encrypt_key is not set. Configure security.encrypt_key in sqlward.yaml first."
    )]
    EncryptKeyMissing,

    /// `inception set` named an unknown rule or gave a bad value.
    #[error("{0}")]
    InvalidSetting(String),

    #[error("{0}")]
    Crypto(#[from] CryptoError),
}

/// Password encryption and decryption failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("encrypted password must start with AES:")]
    MissingPrefix,

    #[error("invalid base64: {0}")]
    Base64(String),

    #[error("ciphertext length {0} is not a multiple of the block size")]
    BlockLength(usize),

    #[error("invalid padding")]
    Padding,

    #[error("decrypted password is not valid UTF-8")]
    Utf8,
}
