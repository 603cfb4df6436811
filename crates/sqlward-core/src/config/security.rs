//! Credential defaults and the password encryption key.

use serde::{Deserialize, Serialize};

/// Credentials used when a session marker omits them.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Key for `AES:` encrypted passwords in session markers.
    #[serde(default)]
    pub encrypt_key: Option<String>,

    /// Target user when the marker has no `--user`.
    #[serde(default)]
    pub default_user: Option<String>,

    /// Target password when the marker has no `--password`.
    #[serde(default)]
    pub default_password: Option<String>,
}

impl SecurityConfig {
    /// The encryption key, if one is configured and non-empty.
    pub fn key(&self) -> Option<&str> {
        self.encrypt_key.as_deref().filter(|k| !k.is_empty())
    }
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("encrypt_key", &self.encrypt_key.as_ref().map(|_| "<redacted>"))
            .field("default_user", &self.default_user)
            .field(
                "default_password",
                &self.default_password.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
