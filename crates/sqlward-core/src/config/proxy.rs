//! Proxy configuration types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for the client-facing wire protocol listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Port to listen on for incoming client connections.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Maximum number of concurrent client connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Client credentials (user -> password). Empty accepts any client.
    #[serde(default)]
    pub users: HashMap<String, String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            listen_port: default_listen_port(),
            max_connections: default_max_connections(),
            users: HashMap::new(),
        }
    }
}

impl ProxyConfig {
    /// `addr:port` the listener binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }

    /// Check a client's credentials against the configured users.
    pub fn accepts(&self, user: &str, password: &str) -> bool {
        if self.users.is_empty() {
            return true;
        }
        self.users.get(user).is_some_and(|p| p == password)
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    4000
}

fn default_max_connections() -> u32 {
    100
}
