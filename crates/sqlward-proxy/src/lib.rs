//! # sqlward-proxy
//!
//! Postgres wire protocol front end for the sqlward gateway.
//!
//! Clients connect with any Postgres driver and send marker-bracketed SQL as
//! simple queries. Each connection owns one [`sqlward_session::Session`];
//! every reply comes back as a text result set, a command tag or an error.
//!
//! ```text
//! psql / driver
//!       │  Postgres wire protocol (simple query)
//!       ▼
//! ┌──────────────────┐
//! │  sqlward proxy   │  cleartext password → proxy.users
//! │  Session::handle │  audit / split / tree / execute
//! └────────┬─────────┘
//!          ▼
//!    MySQL / TiDB target
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use sqlward_adapter_mysql::MySqlConnector;
//! use sqlward_audit::AuditLogger;
//! use sqlward_core::{GatewayConfig, SettingsStore};
//! use sqlward_proxy::GatewayProxy;
//! use sqlward_session::SessionServices;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = GatewayConfig::default();
//!     let settings = Arc::new(SettingsStore::new(config.rules.clone()));
//!     let connector = Arc::new(MySqlConnector::from_config(&config.execution));
//!     let services = SessionServices::new(&config, settings, connector, AuditLogger::disabled());
//!     GatewayProxy::new(config.proxy, Arc::new(services)).run().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod handler;
pub mod proxy;

pub use error::ProxyError;
pub use handler::{
    GatewayQueryHandler, GatewayServerHandlers, GatewayStartupHandler, SharedSession,
    reply_to_response,
};
pub use proxy::GatewayProxy;
