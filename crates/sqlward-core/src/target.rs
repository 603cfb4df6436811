//! Client traits for the target databases statements are forwarded to.
//!
//! The rule engine and execution controller only see these traits; the
//! MySQL implementation lives in `sqlward-adapter-mysql` and tests plug in
//! in-memory fakes.

use async_trait::async_trait;
use std::fmt;

/// Text rows returned by a target query. `None` is SQL NULL.
pub type QueryRows = Vec<Vec<Option<String>>>;

/// Where a session forwards its statements.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl TargetDescriptor {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// `host:port` as shown in results and audit records.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One row of `SHOW WARNINGS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteWarning {
    pub level: String,
    pub code: String,
    pub message: String,
}

/// Errors reported by a target client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TargetError {
    #[error("{0}")]
    Connect(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("{0}")]
    Query(String),
}

/// An open connection to a target database.
#[async_trait]
pub trait TargetConnection: Send {
    /// Run a statement that returns rows.
    async fn query(&mut self, sql: &str) -> Result<QueryRows, TargetError>;

    /// Run a statement and return the affected row count.
    async fn execute(&mut self, sql: &str) -> Result<u64, TargetError>;

    /// Server-side connection id, used to cancel in-flight work.
    fn thread_id(&self) -> u64;

    /// Raw `VERSION()` string reported by the server.
    fn server_version(&self) -> &str;

    /// Warnings and notes raised by the previous statement.
    async fn warnings(&mut self) -> Result<Vec<RemoteWarning>, TargetError> {
        let rows = self.query("SHOW WARNINGS").await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let cell = |i: usize| row.get(i).cloned().flatten().unwrap_or_default();
                RemoteWarning {
                    level: cell(0),
                    code: cell(1),
                    message: cell(2),
                }
            })
            .collect())
    }
}

/// Opens connections to target databases.
#[async_trait]
pub trait TargetConnector: Send + Sync {
    async fn connect(
        &self,
        target: &TargetDescriptor,
    ) -> Result<Box<dyn TargetConnection>, TargetError>;

    /// Terminate the statement running on `thread_id` from a fresh connection.
    async fn cancel(&self, target: &TargetDescriptor, thread_id: u64) -> Result<(), TargetError> {
        let mut conn = self.connect(target).await?;
        conn.execute(&format!("KILL {thread_id}")).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_debug_redacts_password() {
        let target = TargetDescriptor {
            host: "db1".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: "hunter2".to_string(),
        };
        let shown = format!("{target:?}");
        assert!(shown.contains("db1"));
        assert!(!shown.contains("hunter2"));
        assert_eq!(target.address(), "db1:3306");
    }
}
