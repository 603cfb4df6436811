//! sqlx-backed target client for MySQL and TiDB.
//!
//! Each session holds one [`MySqlTarget`], a single unpooled connection.
//! Statements are sent over the text protocol exactly as the client wrote
//! them, so every value comes back in its textual form.

use async_trait::async_trait;
use sqlward_core::{
    ExecutionConfig, QueryRows, TargetConnection, TargetConnector, TargetDescriptor, TargetError,
};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{ConnectOptions, Executor, Row};
use std::future::Future;
use std::time::Duration;

/// Connect timeout used when opening a side connection to cancel a statement.
pub const CANCEL_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_USER: &str = "root";

/// Opens [`MySqlTarget`] connections with fixed timeouts.
#[derive(Debug, Clone, Copy)]
pub struct MySqlConnector {
    connect_timeout: Duration,
    query_timeout: Duration,
}

impl Default for MySqlConnector {
    fn default() -> Self {
        Self::from_config(&ExecutionConfig::default())
    }
}

impl MySqlConnector {
    pub fn new(connect_timeout: Duration, query_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            query_timeout,
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(config.connect_timeout(), config.query_timeout())
    }

    fn options(target: &TargetDescriptor) -> MySqlConnectOptions {
        let host = if target.host.is_empty() {
            DEFAULT_HOST
        } else {
            target.host.as_str()
        };
        let user = if target.user.is_empty() {
            DEFAULT_USER
        } else {
            target.user.as_str()
        };

        let mut options = MySqlConnectOptions::new()
            .host(host)
            .port(target.port)
            .username(user)
            .charset("utf8mb4")
            // Forwarded statements must see the server's own session defaults.
            .pipes_as_concat(false)
            .timezone(None::<String>);
        if !target.password.is_empty() {
            options = options.password(&target.password);
        }
        options
    }

    async fn open(
        &self,
        target: &TargetDescriptor,
        connect_timeout: Duration,
    ) -> Result<MySqlTarget, TargetError> {
        let options = Self::options(target);
        let conn = tokio::time::timeout(connect_timeout, options.connect())
            .await
            .map_err(|_| TargetError::Timeout(connect_timeout.as_secs()))?
            .map_err(|e| TargetError::Connect(e.to_string()))?;

        let mut target_conn = MySqlTarget {
            conn,
            thread_id: 0,
            version: String::new(),
            query_timeout: self.query_timeout,
        };

        let rows = target_conn
            .query("SELECT CONNECTION_ID(), VERSION()")
            .await
            .map_err(|e| TargetError::Connect(e.to_string()))?;
        if let Some(row) = rows.first() {
            target_conn.thread_id = row
                .first()
                .cloned()
                .flatten()
                .and_then(|id| id.parse().ok())
                .unwrap_or(0);
            target_conn.version = row.get(1).cloned().flatten().unwrap_or_default();
        }

        tracing::debug!(
            target = %target.address(),
            thread_id = target_conn.thread_id,
            version = %target_conn.version,
            "Connected to target"
        );
        Ok(target_conn)
    }
}

#[async_trait]
impl TargetConnector for MySqlConnector {
    async fn connect(
        &self,
        target: &TargetDescriptor,
    ) -> Result<Box<dyn TargetConnection>, TargetError> {
        let conn = self.open(target, self.connect_timeout).await?;
        Ok(Box::new(conn))
    }

    async fn cancel(&self, target: &TargetDescriptor, thread_id: u64) -> Result<(), TargetError> {
        let mut conn = self.open(target, CANCEL_CONNECT_TIMEOUT).await?;
        conn.execute(&format!("KILL {thread_id}")).await?;
        tracing::info!(target = %target.address(), thread_id, "Cancelled remote statement");
        Ok(())
    }
}

/// One live connection to a target server.
pub struct MySqlTarget {
    conn: MySqlConnection,
    thread_id: u64,
    version: String,
    query_timeout: Duration,
}

impl std::fmt::Debug for MySqlTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlTarget")
            .field("thread_id", &self.thread_id)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

async fn bounded<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, sqlx::Error>>,
) -> Result<T, TargetError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(query_error),
        Err(_) => Err(TargetError::Timeout(limit.as_secs())),
    }
}

/// Server errors keep only the server's message, the way a MySQL client
/// shows them.
fn query_error(err: sqlx::Error) -> TargetError {
    match err {
        sqlx::Error::Database(db) => TargetError::Query(db.message().to_string()),
        other => TargetError::Query(other.to_string()),
    }
}

/// Text form of every cell in `row`.
fn text_row(row: &MySqlRow) -> Result<Vec<Option<String>>, sqlx::Error> {
    (0..row.len())
        .map(|i| {
            let raw: Option<Vec<u8>> = row.try_get_unchecked(i)?;
            Ok(raw.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
        })
        .collect()
}

#[async_trait]
impl TargetConnection for MySqlTarget {
    async fn query(&mut self, sql: &str) -> Result<QueryRows, TargetError> {
        let rows = bounded(self.query_timeout, self.conn.fetch_all(sqlx::raw_sql(sql))).await?;
        rows.iter()
            .map(text_row)
            .collect::<Result<_, _>>()
            .map_err(query_error)
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, TargetError> {
        let result = bounded(self.query_timeout, self.conn.execute(sqlx::raw_sql(sql))).await?;
        Ok(result.rows_affected())
    }

    fn thread_id(&self) -> u64 {
        self.thread_id
    }

    fn server_version(&self) -> &str {
        &self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_connector_from_config() {
        let config = ExecutionConfig {
            connect_timeout_secs: 3,
            query_timeout_secs: 30,
            ..Default::default()
        };
        let connector = MySqlConnector::from_config(&config);
        assert_eq!(connector.connect_timeout, Duration::from_secs(3));
        assert_eq!(connector.query_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_options_fill_defaults() {
        let options = MySqlConnector::options(&TargetDescriptor::new("", 3307));
        assert_eq!(options.get_host(), DEFAULT_HOST);
        assert_eq!(options.get_port(), 3307);
        assert_eq!(options.get_username(), DEFAULT_USER);
    }

    #[tokio::test]
    async fn test_unreachable_target_is_a_connect_error() {
        let connector = MySqlConnector::new(Duration::from_secs(2), Duration::from_secs(2));
        // Port 1 on loopback refuses connections.
        let err = connector
            .connect(&TargetDescriptor::new("127.0.0.1", 1))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TargetError::Connect(_) | TargetError::Timeout(_)));
    }
}
