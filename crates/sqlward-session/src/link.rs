//! The session's connection to its target.
//!
//! A session connects at most once. The first statement that needs the
//! target triggers the attempt; a failure is remembered and reported on
//! every later statement instead of retrying.

use crate::registry::SessionControl;
use sqlward_core::{DbType, DbVersion, TargetConnection, TargetConnector, TargetDescriptor};
use sqlward_rules::connect_error_message;

#[derive(Default)]
pub enum TargetLink {
    #[default]
    Pending,
    Connected {
        conn: Box<dyn TargetConnection>,
        db_type: DbType,
        version: DbVersion,
    },
    /// Connection failed; holds the finding reported on every statement.
    Failed(String),
}

impl std::fmt::Debug for TargetLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => f.write_str("Pending"),
            Self::Connected {
                db_type, version, ..
            } => f
                .debug_struct("Connected")
                .field("db_type", db_type)
                .field("version", version)
                .finish_non_exhaustive(),
            Self::Failed(reason) => f.debug_tuple("Failed").field(reason).finish(),
        }
    }
}

impl TargetLink {
    /// Connect unless an attempt was already made.
    pub async fn connect_once(
        &mut self,
        connector: &dyn TargetConnector,
        target: &TargetDescriptor,
        control: &SessionControl,
    ) {
        if !matches!(self, Self::Pending) {
            return;
        }

        *self = match connector.connect(target).await {
            Ok(conn) => {
                let (db_type, version) = DbVersion::detect(conn.server_version());
                let version = version.unwrap_or_default();
                control.set_db_type(db_type);
                tracing::info!(
                    session_id = control.id(),
                    target = %target.address(),
                    %db_type,
                    %version,
                    "Connected to target"
                );
                Self::Connected {
                    conn,
                    db_type,
                    version,
                }
            }
            Err(e) => {
                tracing::warn!(
                    session_id = control.id(),
                    target = %target.address(),
                    error = %e,
                    "Cannot connect to target"
                );
                Self::Failed(connect_error_message(&target.host, target.port, &e.to_string()))
            }
        };
    }

    pub fn connection(&mut self) -> Option<&mut dyn TargetConnection> {
        match self {
            Self::Connected { conn, .. } => Some(conn.as_mut()),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Detected dialect and version once connected.
    pub fn profile(&self) -> Option<(DbType, DbVersion)> {
        match self {
            Self::Connected {
                db_type, version, ..
            } => Some((*db_type, *version)),
            _ => None,
        }
    }
}
