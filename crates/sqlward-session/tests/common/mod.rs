//! In-memory target shared by the session integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use sqlward_audit::AuditLogger;
use sqlward_core::{
    ExecutionConfig, GatewayConfig, QueryRows, RuleSettings, SettingsStore, TargetConnection,
    TargetConnector, TargetDescriptor, TargetError,
};
use sqlward_session::{ResultTable, SessionRegistry, SessionServices};
use std::sync::{Arc, Mutex, Weak};

pub const THREAD_ID: u64 = 77;

/// What the fake target knows and what it has been asked.
#[derive(Default)]
pub struct TargetState {
    /// Tables that exist, matched by name only.
    pub tables: Vec<String>,
    pub read_only: bool,
    pub unreachable: bool,
    /// Executing a statement containing this text fails.
    pub fail_on: Option<String>,
    /// Executing a statement containing this text raises a warning.
    pub warn_on: Option<String>,
    /// Executing a statement containing this text kills the session
    /// (`true` for a forced kill) while the statement runs.
    pub kill_on: Option<(String, bool)>,
    pub registry: Option<Weak<SessionRegistry>>,
    pub kill_session: u32,
    /// `Threads_running` reported by `SHOW GLOBAL STATUS`; no row when unset.
    pub threads_running: Option<u64>,
    /// `SHOW SLAVE STATUS`: unset means not a replica, `Some(None)` a NULL
    /// `Seconds_Behind_Master`.
    pub replica_lag: Option<Option<i64>>,
    /// Status queries fail with this error.
    pub status_error: Option<String>,
    pub status_polls: usize,
    pub replica_polls: usize,

    pub connects: usize,
    pub queries: Vec<String>,
    pub executed: Vec<String>,
    pub cancelled: Vec<u64>,
    last_executed: String,
}

#[derive(Clone, Default)]
pub struct MockTarget(pub Arc<Mutex<TargetState>>);

impl MockTarget {
    pub fn with_tables(tables: &[&str]) -> Self {
        let target = Self::default();
        target.state().tables = tables.iter().map(|t| t.to_string()).collect();
        target
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, TargetState> {
        self.0.lock().unwrap()
    }

    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    /// Number of queries whose text contains `needle`.
    pub fn queries_containing(&self, needle: &str) -> usize {
        self.state().queries.iter().filter(|q| q.contains(needle)).count()
    }
}

#[async_trait]
impl TargetConnector for MockTarget {
    async fn connect(&self, _: &TargetDescriptor) -> Result<Box<dyn TargetConnection>, TargetError> {
        let mut state = self.state();
        state.connects += 1;
        if state.unreachable {
            return Err(TargetError::Connect("Connection refused".into()));
        }
        Ok(Box::new(MockConnection(self.clone())))
    }

    async fn cancel(&self, _: &TargetDescriptor, thread_id: u64) -> Result<(), TargetError> {
        self.state().cancelled.push(thread_id);
        Ok(())
    }
}

pub struct MockConnection(MockTarget);

fn one(value: &str) -> QueryRows {
    vec![vec![Some(value.to_string())]]
}

#[async_trait]
impl TargetConnection for MockConnection {
    async fn query(&mut self, sql: &str) -> Result<QueryRows, TargetError> {
        let mut state = self.0.state();
        state.queries.push(sql.to_string());

        if sql.starts_with("SHOW GLOBAL STATUS") || sql == "SHOW SLAVE STATUS" {
            if let Some(message) = &state.status_error {
                return Err(TargetError::Query(message.clone()));
            }
        }
        if sql.starts_with("SHOW GLOBAL STATUS") {
            state.status_polls += 1;
            return Ok(state
                .threads_running
                .map(|running| vec![vec![Some("Threads_running".to_string()), Some(running.to_string())]])
                .unwrap_or_default());
        }
        if sql == "SHOW SLAVE STATUS" {
            state.replica_polls += 1;
            return Ok(match state.replica_lag {
                None => Vec::new(),
                Some(lag) => {
                    let mut row = vec![Some("Yes".to_string()); 32];
                    row.push(lag.map(|l| l.to_string()));
                    vec![row]
                }
            });
        }
        if sql.contains("@@GLOBAL.read_only") {
            return Ok(one(if state.read_only { "1" } else { "0" }));
        }
        if sql == "SHOW WARNINGS" {
            let warn = state
                .warn_on
                .as_deref()
                .is_some_and(|w| state.last_executed.contains(w));
            return Ok(if warn {
                vec![vec![
                    Some("Warning".to_string()),
                    Some("1265".to_string()),
                    Some("Data truncated for column 'id'".to_string()),
                ]]
            } else {
                Vec::new()
            });
        }
        if sql.contains("information_schema")
            && state
                .tables
                .iter()
                .any(|t| sql.contains(&format!("TABLE_NAME='{t}'")))
        {
            return Ok(one("1"));
        }
        Ok(Vec::new())
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, TargetError> {
        let (fail, kill) = {
            let mut state = self.0.state();
            state.executed.push(sql.to_string());
            state.last_executed = sql.to_string();
            let fail = state.fail_on.as_deref().is_some_and(|f| sql.contains(f));
            let kill = match &state.kill_on {
                Some((needle, forced)) if sql.contains(needle.as_str()) => state
                    .registry
                    .as_ref()
                    .and_then(Weak::upgrade)
                    .map(|registry| (registry, state.kill_session, *forced)),
                _ => None,
            };
            (fail, kill)
        };

        if let Some((registry, session_id, forced)) = kill {
            registry.kill(session_id, forced).await;
            if forced {
                return Err(TargetError::Query("Query execution was interrupted".into()));
            }
        }
        if fail {
            return Err(TargetError::Query("Duplicate entry '2' for key 'PRIMARY'".into()));
        }
        Ok(1)
    }

    fn thread_id(&self) -> u64 {
        THREAD_ID
    }

    fn server_version(&self) -> &str {
        "8.0.36"
    }
}

/// Services wired to `target`, with the registry handed back to the target
/// for kill hooks.
pub fn services(target: &MockTarget, execution: ExecutionConfig, audit: AuditLogger) -> Arc<SessionServices> {
    let config = GatewayConfig {
        execution,
        ..Default::default()
    };
    let settings = Arc::new(SettingsStore::new(RuleSettings::default()));
    let services = SessionServices::new(&config, settings, Arc::new(target.clone()), audit);
    target.state().registry = Some(Arc::downgrade(&services.registry));
    Arc::new(services)
}

pub fn default_services(target: &MockTarget) -> Arc<SessionServices> {
    services(target, ExecutionConfig::default(), AuditLogger::disabled())
}

pub fn start_marker(options: &str) -> String {
    format!("/*--user=root;--password=pw;--host=db1;--port=3306;{options}inception_magic_start;*/")
}

pub const COMMIT: &str = "/*inception_magic_commit;*/";

/// Value of `column` in every row.
pub fn column(table: &ResultTable, column: &str) -> Vec<String> {
    let index = table
        .columns
        .iter()
        .position(|c| c == column)
        .unwrap_or_else(|| panic!("no column {column}"));
    table.rows.iter().map(|row| row[index].clone()).collect()
}
