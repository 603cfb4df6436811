//! Directory of live sessions.
//!
//! Each open session registers a [`SessionControl`]. Other connections use
//! the registry to list sessions, change a session's pacing delay or kill it.
//! The fields another connection may write are atomics, so the owning
//! session never blocks on them; the directory lock is held only for lookups
//! and never across a target round trip.

use sqlward_core::{DbType, OpMode, TargetConnector, TargetDescriptor};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Shared handle to one live session.
#[derive(Debug)]
pub struct SessionControl {
    id: u32,
    target: TargetDescriptor,
    mode: OpMode,
    started: Instant,
    killed: AtomicBool,
    sleep_ms: AtomicU64,
    remote_thread_id: AtomicU64,
    last_threads_running: AtomicU64,
    /// -1 until a replica has been checked.
    last_repl_delay: AtomicI64,
    total_sql: AtomicUsize,
    executed_sql: AtomicUsize,
    db_type: Mutex<Option<DbType>>,
}

impl SessionControl {
    pub fn new(id: u32, target: TargetDescriptor, mode: OpMode, sleep_ms: u64) -> Self {
        Self {
            id,
            target,
            mode,
            started: Instant::now(),
            killed: AtomicBool::new(false),
            sleep_ms: AtomicU64::new(sleep_ms),
            remote_thread_id: AtomicU64::new(0),
            last_threads_running: AtomicU64::new(0),
            last_repl_delay: AtomicI64::new(-1),
            total_sql: AtomicUsize::new(0),
            executed_sql: AtomicUsize::new(0),
            db_type: Mutex::new(None),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn target(&self) -> &TargetDescriptor {
        &self.target
    }

    pub fn mode(&self) -> OpMode {
        self.mode
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    /// Ask the session to stop before its next statement.
    pub fn mark_killed(&self) {
        self.killed.store(true, Ordering::SeqCst);
    }

    pub fn sleep_ms(&self) -> u64 {
        self.sleep_ms.load(Ordering::Relaxed)
    }

    pub fn set_sleep_ms(&self, ms: u64) {
        self.sleep_ms.store(ms, Ordering::Relaxed);
    }

    /// Server thread of the statement being executed, 0 when idle.
    pub fn remote_thread_id(&self) -> u64 {
        self.remote_thread_id.load(Ordering::SeqCst)
    }

    pub fn set_remote_thread_id(&self, thread_id: u64) {
        self.remote_thread_id.store(thread_id, Ordering::SeqCst);
    }

    pub fn record_threads_running(&self, running: u64) {
        self.last_threads_running.store(running, Ordering::Relaxed);
    }

    pub fn record_repl_delay(&self, seconds: i64) {
        self.last_repl_delay.store(seconds, Ordering::Relaxed);
    }

    pub fn set_total_sql(&self, total: usize) {
        self.total_sql.store(total, Ordering::Relaxed);
    }

    pub fn record_executed(&self) {
        self.executed_sql.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_db_type(&self, db_type: DbType) {
        if let Ok(mut slot) = self.db_type.lock() {
            *slot = Some(db_type);
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let db_type = self
            .db_type
            .lock()
            .ok()
            .and_then(|slot| *slot)
            .map_or_else(|| "Unknown".to_string(), |t| t.to_string());
        SessionSummary {
            id: self.id,
            host: self.target.host.clone(),
            port: self.target.port,
            user: self.target.user.clone(),
            mode: self.mode,
            db_type,
            sleep_ms: self.sleep_ms(),
            total_sql: self.total_sql.load(Ordering::Relaxed),
            executed_sql: self.executed_sql.load(Ordering::Relaxed),
            elapsed_secs: self.started.elapsed().as_secs_f64(),
            threads_running: self.last_threads_running.load(Ordering::Relaxed),
            repl_delay: self.last_repl_delay.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a session for `inception show sessions`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub id: u32,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub mode: OpMode,
    pub db_type: String,
    pub sleep_ms: u64,
    pub total_sql: usize,
    pub executed_sql: usize,
    pub elapsed_secs: f64,
    pub threads_running: u64,
    pub repl_delay: i64,
}

/// Process-wide session directory.
pub struct SessionRegistry {
    sessions: Mutex<BTreeMap<u32, Arc<SessionControl>>>,
    next_id: AtomicU32,
    connector: Arc<dyn TargetConnector>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    /// `connector` is used to cancel in-flight statements on a forced kill.
    pub fn new(connector: Arc<dyn TargetConnector>) -> Self {
        Self {
            sessions: Mutex::new(BTreeMap::new()),
            next_id: AtomicU32::new(1),
            connector,
        }
    }

    /// Allocate an id for a new client connection.
    pub fn next_session_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn register(&self, control: Arc<SessionControl>) {
        if let Ok(mut sessions) = self.sessions.lock() {
            tracing::debug!(session_id = control.id(), "Session registered");
            sessions.insert(control.id(), control);
        }
    }

    pub fn unregister(&self, session_id: u32) {
        if let Ok(mut sessions) = self.sessions.lock() {
            if sessions.remove(&session_id).is_some() {
                tracing::debug!(session_id, "Session unregistered");
            }
        }
    }

    pub fn get(&self, session_id: u32) -> Option<Arc<SessionControl>> {
        self.sessions.lock().ok()?.get(&session_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summaries of every live session, ordered by id.
    pub fn snapshot(&self) -> Vec<SessionSummary> {
        let controls: Vec<_> = match self.sessions.lock() {
            Ok(sessions) => sessions.values().cloned().collect(),
            Err(_) => return Vec::new(),
        };
        controls.iter().map(|c| c.summary()).collect()
    }

    /// Change a live session's pacing delay. Returns `false` if not found.
    pub fn set_pacing_delay(&self, session_id: u32, ms: u64) -> bool {
        match self.get(session_id) {
            Some(control) => {
                control.set_sleep_ms(ms);
                tracing::info!(session_id, sleep_ms = ms, "Pacing delay changed");
                true
            }
            None => false,
        }
    }

    /// Kill a live session. Returns `false` if not found.
    ///
    /// A graceful kill only sets the flag, letting the running statement
    /// finish. A forced kill also terminates the statement running on the
    /// target, when one is.
    pub async fn kill(&self, session_id: u32, forced: bool) -> bool {
        let Some(control) = self.get(session_id) else {
            return false;
        };
        control.mark_killed();

        let thread_id = control.remote_thread_id();
        if forced && thread_id > 0 && !control.target().host.is_empty() {
            if let Err(e) = self.connector.cancel(control.target(), thread_id).await {
                tracing::warn!(
                    session_id,
                    thread_id,
                    target = %control.target().address(),
                    error = %e,
                    "Failed to cancel remote statement"
                );
            }
        }

        tracing::info!(session_id, forced, "Session marked as killed");
        true
    }
}
