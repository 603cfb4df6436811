//! Execution controller.
//!
//! Runs the audited statements of an EXECUTE session against the target:
//!
//! 1. refuse the whole batch if any statement is ERROR, or WARNING without
//!    `enable-ignore-warnings`
//! 2. before each statement, check the read-only guard and wait while the
//!    target or a monitored replica is overloaded
//! 3. execute, collect `SHOW WARNINGS`, record timing and affected rows
//! 4. stop on failure unless `enable-force`, and stop when the session is
//!    killed from another connection
//!
//! Cancellation is cooperative and checked between statements. A forced
//! kill also cancels the running statement through the registry; that
//! statement ends as killed rather than failed.

use crate::link::TargetLink;
use crate::marker::SessionOptions;
use crate::registry::SessionControl;
use sqlward_audit::{AuditLogger, SessionIdentity};
use sqlward_core::{
    ExecutionConfig, Severity, Stage, StatementRecord, TargetConnection, TargetConnector,
    TargetError,
};
use std::time::Instant;

const KILLED_STATUS: &str = "Killed by user";
const SKIPPED_STATUS: &str = "Skipped due to prior error";
const SKIPPED_FINDING: &str = "Skipped: previous statement had errors.";

/// Why the pre-execute checks did not clear.
#[derive(Debug)]
enum Blocked {
    /// The session was killed while waiting.
    Killed,
    /// The target refused; the message becomes a finding.
    Failed(String),
}

/// Drives one EXECUTE batch.
pub struct ExecutionController<'a> {
    control: &'a SessionControl,
    options: &'a SessionOptions,
    config: &'a ExecutionConfig,
    connector: &'a dyn TargetConnector,
    audit: &'a AuditLogger,
    identity: &'a SessionIdentity,
}

impl<'a> ExecutionController<'a> {
    pub fn new(
        control: &'a SessionControl,
        options: &'a SessionOptions,
        config: &'a ExecutionConfig,
        connector: &'a dyn TargetConnector,
        audit: &'a AuditLogger,
        identity: &'a SessionIdentity,
    ) -> Self {
        Self {
            control,
            options,
            config,
            connector,
            audit,
            identity,
        }
    }

    /// Whether the batch may be forwarded at all.
    pub fn gate(records: &[StatementRecord], ignore_warnings: bool) -> bool {
        let worst = records
            .iter()
            .map(StatementRecord::severity)
            .max()
            .unwrap_or_default();
        match worst {
            Severity::Error => false,
            Severity::Warning => ignore_warnings,
            Severity::Ok => true,
        }
    }

    /// Execute `records` in order, updating each with its outcome.
    pub async fn run(&self, link: &mut TargetLink, records: &mut [StatementRecord]) {
        let session_id = self.control.id();

        if self.control.is_killed() {
            tracing::info!(session_id, "Session killed before execution");
            mark_killed(records);
            return;
        }

        link.connect_once(self.connector, &self.options.target, self.control)
            .await;
        if let Some(message) = link.error() {
            for record in records.iter_mut() {
                if !record.findings().iter().any(|f| f == message) {
                    record.append_error(message);
                }
                record.stage_status = "Execute failed".to_string();
            }
            return;
        }

        if !Self::gate(records, self.options.ignore_warnings) {
            tracing::info!(
                session_id,
                statements = records.len(),
                "Batch refused by audit findings, nothing executed"
            );
            return;
        }

        let Some(conn) = link.connection() else {
            return;
        };
        let mut replicas = self.connect_replicas().await;

        tracing::info!(
            session_id,
            statements = records.len(),
            target = %self.options.target.address(),
            force = self.options.force,
            "Executing batch"
        );

        let mut stop = false;
        for i in 0..records.len() {
            if self.control.is_killed() {
                tracing::info!(session_id, statement_id = records[i].id, "Session killed, stopping");
                mark_killed(&mut records[i..]);
                break;
            }

            let record = &mut records[i];
            if stop {
                record.stage = Stage::Skipped;
                record.stage_status = SKIPPED_STATUS.to_string();
                record.append_error(SKIPPED_FINDING);
                continue;
            }

            match self.pre_check(conn, &mut replicas).await {
                Ok(()) => {}
                Err(Blocked::Killed) => {
                    mark_killed(&mut records[i..]);
                    break;
                }
                Err(Blocked::Failed(message)) => {
                    tracing::warn!(session_id, statement_id = record.id, %message, "Pre-check failed");
                    record.append_error(message);
                    record.stage_status = "Pre-check failed".to_string();
                    stop = true;
                    continue;
                }
            }

            if !self.execute(conn, record).await && !self.options.force {
                stop = true;
            }
            self.audit.log_statement(self.identity, record).await;

            // Read once per statement so a change from another connection
            // applies to the next pause.
            let delay = self.control.sleep_ms();
            if delay > 0 && !stop && i + 1 < records.len() {
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }
        }
    }

    /// Run one statement. Returns `false` when the target rejected it.
    async fn execute(&self, conn: &mut dyn TargetConnection, record: &mut StatementRecord) -> bool {
        record.stage = Stage::Executed;

        let sql = record.sql_text.trim();
        if sql.is_empty() {
            record.stage_status = "Execute completed".to_string();
            return true;
        }
        let sql = sql.to_string();

        self.control.set_remote_thread_id(conn.thread_id());
        let started = Instant::now();
        let result = conn.execute(&sql).await;
        self.control.set_remote_thread_id(0);
        record.execute_time = format!("{:.3}", started.elapsed().as_secs_f64());

        match result {
            Ok(rows) => {
                record.affected_rows = i64::try_from(rows).unwrap_or(i64::MAX);
                record.stage_status = "Execute completed".to_string();
                self.collect_warnings(conn, record).await;
                record.sequence = format!(
                    "'{}_{}_{}'",
                    chrono::Utc::now().timestamp(),
                    self.control.id(),
                    record.id
                );
                self.control.record_executed();
                tracing::debug!(
                    session_id = self.control.id(),
                    statement_id = record.id,
                    affected_rows = record.affected_rows,
                    execute_time = %record.execute_time,
                    "Statement executed"
                );
                true
            }
            // A forced kill interrupts the statement at the target.
            Err(e) if self.control.is_killed() => {
                tracing::info!(
                    session_id = self.control.id(),
                    statement_id = record.id,
                    error = %e,
                    "Statement interrupted by kill"
                );
                record.stage_status = KILLED_STATUS.to_string();
                false
            }
            Err(e) => {
                tracing::warn!(
                    session_id = self.control.id(),
                    statement_id = record.id,
                    error = %e,
                    "Statement failed"
                );
                record.append_error(format!("Execute failed: {e}"));
                record.stage_status = "Execute failed".to_string();
                false
            }
        }
    }

    async fn collect_warnings(&self, conn: &mut dyn TargetConnection, record: &mut StatementRecord) {
        let warnings = match conn.warnings().await {
            Ok(warnings) => warnings,
            Err(e) => {
                tracing::debug!(error = %e, "SHOW WARNINGS failed");
                return;
            }
        };
        for w in warnings {
            let message = format!("Remote {} (code {}): {}", w.level, w.code, w.message);
            if w.level.eq_ignore_ascii_case("error") {
                record.append_error(message);
            } else {
                record.append_warning(message);
            }
        }
    }

    async fn connect_replicas(&self) -> Vec<Box<dyn TargetConnection>> {
        if self.config.max_replication_delay == 0 {
            return Vec::new();
        }
        let mut replicas = Vec::new();
        for replica in self.options.replica_targets() {
            match self.connector.connect(&replica).await {
                Ok(conn) => replicas.push(conn),
                Err(e) => tracing::warn!(
                    session_id = self.control.id(),
                    replica = %replica.address(),
                    error = %e,
                    "Cannot connect to replica, not monitoring it"
                ),
            }
        }
        replicas
    }

    async fn pre_check(
        &self,
        conn: &mut dyn TargetConnection,
        replicas: &mut [Box<dyn TargetConnection>],
    ) -> Result<(), Blocked> {
        if self.config.check_read_only {
            match read_only(conn).await {
                Ok(false) => {}
                Ok(true) => {
                    return Err(Blocked::Failed(
                        "Remote is read-only (read_only=ON), execution blocked by pre-check."
                            .to_string(),
                    ));
                }
                Err(e) => {
                    return Err(Blocked::Failed(format!(
                        "Failed to query remote read_only status: {e}"
                    )));
                }
            }
        }
        self.wait_for_capacity(conn, replicas).await
    }

    /// Wait while the target runs too many statements or a replica lags.
    async fn wait_for_capacity(
        &self,
        conn: &mut dyn TargetConnection,
        replicas: &mut [Box<dyn TargetConnection>],
    ) -> Result<(), Blocked> {
        let max_running = self.config.max_threads_running;
        let max_delay = self.config.max_replication_delay;
        if max_running == 0 && (max_delay == 0 || replicas.is_empty()) {
            return Ok(());
        }

        loop {
            if self.control.is_killed() {
                return Err(Blocked::Killed);
            }

            let mut busy = false;
            if max_running > 0 {
                let running = threads_running(conn).await.map_err(|e| {
                    Blocked::Failed(format!("Failed to query remote Threads_running: {e}"))
                })?;
                if let Some(running) = running {
                    self.control.record_threads_running(running);
                    busy |= running > max_running;
                }
            }
            if max_delay > 0 {
                let mut worst: Option<i64> = None;
                for replica in replicas.iter_mut() {
                    let delay = replication_delay(replica.as_mut()).await.map_err(|e| {
                        Blocked::Failed(format!("Failed to query replica status: {e}"))
                    })?;
                    match delay {
                        Some(delay) => {
                            worst = worst.max(Some(delay));
                            busy |= u64::try_from(delay).is_ok_and(|d| d > max_delay);
                        }
                        // Replication stopped or broken.
                        None => busy = true,
                    }
                }
                if let Some(delay) = worst {
                    self.control.record_repl_delay(delay);
                }
            }

            if !busy {
                return Ok(());
            }
            tracing::info!(session_id = self.control.id(), "Target busy, waiting");
            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }
}

fn mark_killed(records: &mut [StatementRecord]) {
    for record in records {
        record.stage = Stage::Executed;
        record.stage_status = KILLED_STATUS.to_string();
    }
}

fn first_cell(rows: &[Vec<Option<String>>], column: usize) -> Option<&str> {
    rows.first()?.get(column)?.as_deref()
}

async fn read_only(conn: &mut dyn TargetConnection) -> Result<bool, TargetError> {
    let rows = conn.query("SELECT @@GLOBAL.read_only").await?;
    let value = first_cell(&rows, 0).unwrap_or("0").trim().to_ascii_lowercase();
    Ok(matches!(value.as_str(), "1" | "on" | "true"))
}

async fn threads_running(conn: &mut dyn TargetConnection) -> Result<Option<u64>, TargetError> {
    let rows = conn
        .query("SHOW GLOBAL STATUS LIKE 'Threads_running'")
        .await?;
    Ok(first_cell(&rows, 1).and_then(|v| v.trim().parse().ok()))
}

/// `Seconds_Behind_Master`; `None` when NULL. A server that is not a
/// replica reports no lag.
async fn replication_delay(conn: &mut dyn TargetConnection) -> Result<Option<i64>, TargetError> {
    let rows = conn.query("SHOW SLAVE STATUS").await?;
    if rows.is_empty() {
        return Ok(Some(0));
    }
    Ok(first_cell(&rows, 32).and_then(|v| v.trim().parse().ok()))
}
