//! EXECUTE mode against an in-memory target.

mod common;

use common::{COMMIT, MockTarget, THREAD_ID, column, default_services, services, start_marker};
use pretty_assertions::assert_eq;
use sqlward_audit::{AuditEvent, AuditLogger, MemoryStorage};
use sqlward_core::{AuditConfig, ExecutionConfig};
use sqlward_session::{Reply, ResultTable, Session};
use std::sync::Arc;
use std::time::{Duration, Instant};

const INSERT_1: &str = "INSERT INTO t1 (id) VALUES (1)";
const INSERT_2: &str = "INSERT INTO t1 (id) VALUES (2)";
const INSERT_3: &str = "INSERT INTO t1 (id) VALUES (3)";

async fn run(session: &mut Session, options: &str, statements: &[&str]) -> ResultTable {
    let mut text = start_marker(options);
    text.push('\n');
    for statement in statements {
        text.push_str(statement);
        text.push_str(";\n");
    }
    text.push_str(COMMIT);

    let mut replies = session.handle(&text).await;
    match replies.pop() {
        Some(Reply::Table(table)) => table,
        other => panic!("expected a result table, got {other:?}"),
    }
}

#[tokio::test]
async fn test_executes_in_order() {
    let target = MockTarget::with_tables(&["t1"]);
    target.state().warn_on = Some("VALUES (2)".to_string());
    let mut session = Session::new(default_services(&target), "alice", "10.1.1.1");

    let table = run(
        &mut session,
        "--enable-execute=1;",
        &["USE shop", INSERT_1, INSERT_2],
    )
    .await;

    assert_eq!(target.executed(), vec!["USE shop", INSERT_1, INSERT_2]);
    assert_eq!(column(&table, "stage"), vec!["RERUN", "EXECUTED", "EXECUTED"]);
    assert_eq!(
        column(&table, "stage_status"),
        vec!["Execute completed", "Execute completed", "Execute completed"]
    );
    assert_eq!(column(&table, "err_level"), vec!["0", "0", "1"]);
    assert_eq!(
        column(&table, "err_message")[2],
        "Remote Warning (code 1265): Data truncated for column 'id'"
    );
    assert_eq!(column(&table, "affected_rows")[1], "1");
    assert_eq!(column(&table, "db_type")[0], "MySQL");
    assert_eq!(column(&table, "db_version")[0], "8.0");

    let sequence = &column(&table, "sequence")[1];
    assert!(sequence.starts_with('\''));
    assert!(sequence.ends_with(&format!("_{}_2'", session.id())));
    assert_eq!(target.state().connects, 1);
}

#[tokio::test]
async fn test_error_blocks_batch_even_with_force() {
    let target = MockTarget::with_tables(&["t1"]);
    let mut session = Session::new(default_services(&target), "alice", "10.1.1.1");

    let table = run(
        &mut session,
        "--enable-execute=1;--enable-force=1;--enable-ignore-warnings=1;",
        &[INSERT_1, "CREATE TABLE users (id BIGINT)"],
    )
    .await;

    assert!(target.executed().is_empty());
    assert_eq!(column(&table, "stage"), vec!["CHECKED", "CHECKED"]);
    assert_eq!(column(&table, "err_level"), vec!["0", "2"]);
}

#[tokio::test]
async fn test_warnings_need_ignore_flag() {
    let target = MockTarget::with_tables(&["t1"]);
    let services = default_services(&target);

    let mut session = Session::new(services.clone(), "alice", "10.1.1.1");
    let table = run(&mut session, "--enable-execute=1;", &["DROP TABLE t1"]).await;
    assert!(target.executed().is_empty());
    assert_eq!(column(&table, "stage"), vec!["CHECKED"]);
    assert_eq!(column(&table, "err_level"), vec!["1"]);

    let table = run(
        &mut session,
        "--enable-execute=1;--enable-ignore-warnings=1;",
        &["DROP TABLE t1"],
    )
    .await;
    assert_eq!(target.executed(), vec!["DROP TABLE t1"]);
    assert_eq!(column(&table, "stage"), vec!["EXECUTED"]);
}

#[tokio::test]
async fn test_failure_skips_remaining_without_force() {
    let target = MockTarget::with_tables(&["t1"]);
    target.state().fail_on = Some("VALUES (2)".to_string());
    let mut session = Session::new(default_services(&target), "alice", "10.1.1.1");

    let table = run(&mut session, "--enable-execute=1;", &[INSERT_1, INSERT_2, INSERT_3]).await;

    assert_eq!(target.executed(), vec![INSERT_1, INSERT_2]);
    assert_eq!(column(&table, "stage"), vec!["EXECUTED", "EXECUTED", "SKIPPED"]);
    assert_eq!(
        column(&table, "stage_status"),
        vec!["Execute completed", "Execute failed", "Skipped due to prior error"]
    );
    assert_eq!(
        column(&table, "err_message")[1],
        "Execute failed: Duplicate entry '2' for key 'PRIMARY'"
    );
    assert_eq!(
        column(&table, "err_message")[2],
        "Skipped: previous statement had errors."
    );
    assert_eq!(column(&table, "sequence")[1], "");
}

#[tokio::test]
async fn test_force_continues_after_failure() {
    let target = MockTarget::with_tables(&["t1"]);
    target.state().fail_on = Some("VALUES (2)".to_string());
    let mut session = Session::new(default_services(&target), "alice", "10.1.1.1");

    let table = run(
        &mut session,
        "--enable-execute=1;--enable-force=1;",
        &[INSERT_1, INSERT_2, INSERT_3],
    )
    .await;

    assert_eq!(target.executed(), vec![INSERT_1, INSERT_2, INSERT_3]);
    assert_eq!(column(&table, "err_level"), vec!["0", "2", "0"]);
    assert_eq!(column(&table, "stage"), vec!["EXECUTED", "EXECUTED", "EXECUTED"]);
}

#[tokio::test]
async fn test_read_only_target_blocks_execution() {
    let target = MockTarget::with_tables(&["t1"]);
    target.state().read_only = true;
    let mut session = Session::new(default_services(&target), "alice", "10.1.1.1");

    let table = run(&mut session, "--enable-execute=1;", &[INSERT_1, INSERT_2]).await;

    assert!(target.executed().is_empty());
    assert_eq!(
        column(&table, "stage_status"),
        vec!["Pre-check failed", "Skipped due to prior error"]
    );
    assert_eq!(
        column(&table, "err_message")[0],
        "Remote is read-only (read_only=ON), execution blocked by pre-check."
    );
}

#[tokio::test]
async fn test_read_only_guard_can_be_disabled() {
    let target = MockTarget::with_tables(&["t1"]);
    target.state().read_only = true;
    let execution = ExecutionConfig {
        check_read_only: false,
        ..Default::default()
    };
    let mut session = Session::new(
        services(&target, execution, AuditLogger::disabled()),
        "alice",
        "10.1.1.1",
    );

    run(&mut session, "--enable-execute=1;", &[INSERT_1]).await;
    assert_eq!(target.executed(), vec![INSERT_1]);
    assert_eq!(target.queries_containing("read_only"), 0);
}

#[tokio::test]
async fn test_graceful_kill_lets_running_statement_finish() {
    let target = MockTarget::with_tables(&["t1"]);
    let mut session = Session::new(default_services(&target), "alice", "10.1.1.1");
    target.state().kill_on = Some(("VALUES (2)".to_string(), false));
    target.state().kill_session = session.id();

    let table = run(&mut session, "--enable-execute=1;", &[INSERT_1, INSERT_2, INSERT_3]).await;

    assert_eq!(target.executed(), vec![INSERT_1, INSERT_2]);
    assert_eq!(
        column(&table, "stage_status"),
        vec!["Execute completed", "Execute completed", "Killed by user"]
    );
    assert!(target.state().cancelled.is_empty());
}

#[tokio::test]
async fn test_forced_kill_cancels_running_statement() {
    let target = MockTarget::with_tables(&["t1"]);
    let mut session = Session::new(default_services(&target), "alice", "10.1.1.1");
    target.state().kill_on = Some(("VALUES (2)".to_string(), true));
    target.state().kill_session = session.id();

    let table = run(&mut session, "--enable-execute=1;", &[INSERT_1, INSERT_2, INSERT_3]).await;

    assert_eq!(target.state().cancelled, vec![THREAD_ID]);
    assert_eq!(
        column(&table, "stage_status"),
        vec!["Execute completed", "Killed by user", "Killed by user"]
    );
    assert_eq!(column(&table, "err_message"), vec!["None", "None", "None"]);
    assert_eq!(target.executed().len(), 2);
}

fn throttled(max_threads_running: u64, max_replication_delay: u64) -> ExecutionConfig {
    ExecutionConfig {
        max_threads_running,
        max_replication_delay,
        poll_interval_ms: 20,
        ..Default::default()
    }
}

fn table(reply: &Reply) -> &ResultTable {
    match reply {
        Reply::Table(table) => table,
        other => panic!("expected a result table, got {other:?}"),
    }
}

/// Poll `inception show sessions` from `admin` until `ready` accepts the
/// listing.
async fn wait_for_sessions(admin: &mut Session, ready: impl Fn(&ResultTable) -> bool) -> ResultTable {
    let started = Instant::now();
    loop {
        let replies = admin.handle("inception show sessions").await;
        let sessions = table(&replies[0]).clone();
        if ready(&sessions) {
            return sessions;
        }
        assert!(started.elapsed() < Duration::from_secs(5), "session never reached the expected state");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_waits_while_target_busy_and_applies_new_sleep() {
    let target = MockTarget::with_tables(&["t1"]);
    target.state().threads_running = Some(25);
    let services = services(&target, throttled(10, 0), AuditLogger::disabled());
    let mut running = Session::new(services.clone(), "alice", "10.1.1.1");
    let mut admin = Session::new(services.clone(), "bob", "10.1.1.2");
    let id = running.id();

    let operator = async {
        let sessions =
            wait_for_sessions(&mut admin, |t| column(t, "threads_running") == vec!["25"]).await;
        assert!(target.executed().is_empty());

        let replies = admin.handle(&format!("inception set sleep {id} 150")).await;
        assert_eq!(replies, vec![Reply::Ok]);
        target.state().threads_running = Some(3);
        (sessions, Instant::now())
    };
    let (table, (sessions, released)) = tokio::join!(
        run(&mut running, "--enable-execute=1;", &[INSERT_1, INSERT_2]),
        operator
    );

    assert_eq!(column(&sessions, "thread_id"), vec![id.to_string()]);
    assert_eq!(column(&sessions, "sleep_ms"), vec!["0"]);
    assert_eq!(target.executed(), vec![INSERT_1, INSERT_2]);
    assert_eq!(
        column(&table, "stage_status"),
        vec!["Execute completed", "Execute completed"]
    );
    assert!(target.state().status_polls >= 3);
    // The pause between the two statements used the new delay.
    assert!(released.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn test_waits_while_replica_lags() {
    let target = MockTarget::with_tables(&["t1"]);
    target.state().replica_lag = Some(Some(30));
    let services = services(&target, throttled(0, 5), AuditLogger::disabled());
    let mut running = Session::new(services.clone(), "alice", "10.1.1.1");
    let mut admin = Session::new(services.clone(), "bob", "10.1.1.2");

    let operator = async {
        wait_for_sessions(&mut admin, |t| column(t, "repl_delay") == vec!["30s"]).await;
        assert!(target.executed().is_empty());
        target.state().replica_lag = Some(Some(2));
    };
    let (table, ()) = tokio::join!(
        run(
            &mut running,
            "--enable-execute=1;--slave-hosts=db2:3306;",
            &[INSERT_1]
        ),
        operator
    );

    assert_eq!(target.executed(), vec![INSERT_1]);
    assert_eq!(column(&table, "stage_status"), vec!["Execute completed"]);
}

#[tokio::test]
async fn test_stopped_replication_waits() {
    let target = MockTarget::with_tables(&["t1"]);
    target.state().replica_lag = Some(None);
    let services = services(&target, throttled(0, 5), AuditLogger::disabled());
    let mut running = Session::new(services.clone(), "alice", "10.1.1.1");

    let operator = async {
        let started = Instant::now();
        while target.state().replica_polls < 3 {
            assert!(started.elapsed() < Duration::from_secs(5), "replica never polled");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(target.executed().is_empty());
        target.state().replica_lag = Some(Some(0));
    };
    let (table, ()) = tokio::join!(
        run(
            &mut running,
            "--enable-execute=1;--slave-hosts=db2:3306;",
            &[INSERT_1]
        ),
        operator
    );

    assert_eq!(target.executed(), vec![INSERT_1]);
    assert_eq!(column(&table, "stage_status"), vec!["Execute completed"]);
}

#[tokio::test]
async fn test_kill_ends_throttle_wait() {
    let target = MockTarget::with_tables(&["t1"]);
    target.state().threads_running = Some(25);
    let services = services(&target, throttled(10, 0), AuditLogger::disabled());
    let mut running = Session::new(services.clone(), "alice", "10.1.1.1");
    let mut admin = Session::new(services.clone(), "bob", "10.1.1.2");
    let id = running.id();

    let operator = async {
        wait_for_sessions(&mut admin, |t| column(t, "threads_running") == vec!["25"]).await;
        admin.handle(&format!("inception kill {id}")).await
    };
    let (table, replies) = tokio::join!(
        run(&mut running, "--enable-execute=1;", &[INSERT_1, INSERT_2]),
        operator
    );

    assert_eq!(replies, vec![Reply::Ok]);
    assert!(target.executed().is_empty());
    assert_eq!(column(&table, "stage"), vec!["EXECUTED", "EXECUTED"]);
    assert_eq!(
        column(&table, "stage_status"),
        vec!["Killed by user", "Killed by user"]
    );
}

#[tokio::test]
async fn test_failed_status_query_aborts_batch() {
    let target = MockTarget::with_tables(&["t1"]);
    target.state().status_error = Some("Access denied; you need the PROCESS privilege".into());
    let mut session = Session::new(
        services(&target, throttled(10, 0), AuditLogger::disabled()),
        "alice",
        "10.1.1.1",
    );

    let table = run(&mut session, "--enable-execute=1;", &[INSERT_1, INSERT_2]).await;

    assert!(target.executed().is_empty());
    assert_eq!(
        column(&table, "stage_status"),
        vec!["Pre-check failed", "Skipped due to prior error"]
    );
    let message = &column(&table, "err_message")[0];
    assert!(message.starts_with("Failed to query remote Threads_running: "), "{message}");
    assert!(message.contains("PROCESS privilege"), "{message}");
}

#[tokio::test]
async fn test_failed_replica_status_aborts_batch() {
    let target = MockTarget::with_tables(&["t1"]);
    target.state().status_error = Some("Access denied; you need the REPLICATION CLIENT privilege".into());
    let mut session = Session::new(
        services(&target, throttled(0, 5), AuditLogger::disabled()),
        "alice",
        "10.1.1.1",
    );

    let table = run(
        &mut session,
        "--enable-execute=1;--slave-hosts=db2:3306;",
        &[INSERT_1],
    )
    .await;

    assert!(target.executed().is_empty());
    assert_eq!(column(&table, "stage_status"), vec!["Pre-check failed"]);
    assert!(column(&table, "err_message")[0].starts_with("Failed to query replica status: "));
}

#[tokio::test]
async fn test_unreachable_target_fails_every_statement() {
    let target = MockTarget::default();
    target.state().unreachable = true;
    let mut session = Session::new(default_services(&target), "alice", "10.1.1.1");

    let table = run(&mut session, "--enable-execute=1;", &[INSERT_1, INSERT_2]).await;

    let message = "Cannot connect to remote server db1:3306 (Connection refused).";
    assert_eq!(column(&table, "err_message"), vec![message, message]);
    assert_eq!(
        column(&table, "stage_status"),
        vec!["Execute failed", "Execute failed"]
    );
    assert_eq!(column(&table, "db_type"), vec!["Unknown", "Unknown"]);
    assert_eq!(target.state().connects, 1);
}

#[tokio::test]
async fn test_execution_is_audited() {
    let target = MockTarget::with_tables(&["t1"]);
    let storage = Arc::new(MemoryStorage::new());
    let audit = AuditLogger::with_storage(AuditConfig::default(), storage.clone());
    let mut session = Session::new(
        services(&target, ExecutionConfig::default(), audit),
        "alice",
        "10.1.1.1",
    );

    run(&mut session, "--enable-execute=1;", &[INSERT_1, INSERT_2]).await;

    let events = storage.events();
    assert_eq!(events.len(), 3);
    match &events[1] {
        AuditEvent::Statement(statement) => {
            assert_eq!(statement.id, 2);
            assert_eq!(statement.sql, INSERT_2);
            assert_eq!(statement.result, "OK");
            assert_eq!(statement.target, "db1:3306");
        }
        other => panic!("expected statement event, got {other:?}"),
    }
    match &events[2] {
        AuditEvent::Session(closed) => {
            assert_eq!(closed.user, "alice");
            assert_eq!(closed.client_host, "10.1.1.1");
            assert_eq!(closed.mode, "EXECUTE");
            assert_eq!(closed.statements, 2);
            assert_eq!(closed.errors, 0);
        }
        other => panic!("expected session event, got {other:?}"),
    }
}
