//! End-to-end checks of the JSONL audit file.

use pretty_assertions::assert_eq;
use sqlward_audit::{AuditEvent, AuditLogger, SessionIdentity};
use sqlward_core::{AuditConfig, OpMode, SqlKind, StatementRecord};

fn identity() -> SessionIdentity {
    SessionIdentity {
        user: "dba".into(),
        client_host: "10.1.2.3".into(),
        target: "db1:3306".into(),
        target_user: "deploy".into(),
    }
}

#[tokio::test]
async fn test_execute_session_writes_statement_then_session_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit").join("sqlward.jsonl");
    let logger = AuditLogger::new(AuditConfig {
        file: Some(path.clone()),
        ..Default::default()
    })
    .unwrap();

    let mut ok = StatementRecord::new(1, "INSERT INTO t(id) VALUES (1)", SqlKind::Insert);
    ok.affected_rows = 1;
    ok.execute_time = "0.004".to_string();
    let mut failed = StatementRecord::new(2, "INSERT INTO t(id) VALUES (1)", SqlKind::Insert);
    failed.append_error("Execute failed: Duplicate entry '1' for key 'PRIMARY'");

    logger.log_statement(&identity(), &ok).await;
    logger.log_statement(&identity(), &failed).await;
    logger
        .log_session(&identity(), OpMode::Execute, 2, 1, 37)
        .await;

    let content = std::fs::read_to_string(&path).unwrap();
    let events: Vec<AuditEvent> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let kinds: Vec<_> = events.iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec!["statement", "statement", "session"]);

    let raw: serde_json::Value = serde_json::from_str(content.lines().nth(1).unwrap()).unwrap();
    assert_eq!(raw["result"], "ERROR");
    assert_eq!(raw["user"], "dba");

    let session: serde_json::Value = serde_json::from_str(content.lines().last().unwrap()).unwrap();
    assert_eq!(session["type"], "session");
    assert_eq!(session["mode"], "EXECUTE");
    assert_eq!(session["target_user"], "deploy");
    assert_eq!(session["errors"], 1);
    assert_eq!(session["duration_ms"], 37);
}

#[tokio::test]
async fn test_disabled_config_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    let logger = AuditLogger::new(AuditConfig {
        enabled: false,
        file: Some(path.clone()),
        ..Default::default()
    })
    .unwrap();

    logger.log_session(&identity(), OpMode::Check, 1, 0, 1).await;
    assert!(!path.exists());
}

#[tokio::test]
async fn test_existing_file_is_appended() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    std::fs::write(&path, "{\"type\":\"session\",\"previous\":true}\n").unwrap();

    let logger = AuditLogger::new(AuditConfig {
        file: Some(path.clone()),
        ..Default::default()
    })
    .unwrap();
    logger.log_session(&identity(), OpMode::Split, 3, 0, 2).await;

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 2);
    assert!(content.starts_with("{\"type\":\"session\",\"previous\":true}"));
}
