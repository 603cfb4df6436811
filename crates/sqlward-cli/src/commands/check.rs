//! `sqlward check` - audit a SQL file in CHECK mode.
//!
//! The file is wrapped in a session bracket and run through the same session
//! machinery the gateway uses, so the output matches what a client would get.

use super::render_vertical;
use anyhow::{Context, Result, bail};
use sqlward_adapter_mysql::MySqlConnector;
use sqlward_audit::AuditLogger;
use sqlward_core::{GatewayConfig, SettingsStore};
use sqlward_session::{Reply, ResultTable, Session, SessionServices};
use std::fs;
use std::path::Path;
use std::sync::Arc;

const COMMIT_MARKER: &str = "/*inception_magic_commit;*/";

/// Where the statements are checked against.
#[derive(Debug, Clone)]
pub struct TargetArgs {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Wrap `sql` in a CHECK-mode bracket for `target`.
pub fn bracket(sql: &str, target: &TargetArgs) -> String {
    let mut marker = String::from("/*");
    if let Some(user) = &target.user {
        marker.push_str(&format!("--user={user};"));
    }
    if let Some(password) = &target.password {
        marker.push_str(&format!("--password={password};"));
    }
    marker.push_str(&format!(
        "--host={};--port={};--enable-check=1;inception_magic_start;*/",
        target.host, target.port
    ));

    let mut text = marker;
    text.push('\n');
    text.push_str(sql.trim_end());
    if !text.ends_with(';') {
        text.push(';');
    }
    text.push('\n');
    text.push_str(COMMIT_MARKER);
    text
}

/// Pick the check table out of the session replies, failing on the first
/// protocol error.
pub fn check_table(replies: Vec<Reply>) -> Result<ResultTable> {
    let mut table = None;
    for reply in replies {
        match reply {
            Reply::Error(message) => bail!(message),
            Reply::Table(result) => table = Some(result),
            Reply::Ok => {}
        }
    }
    table.context("session returned no result table")
}

/// Number of rows whose `err_level` is 2.
pub fn error_count(table: &ResultTable) -> usize {
    let Some(level) = table.columns.iter().position(|c| c == "err_level") else {
        return 0;
    };
    table.rows.iter().filter(|row| row[level] == "2").count()
}

pub async fn run(file: &Path, config: Option<&Path>, target: TargetArgs, json: bool) -> Result<()> {
    let sql = fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let config = match config {
        Some(path) => GatewayConfig::load_with_context(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => GatewayConfig::default(),
    };

    let settings = Arc::new(SettingsStore::new(config.rules.clone()));
    let connector = Arc::new(MySqlConnector::from_config(&config.execution));
    let services = Arc::new(SessionServices::new(
        &config,
        settings,
        connector,
        AuditLogger::disabled(),
    ));

    tracing::debug!(file = %file.display(), host = %target.host, port = target.port, "Checking SQL file");

    let mut session = Session::new(services, "sqlward-cli", "localhost");
    let table = check_table(session.handle(&bracket(&sql, &target)).await)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&table)?);
    } else {
        print!("{}", render_vertical(&table));
    }

    let errors = error_count(&table);
    if errors > 0 {
        bail!("{errors} statement(s) failed the audit");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn target() -> TargetArgs {
        TargetArgs {
            host: "db1".to_string(),
            port: 3307,
            user: Some("deploy".to_string()),
            password: None,
        }
    }

    #[test]
    fn test_bracket_wraps_file() {
        let text = bracket("USE shop;\nSELECT 1\n", &target());
        assert_eq!(
            text,
            "/*--user=deploy;--host=db1;--port=3307;--enable-check=1;inception_magic_start;*/\n\
             USE shop;\nSELECT 1;\n/*inception_magic_commit;*/"
        );
    }

    #[test]
    fn test_check_table_surfaces_protocol_errors() {
        let err = check_table(vec![Reply::Error("Invalid port.".to_string())]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid port.");
    }

    #[test]
    fn test_error_count() {
        let mut table = ResultTable::new(&["id", "err_level"]);
        table.push_row(vec!["1".to_string(), "0".to_string()]);
        table.push_row(vec!["2".to_string(), "2".to_string()]);
        table.push_row(vec!["3".to_string(), "1".to_string()]);

        assert_eq!(error_count(&table), 1);
        assert_eq!(check_table(vec![Reply::Ok, Reply::Table(table)]).unwrap().rows.len(), 3);
    }
}
