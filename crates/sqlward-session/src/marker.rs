//! Session bracket markers.
//!
//! A session opens with a statement whose leading comment carries the
//! options and the `inception_magic_start` keyword:
//!
//! ```text
//! /*--user=root;--password=xxx;--host=10.0.0.1;--port=3306;--enable-execute=1;inception_magic_start;*/
//! ```
//!
//! and closes with a comment containing `inception_magic_commit`. The bare
//! keywords on their own are accepted too.

use crate::crypto;
use crate::error::SessionError;
use sqlward_core::{OpMode, SecurityConfig, TargetDescriptor};

pub const START_KEYWORD: &str = "inception_magic_start";
pub const COMMIT_KEYWORD: &str = "inception_magic_commit";

const DEFAULT_PORT: u16 = 3306;

/// What a statement means to the bracket protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker<'a> {
    /// Opens a session. `rest` is any SQL after the marker comment.
    Start { options: SessionOptions, rest: &'a str },
    Commit,
}

/// Options carried by a start marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub target: TargetDescriptor,
    pub mode: OpMode,
    /// Keep executing after a failed statement.
    pub force: bool,
    pub ignore_warnings: bool,
    /// Accepted for compatibility; no backup is taken.
    pub remote_backup: bool,
    /// Initial pacing delay between executed statements.
    pub sleep_ms: u64,
    pub replicas: Vec<(String, u16)>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            target: TargetDescriptor::new("", DEFAULT_PORT),
            mode: OpMode::Check,
            force: false,
            ignore_warnings: false,
            remote_backup: false,
            sleep_ms: 0,
            replicas: Vec::new(),
        }
    }
}

impl SessionOptions {
    /// Replica endpoints with the session's credentials.
    pub fn replica_targets(&self) -> Vec<TargetDescriptor> {
        self.replicas
            .iter()
            .map(|(host, port)| TargetDescriptor {
                host: host.clone(),
                port: *port,
                user: self.target.user.clone(),
                password: self.target.password.clone(),
            })
            .collect()
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

/// The statement's leading `/* ... */` comment body and the text after it.
fn leading_comment(text: &str) -> Option<(&str, &str)> {
    let body = text.trim_start().strip_prefix("/*")?;
    let close = body.find("*/")?;
    Some((&body[..close], body[close + 2..].trim()))
}

/// Classify `text` as a start or commit marker.
///
/// Returns `Ok(None)` for any other statement.
pub fn parse_marker<'a>(
    text: &'a str,
    security: &SecurityConfig,
) -> Result<Option<Marker<'a>>, SessionError> {
    let (comment, rest) = match leading_comment(text) {
        Some(found) => found,
        None => {
            let bare = text.trim();
            if bare.eq_ignore_ascii_case(COMMIT_KEYWORD) {
                return Ok(Some(Marker::Commit));
            }
            if bare.eq_ignore_ascii_case(START_KEYWORD) {
                return Ok(Some(Marker::Start {
                    options: parse_options("", security)?,
                    rest: "",
                }));
            }
            return Ok(None);
        }
    };

    if contains_ci(comment, COMMIT_KEYWORD) {
        return Ok(Some(Marker::Commit));
    }
    if !contains_ci(comment, START_KEYWORD) {
        return Ok(None);
    }

    let options = parse_options(comment, security)?;
    // Clients often repeat the keyword as a statement after the comment.
    let rest = if rest.eq_ignore_ascii_case(START_KEYWORD) {
        ""
    } else {
        rest
    };
    Ok(Some(Marker::Start { options, rest }))
}

/// Parse `--key=value;` options out of a start comment body.
pub fn parse_options(comment: &str, security: &SecurityConfig) -> Result<SessionOptions, SessionError> {
    let mut options = SessionOptions::default();

    for token in comment.split(';') {
        let token = token.trim();
        let token = token.strip_prefix("--").unwrap_or(token);
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        apply_option(&mut options, key.trim(), value.trim())?;
    }

    if options.target.user.is_empty() {
        if let Some(user) = security.default_user.as_deref() {
            options.target.user = user.to_string();
        }
    }
    if options.target.password.is_empty() {
        if let Some(password) = security.default_password.as_deref() {
            options.target.password = password.to_string();
        }
    }
    if options.target.password.starts_with(crypto::PREFIX) {
        if let Some(key) = security.key() {
            match crypto::decrypt_password(&options.target.password, key) {
                Ok(plain) => options.target.password = plain,
                Err(e) => tracing::warn!(error = %e, "Could not decrypt session password, using it verbatim"),
            }
        }
    }

    Ok(options)
}

fn flag(value: &str) -> bool {
    value.starts_with('1')
}

fn apply_option(options: &mut SessionOptions, key: &str, value: &str) -> Result<(), SessionError> {
    match key.to_ascii_lowercase().as_str() {
        "host" => options.target.host = value.to_string(),
        "user" => options.target.user = value.to_string(),
        "password" => options.target.password = value.to_string(),
        "port" => {
            options.target.port = value
                .parse::<u16>()
                .ok()
                .filter(|p| *p > 0)
                .ok_or(SessionError::InvalidMarker)?;
        }
        "enable-check" if flag(value) => options.mode = OpMode::Check,
        "enable-execute" if flag(value) => options.mode = OpMode::Execute,
        "enable-split" if flag(value) => options.mode = OpMode::Split,
        "enable-query-tree" if flag(value) => options.mode = OpMode::QueryTree,
        "enable-force" => options.force = flag(value),
        "enable-ignore-warnings" => options.ignore_warnings = flag(value),
        "enable-remote-backup" => options.remote_backup = flag(value),
        "sleep" => options.sleep_ms = value.parse().unwrap_or(0),
        "slave-hosts" | "slave_hosts" => options.replicas = parse_replicas(value),
        _ => {}
    }
    Ok(())
}

/// `host:port,host:port`, split at the last colon. Entries without a
/// valid port are dropped.
fn parse_replicas(value: &str) -> Vec<(String, u16)> {
    value
        .split(',')
        .filter_map(|entry| {
            let (host, port) = entry.trim().rsplit_once(':')?;
            let port = port.parse::<u16>().ok().filter(|p| *p > 0)?;
            (!host.is_empty()).then(|| (host.to_string(), port))
        })
        .collect()
}

/// Remove a leading start-marker comment from statement text.
pub fn strip_start_marker(text: &str) -> &str {
    match leading_comment(text) {
        Some((comment, rest)) if contains_ci(comment, START_KEYWORD) => rest,
        _ => text,
    }
}
