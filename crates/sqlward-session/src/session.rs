//! Per-connection session state machine.
//!
//! A [`Session`] receives the client's text, splits it into statements and
//! classifies each one as a bracket marker, an administrative command or an
//! ordinary statement. Ordinary statements are only accepted inside a
//! bracket, where they are routed to the handler of the session's mode. The
//! commit marker produces the mode's result table.

use crate::admin::{AdminCommand, parse_admin};
use crate::crypto;
use crate::error::SessionError;
use crate::executor::ExecutionController;
use crate::link::TargetLink;
use crate::marker::{Marker, SessionOptions, parse_marker, strip_start_marker};
use crate::registry::{SessionControl, SessionRegistry};
use crate::result::{ResultTable, SplitGroup};
use sqlward_audit::{AuditLogger, SessionIdentity};
use sqlward_core::{
    ExecutionConfig, GatewayConfig, OpMode, SecurityConfig, Severity, SettingsStore, SqlKind,
    Stage, StatementRecord, TargetConnector,
};
use sqlward_rules::{AuditContext, RemoteCatalog, RuleEngine, SchemaSimulator, sql_types};
use sqlward_sql::{
    MySqlParser, ParsedStatement, StatementBody, StatementParser, query_tree, split_statements,
    truncate_at_terminator,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Shared collaborators every session on the gateway uses.
#[derive(Clone)]
pub struct SessionServices {
    pub registry: Arc<SessionRegistry>,
    pub settings: Arc<SettingsStore>,
    pub connector: Arc<dyn TargetConnector>,
    pub parser: Arc<dyn StatementParser>,
    pub audit: AuditLogger,
    pub execution: ExecutionConfig,
    pub security: SecurityConfig,
}

impl std::fmt::Debug for SessionServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionServices")
            .field("registry", &self.registry)
            .field("execution", &self.execution)
            .finish_non_exhaustive()
    }
}

impl SessionServices {
    /// Services with the MySQL parser, a fresh registry and the gateway's
    /// execution and security settings.
    pub fn new(
        config: &GatewayConfig,
        settings: Arc<SettingsStore>,
        connector: Arc<dyn TargetConnector>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new(connector.clone())),
            settings,
            connector,
            parser: Arc::new(MySqlParser::new()),
            audit,
            execution: config.execution.clone(),
            security: config.security.clone(),
        }
    }
}

/// What the client gets back for one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Accepted, nothing to show.
    Ok,
    Table(ResultTable),
    Error(String),
}

impl From<SessionError> for Reply {
    fn from(e: SessionError) -> Self {
        Self::Error(e.to_string())
    }
}

/// State of an open bracket.
struct ActiveSession {
    options: SessionOptions,
    control: Arc<SessionControl>,
    engine: RuleEngine,
    link: TargetLink,
    simulator: SchemaSimulator,
    altered_tables: HashSet<String>,
    ambient_db: String,
    records: Vec<StatementRecord>,
    groups: Vec<SplitGroup>,
    /// Key of the last SPLIT group: (db, table, is_ddl). `None` after a
    /// statement that must stand alone.
    group_key: Option<(String, String, bool)>,
    trees: Vec<(String, String)>,
    tree_errors: usize,
    started: Instant,
}

/// One client connection's view of the gateway.
pub struct Session {
    id: u32,
    services: Arc<SessionServices>,
    client_user: String,
    client_host: String,
    /// Database selected by the last `USE`, kept across brackets.
    current_db: String,
    active: Option<ActiveSession>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("client_user", &self.client_user)
            .field("client_host", &self.client_host)
            .field("active", &self.active.is_some())
            .finish()
    }
}

impl Session {
    pub fn new(
        services: Arc<SessionServices>,
        client_user: impl Into<String>,
        client_host: impl Into<String>,
    ) -> Self {
        let id = services.registry.next_session_id();
        Self {
            id,
            services,
            client_user: client_user.into(),
            client_host: client_host.into(),
            current_db: String::new(),
            active: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Whether a bracket is open.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn mode(&self) -> Option<OpMode> {
        self.active.as_ref().map(|a| a.options.mode)
    }

    /// Process one client message, returning one reply per statement.
    pub async fn handle(&mut self, text: &str) -> Vec<Reply> {
        let mut replies = Vec::new();
        for statement in split_statements(text) {
            replies.push(self.handle_statement(&statement).await);
        }
        replies
    }

    async fn handle_statement(&mut self, text: &str) -> Reply {
        let security = &self.services.security;
        match parse_marker(text, security) {
            Err(e) => return e.into(),
            Ok(Some(Marker::Commit)) => {
                return match self.active.take() {
                    Some(active) => self.commit(active).await,
                    None => SessionError::CommitWithoutStart.into(),
                };
            }
            Ok(Some(Marker::Start { options, rest })) => {
                let rest = rest.to_string();
                self.start(options);
                if rest.is_empty() {
                    return Reply::Ok;
                }
                return self.route(&rest).await;
            }
            Ok(None) => {}
        }

        if let Some(command) = parse_admin(text) {
            return match command {
                Ok(command) => self.admin(command).await,
                Err(e) => e.into(),
            };
        }

        // Clients check the connection with this; it is answered locally and
        // never cached as a statement, inside a bracket or not.
        if is_select_database(text) {
            let db = match &self.active {
                Some(active) => active.ambient_db.clone(),
                None => self.current_db.clone(),
            };
            return Reply::Table(ResultTable::single("DATABASE()", db));
        }

        self.route(text).await
    }

    fn start(&mut self, options: SessionOptions) {
        if let Some(previous) = self.active.take() {
            tracing::warn!(
                session_id = self.id,
                statements = previous.records.len(),
                "Start marker inside an open session, discarding it"
            );
        }

        let control = Arc::new(SessionControl::new(
            self.id,
            options.target.clone(),
            options.mode,
            options.sleep_ms,
        ));
        self.services.registry.register(control.clone());

        tracing::info!(
            session_id = self.id,
            mode = %options.mode,
            target = %options.target.address(),
            force = options.force,
            ignore_warnings = options.ignore_warnings,
            "Session started"
        );

        self.active = Some(ActiveSession {
            engine: RuleEngine::new(self.services.settings.snapshot()),
            options,
            control,
            link: TargetLink::default(),
            simulator: SchemaSimulator::new(),
            altered_tables: HashSet::new(),
            ambient_db: self.current_db.clone(),
            records: Vec::new(),
            groups: Vec::new(),
            group_key: None,
            trees: Vec::new(),
            tree_errors: 0,
            started: Instant::now(),
        });
    }

    /// Hand an ordinary statement to the open session's mode.
    async fn route(&mut self, text: &str) -> Reply {
        let services = self.services.clone();
        let Some(active) = self.active.as_mut() else {
            return SessionError::NotInSession.into();
        };

        let sql = strip_start_marker(text).trim();
        if sql.is_empty() {
            return Reply::Ok;
        }
        let parsed = services.parser.parse(sql);

        match active.options.mode {
            OpMode::Check | OpMode::Execute => active.audit(&services, sql, parsed).await,
            OpMode::Split => active.split(sql, parsed),
            OpMode::QueryTree => active.tree(sql, parsed),
        }
        self.current_db = active.ambient_db.clone();
        Reply::Ok
    }

    async fn commit(&mut self, mut active: ActiveSession) -> Reply {
        let services = self.services.clone();
        let identity = SessionIdentity {
            user: self.client_user.clone(),
            client_host: self.client_host.clone(),
            target: active.options.target.address(),
            target_user: active.options.target.user.clone(),
        };

        let mode = active.options.mode;
        let (table, statements, errors) = match mode {
            OpMode::Check | OpMode::Execute => {
                if mode == OpMode::Execute {
                    ExecutionController::new(
                        &active.control,
                        &active.options,
                        &services.execution,
                        services.connector.as_ref(),
                        &services.audit,
                        &identity,
                    )
                    .run(&mut active.link, &mut active.records)
                    .await;
                }
                let errors = active
                    .records
                    .iter()
                    .filter(|r| r.severity() == Severity::Error)
                    .count();
                (
                    ResultTable::check(&active.records, active.link.profile()),
                    active.records.len(),
                    errors,
                )
            }
            OpMode::Split => (ResultTable::split(&active.groups), active.groups.len(), 0),
            OpMode::QueryTree => (
                ResultTable::tree(&active.trees),
                active.trees.len(),
                active.tree_errors,
            ),
        };

        let duration_ms = u64::try_from(active.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        services
            .audit
            .log_session(&identity, mode, statements, errors, duration_ms)
            .await;
        services.registry.unregister(self.id);

        tracing::info!(
            session_id = self.id,
            %mode,
            statements,
            errors,
            duration_ms,
            "Session committed"
        );
        Reply::Table(table)
    }

    async fn admin(&mut self, command: AdminCommand) -> Reply {
        let services = &self.services;
        match command {
            AdminCommand::SqlTypes => Reply::Table(ResultTable::sql_types(&sql_types())),
            AdminCommand::EncryptPassword(plain) => match services.security.key() {
                Some(key) => Reply::Table(ResultTable::encrypted_password(
                    crypto::encrypt_password(&plain, key),
                )),
                None => SessionError::EncryptKeyMissing.into(),
            },
            AdminCommand::ShowSessions => {
                Reply::Table(ResultTable::sessions(&services.registry.snapshot()))
            }
            AdminCommand::SetSleep { session_id, ms } => {
                if services.registry.set_pacing_delay(session_id, ms) {
                    Reply::Ok
                } else {
                    SessionError::SessionNotFound(session_id).into()
                }
            }
            AdminCommand::SetRule { name, value } => {
                match services.settings.set(&name, &value) {
                    Ok(()) => Reply::Ok,
                    Err(e) => SessionError::InvalidSetting(e.to_string()).into(),
                }
            }
            AdminCommand::Kill { session_id, force } => {
                if services.registry.kill(session_id, force).await {
                    Reply::Ok
                } else {
                    SessionError::SessionNotFound(session_id).into()
                }
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.active.is_some() {
            tracing::debug!(session_id = self.id, "Connection closed inside an open session");
        }
        self.services.registry.unregister(self.id);
    }
}

fn is_select_database(text: &str) -> bool {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    compact == "selectdatabase()"
}

impl ActiveSession {
    fn next_id(&self) -> u32 {
        u32::try_from(self.records.len() + 1).unwrap_or(u32::MAX)
    }

    fn push_record(&mut self, record: StatementRecord) {
        self.records.push(record);
        self.control.set_total_sql(self.records.len());
    }

    /// CHECK and EXECUTE: audit and cache.
    async fn audit(
        &mut self,
        services: &SessionServices,
        sql: &str,
        parsed: Result<ParsedStatement, sqlward_sql::SqlError>,
    ) {
        let id = self.next_id();
        let stmt = match parsed {
            Ok(stmt) => stmt,
            Err(e) => {
                let mut record = StatementRecord::new(id, truncate_at_terminator(sql), SqlKind::Other);
                record.stage = Stage::Checked;
                record.stage_status = "Audit completed".to_string();
                record.db_name = self.ambient_db.clone();
                record.append_error(format!("SQL parse error: {e}"));
                tracing::debug!(session_id = self.control.id(), statement_id = id, error = %e, "Parse failed");
                self.push_record(record);
                return;
            }
        };

        self.link
            .connect_once(services.connector.as_ref(), &self.options.target, &self.control)
            .await;

        let mut record = StatementRecord::new(id, sql, stmt.kind);
        {
            let (db_type, db_version) = self.link.profile().unwrap_or_default();
            let connect_error = self.link.error().map(str::to_string);
            let mut catalog = self.link.connection().map(RemoteCatalog::new);

            let mut ctx =
                AuditContext::new(&mut self.simulator, &mut self.altered_tables, &self.ambient_db)
                    .with_target(db_type, db_version);
            if let Some(catalog) = catalog.as_mut() {
                ctx = ctx.with_catalog(catalog);
            }
            if let Some(message) = connect_error.as_deref() {
                ctx = ctx.with_connect_error(message);
            }
            self.engine.evaluate(&stmt, &mut ctx, &mut record).await;
        }

        if let StatementBody::Use { database } = &stmt.body {
            self.ambient_db = database.clone();
        }
        self.push_record(record);
    }

    /// SPLIT: merge consecutive statements on the same table and class.
    fn split(&mut self, sql: &str, parsed: Result<ParsedStatement, sqlward_sql::SqlError>) {
        let stmt = match parsed {
            Ok(stmt) => stmt,
            Err(_) => {
                self.groups.push(SplitGroup {
                    sql: format!("{};\n", truncate_at_terminator(sql)),
                    ddl_flag: false,
                });
                self.group_key = None;
                return;
            }
        };

        match &stmt.body {
            StatementBody::Use { database } => {
                self.ambient_db = database.clone();
                return;
            }
            StatementBody::Set => return,
            _ => {}
        }

        let db = match (stmt.primary_table(), stmt.database_name()) {
            (Some(table), _) => table.db_or(&self.ambient_db).to_string(),
            (None, Some(db)) => db.to_string(),
            (None, None) => self.ambient_db.clone(),
        };
        let table = stmt
            .primary_table()
            .map(|t| t.name.to_ascii_lowercase())
            .unwrap_or_default();
        let key = (db.to_ascii_lowercase(), table, stmt.kind.is_ddl());
        let high_risk = matches!(stmt.kind, SqlKind::AlterTable | SqlKind::DropTable);

        if self.group_key.as_ref() != Some(&key) || self.groups.is_empty() {
            let use_db = if self.ambient_db.is_empty() { &db } else { &self.ambient_db };
            let sql = if use_db.is_empty() {
                String::new()
            } else {
                format!("USE {use_db};\n")
            };
            self.groups.push(SplitGroup {
                sql,
                ddl_flag: false,
            });
            self.group_key = Some(key);
        }
        if let Some(group) = self.groups.last_mut() {
            group.sql.push_str(&stmt.text);
            group.sql.push_str(";\n");
            group.ddl_flag |= high_risk;
        }
    }

    /// QUERY_TREE: one JSON description per statement.
    fn tree(&mut self, sql: &str, parsed: Result<ParsedStatement, sqlward_sql::SqlError>) {
        let tree = match parsed {
            Ok(stmt) => {
                match &stmt.body {
                    StatementBody::Use { database } => {
                        self.ambient_db = database.clone();
                        return;
                    }
                    StatementBody::Set => return,
                    _ => {}
                }
                query_tree(&stmt, &self.ambient_db)
            }
            Err(e) => {
                self.tree_errors += 1;
                serde_json::json!({ "error": format!("SQL parse error: {e}") })
            }
        };
        self.trees
            .push((truncate_at_terminator(sql).to_string(), tree.to_string()));
    }
}
