//! Rule engine behaviour over whole statements.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use sqlward_core::{
    CostTier, DbType, DbVersion, RuleLevel, RuleSettings, Severity, SqlKind, Stage,
    StatementRecord, TargetError,
};
use sqlward_rules::{AuditContext, Catalog, RemoteColumn, RuleEngine, SchemaSimulator};
use sqlward_sql::{MySqlParser, StatementParser};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// In-memory target schema that counts every lookup.
#[derive(Default)]
struct FakeCatalog {
    tables: HashMap<String, Vec<RemoteColumn>>,
    column_names: HashMap<String, Vec<String>>,
    rows: i64,
    calls: usize,
}

impl FakeCatalog {
    fn with_table(mut self, db: &str, table: &str, columns: &[(&str, &str, Option<i64>)]) -> Self {
        let key = format!("{db}.{table}");
        self.column_names
            .insert(key.clone(), columns.iter().map(|c| c.0.to_string()).collect());
        self.tables.insert(
            key,
            columns
                .iter()
                .map(|(_, ty, len)| RemoteColumn {
                    data_type: ty.to_string(),
                    char_max_length: *len,
                    numeric_precision: None,
                    numeric_scale: None,
                })
                .collect(),
        );
        self
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn database_exists(&mut self, db: &str) -> Result<bool, TargetError> {
        self.calls += 1;
        Ok(self.tables.keys().any(|k| k.starts_with(&format!("{db}."))))
    }

    async fn table_exists(&mut self, db: &str, table: &str) -> Result<bool, TargetError> {
        self.calls += 1;
        Ok(self.tables.contains_key(&format!("{db}.{table}")))
    }

    async fn column_exists(&mut self, db: &str, table: &str, column: &str) -> Result<bool, TargetError> {
        self.calls += 1;
        Ok(self
            .column_names
            .get(&format!("{db}.{table}"))
            .is_some_and(|cols| cols.iter().any(|c| c.eq_ignore_ascii_case(column))))
    }

    async fn index_exists(&mut self, _: &str, _: &str, _: &str) -> Result<bool, TargetError> {
        self.calls += 1;
        Ok(false)
    }

    async fn table_rows(&mut self, _: &str, _: &str) -> Result<Option<i64>, TargetError> {
        self.calls += 1;
        Ok(Some(self.rows))
    }

    async fn column_info(&mut self, db: &str, table: &str, column: &str) -> Result<Option<RemoteColumn>, TargetError> {
        self.calls += 1;
        let key = format!("{db}.{table}");
        let Some(names) = self.column_names.get(&key) else {
            return Ok(None);
        };
        Ok(names
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .map(|i| self.tables[&key][i].clone()))
    }

    async fn explain_rows(&mut self, _: &str, _: &str, _: DbType) -> Result<Option<i64>, TargetError> {
        self.calls += 1;
        Err(TargetError::Query("EXPLAIN not supported".into()))
    }
}

/// Session-scoped state threaded through consecutive statements.
struct Session {
    engine: RuleEngine,
    simulator: SchemaSimulator,
    altered: HashSet<String>,
    catalog: FakeCatalog,
    db_type: DbType,
    connect_error: Option<String>,
    next_id: u32,
}

impl Session {
    fn new(rules: RuleSettings, catalog: FakeCatalog) -> Self {
        Self {
            engine: RuleEngine::new(Arc::new(rules)),
            simulator: SchemaSimulator::new(),
            altered: HashSet::new(),
            catalog,
            db_type: DbType::MySql,
            connect_error: None,
            next_id: 1,
        }
    }

    async fn audit(&mut self, sql: &str) -> StatementRecord {
        let parsed = MySqlParser::new().parse(sql).unwrap();
        let mut record = StatementRecord::new(self.next_id, sql, parsed.kind);
        self.next_id += 1;

        let mut ctx = AuditContext::new(&mut self.simulator, &mut self.altered, "shop")
            .with_target(self.db_type, DbVersion::new(8, 0));
        match &self.connect_error {
            Some(message) => ctx = ctx.with_connect_error(message),
            None => ctx = ctx.with_catalog(&mut self.catalog),
        }
        self.engine.evaluate(&parsed, &mut ctx, &mut record).await;
        record
    }
}

#[tokio::test]
async fn test_bare_table_has_two_findings() {
    let mut session = Session::new(RuleSettings::default(), FakeCatalog::default());
    let record = session.audit("CREATE TABLE users (id BIGINT)").await;

    assert_eq!(record.stage, Stage::Checked);
    assert_eq!(record.stage_status, "Audit completed");
    assert_eq!(record.severity(), Severity::Error);
    assert_eq!(
        record.findings(),
        ["Table must have a PRIMARY KEY.", "Table must have a comment."]
    );
    assert_eq!(record.db_name, "shop");
    assert_eq!(record.table_name, "users");
    assert!(!record.fingerprint.is_empty());
}

#[tokio::test]
async fn test_batch_sees_earlier_statements() {
    let mut session = Session::new(RuleSettings::default(), FakeCatalog::default());

    let create = session
        .audit(
            "CREATE TABLE orders (id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT, \
             PRIMARY KEY (id)) ENGINE=InnoDB COMMENT='orders'",
        )
        .await;
    assert_eq!(create.severity(), Severity::Ok, "{:?}", create.findings());

    let alter = session
        .audit("ALTER TABLE orders ADD COLUMN total INT NOT NULL DEFAULT 0")
        .await;
    assert_eq!(alter.severity(), Severity::Ok, "{:?}", alter.findings());
    assert_eq!(alter.sub_type.as_deref(), Some("ADD_COLUMN"));

    let insert = session
        .audit("INSERT INTO orders (id, total) VALUES (1, 10)")
        .await;
    assert_eq!(insert.severity(), Severity::Ok, "{:?}", insert.findings());

    let missing = session
        .audit("INSERT INTO orders (id, amount) VALUES (1, 10)")
        .await;
    assert_eq!(
        missing.findings(),
        ["Column 'amount' does not exist in 'shop.orders'."]
    );

    // Every lookup was answered by the simulator.
    let existence_calls = session.catalog.calls;
    assert_eq!(existence_calls, 1, "only CREATE TABLE asks the target");
}

#[tokio::test]
async fn test_simulated_table_skips_target() {
    let mut session = Session::new(RuleSettings::default(), FakeCatalog::default());
    session
        .audit("CREATE TABLE t (id INT UNSIGNED NOT NULL, PRIMARY KEY (id)) COMMENT='t'")
        .await;
    let before = session.catalog.calls;
    session.audit("UPDATE t SET id = 2 WHERE id = 1").await;
    session.audit("ALTER TABLE t ADD COLUMN c INT").await;
    assert_eq!(session.catalog.calls, before);
}

#[tokio::test]
async fn test_like_copy_of_remote_table_is_visible_to_batch() {
    let catalog = FakeCatalog::default().with_table("shop", "t1", &[("id", "int", None)]);
    let mut session = Session::new(RuleSettings::default(), catalog);

    let create = session.audit("CREATE TABLE t2 LIKE t1").await;
    assert_eq!(create.severity(), Severity::Ok, "{:?}", create.findings());

    let insert = session.audit("INSERT INTO t2 (id) VALUES (1)").await;
    assert_eq!(insert.severity(), Severity::Ok, "{:?}", insert.findings());

    let alter = session
        .audit("ALTER TABLE t2 ADD COLUMN c INT NOT NULL DEFAULT 0 COMMENT 'x'")
        .await;
    assert_eq!(alter.severity(), Severity::Ok, "{:?}", alter.findings());

    // Columns of the copy are unknown, so a missing one is not reported.
    let drop = session.audit("ALTER TABLE t2 DROP COLUMN legacy").await;
    assert!(
        drop.findings().iter().all(|f| !f.contains("does not exist")),
        "{:?}",
        drop.findings()
    );
}

#[tokio::test]
async fn test_unreachable_target_keeps_structural_rules() {
    let mut session = Session::new(RuleSettings::default(), FakeCatalog::default());
    session.connect_error = Some("Cannot connect to remote server db1:3306 (refused).".into());

    let record = session.audit("UPDATE accounts SET balance = 0").await;
    assert_eq!(
        record.findings(),
        [
            "Cannot connect to remote server db1:3306 (refused).",
            "UPDATE without a WHERE clause is not allowed.",
        ]
    );
    assert_eq!(session.catalog.calls, 0);
}

#[tokio::test]
async fn test_off_rules_never_fire() {
    let mut rules = RuleSettings::default();
    for name in sqlward_core::RuleLevels::NAMES {
        rules.levels.set(name, RuleLevel::Off);
    }
    let mut session = Session::new(rules, FakeCatalog::default());
    let record = session.audit("CREATE TABLE users (id BIGINT)").await;
    assert!(record.findings().is_empty());

    let record = session.audit("DELETE FROM users").await;
    assert!(record.findings().is_empty());
}

#[tokio::test]
async fn test_remote_update_row_estimate() {
    let catalog = FakeCatalog {
        rows: 50_000,
        ..FakeCatalog::default()
    }
    .with_table("shop", "accounts", &[("id", "bigint", None), ("balance", "int", None)]);
    let mut session = Session::new(RuleSettings::default(), catalog);

    let record = session
        .audit("UPDATE accounts SET balance = 0, missing = 1 WHERE id IN (1, 2)")
        .await;
    assert_eq!(record.affected_rows, 50_000);
    assert_eq!(
        record.findings(),
        [
            "Table 'shop.accounts' has approximately 50000 rows, exceeds max 10000. Consider batching the UPDATE.",
            "Column 'missing' does not exist in 'shop.accounts'.",
        ]
    );
    assert_eq!(record.severity(), Severity::Error);
}

#[tokio::test]
async fn test_alter_modify_narrowing_and_cost() {
    let catalog = FakeCatalog::default()
        .with_table("shop", "users", &[("id", "bigint", None), ("name", "varchar", Some(200))]);
    let mut session = Session::new(RuleSettings::default(), catalog);

    let record = session
        .audit("ALTER TABLE users ADD COLUMN age INT NOT NULL DEFAULT 0, MODIFY COLUMN name VARCHAR(100) NOT NULL DEFAULT ''")
        .await;
    assert_eq!(record.sub_type.as_deref(), Some("ADD_COLUMN,MODIFY_COLUMN"));
    assert_eq!(record.cost, Some(CostTier::Copy));
    assert_eq!(
        record.findings(),
        ["Column 'name' length reduced: 200 -> 100, may truncate data."]
    );

    let again = session.audit("ALTER TABLE users DROP INDEX idx_gone").await;
    assert_eq!(
        again.findings(),
        [
            "Index 'idx_gone' does not exist in 'shop.users' on remote server.",
            "Table 'shop.users' has been altered before in this session; consider merging into a single ALTER TABLE statement.",
        ]
    );
}

#[tokio::test]
async fn test_tidb_rejects_combined_alter() {
    let catalog = FakeCatalog::default().with_table("shop", "users", &[("id", "bigint", None)]);
    let mut session = Session::new(RuleSettings::default(), catalog);
    session.db_type = DbType::TiDb;

    let record = session
        .audit("ALTER TABLE users ADD COLUMN a INT NOT NULL DEFAULT 0, ADD COLUMN b INT NOT NULL DEFAULT 0")
        .await;
    assert_eq!(record.severity(), Severity::Error);
    assert_eq!(
        record.findings(),
        ["TiDB does not support multiple operations in a single ALTER TABLE; split into separate statements."]
    );
}

#[tokio::test]
async fn test_existing_table_and_kind() {
    let catalog = FakeCatalog::default().with_table("shop", "users", &[("id", "bigint", None)]);
    let mut session = Session::new(RuleSettings::default(), catalog);
    let record = session
        .audit("CREATE TABLE users (id BIGINT UNSIGNED NOT NULL, PRIMARY KEY (id)) COMMENT='u'")
        .await;
    assert_eq!(record.kind, SqlKind::CreateTable);
    assert_eq!(
        record.findings(),
        ["Table 'shop.users' already exists on remote server."]
    );
}
