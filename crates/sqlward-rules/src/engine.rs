//! Rule engine entry point.

use crate::checks::{alter, create, dml};
use crate::context::AuditContext;
use sqlward_core::{RuleSettings, Stage, StatementRecord};
use sqlward_sql::{ParsedStatement, StatementBody, fingerprint};
use std::sync::Arc;

/// Finding attached to every statement of a session whose target could not
/// be reached.
pub fn connect_error_message(host: &str, port: u16, reason: &str) -> String {
    format!("Cannot connect to remote server {host}:{port} ({reason}).")
}

/// Evaluates statements against one snapshot of the rule settings.
///
/// Evaluation never fails: problems end up as findings on the record, and a
/// failed catalog lookup only skips the rule that needed it.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Arc<RuleSettings>,
}

impl RuleEngine {
    pub fn new(rules: Arc<RuleSettings>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSettings {
        &self.rules
    }

    /// Audit one statement, updating `record` and the session context.
    pub async fn evaluate(
        &self,
        stmt: &ParsedStatement,
        ctx: &mut AuditContext<'_>,
        record: &mut StatementRecord,
    ) {
        let rules = self.rules.as_ref();
        record.stage = Stage::Checked;
        record.stage_status = "Audit completed".to_string();
        record.kind = stmt.kind;

        if let Some(message) = ctx.connect_error {
            record.append_error(message);
        }

        if let Some(table) = stmt.primary_table() {
            record.db_name = table.db_or(ctx.ambient_db).to_string();
            record.table_name = table.name.clone();
        } else if let Some(db) = stmt.database_name() {
            record.db_name = db.to_string();
        } else {
            record.db_name = ctx.ambient_db.to_string();
        }

        match &stmt.body {
            StatementBody::CreateTable(create_table) => {
                create::check_create_table(rules, create_table, ctx, record).await
            }
            StatementBody::AlterTable(alter_table) => {
                alter::check_alter_table(rules, alter_table, ctx, record).await
            }
            StatementBody::CreateDatabase { name, charset } => {
                create::check_create_database(rules, name, charset.as_deref(), ctx, record).await
            }
            StatementBody::DropDatabase { name } => {
                create::check_drop_database(rules, name, ctx, record).await
            }
            StatementBody::DropTable { .. } => create::check_drop_table(rules, record),
            StatementBody::Truncate { table } => {
                create::check_truncate(rules, table, ctx, record).await
            }
            StatementBody::Insert(insert) => dml::check_insert(rules, insert, ctx, record).await,
            StatementBody::Update(update) => {
                dml::check_update(rules, update, &stmt.text, ctx, record).await
            }
            StatementBody::Delete(delete) => {
                dml::check_delete(rules, delete, &stmt.text, ctx, record).await
            }
            StatementBody::Select(select) => dml::check_select(rules, select, record),
            StatementBody::Use { .. } | StatementBody::Set | StatementBody::Other { .. } => {}
        }

        record.fingerprint = fingerprint(&stmt.text).unwrap_or_default();

        tracing::debug!(
            id = record.id,
            kind = %stmt.kind,
            severity = %record.severity(),
            findings = record.findings().len(),
            "Statement audited"
        );
    }
}
