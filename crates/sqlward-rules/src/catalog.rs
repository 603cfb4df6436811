//! Remote schema lookups used by existence checks and row estimates.

use async_trait::async_trait;
use sqlward_core::{DbType, TargetConnection, TargetError};
use sqlward_sql::ColumnType;

/// Column metadata from `information_schema.COLUMNS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteColumn {
    /// `DATA_TYPE`, e.g. `int` or `varchar`.
    pub data_type: String,
    pub char_max_length: Option<i64>,
    pub numeric_precision: Option<i64>,
    pub numeric_scale: Option<i64>,
}

impl RemoteColumn {
    /// Column type with the declared length or precision filled in.
    pub fn column_type(&self) -> ColumnType {
        let to_u32 = |v: Option<i64>| v.and_then(|v| u32::try_from(v).ok());
        match ColumnType::from_sql(&self.data_type) {
            ColumnType::Char(n) => ColumnType::Char(to_u32(self.char_max_length).unwrap_or(n)),
            ColumnType::Varchar(n) => {
                ColumnType::Varchar(to_u32(self.char_max_length).unwrap_or(n))
            }
            ColumnType::Decimal { precision, scale } => ColumnType::Decimal {
                precision: to_u32(self.numeric_precision).unwrap_or(precision),
                scale: to_u32(self.numeric_scale).unwrap_or(scale),
            },
            other => other,
        }
    }
}

/// Schema questions the rule engine asks the target.
///
/// Implementations return errors as-is; the engine treats a failed lookup as
/// "unknown" and skips the dependent rule.
#[async_trait]
pub trait Catalog: Send {
    async fn database_exists(&mut self, db: &str) -> Result<bool, TargetError>;

    async fn table_exists(&mut self, db: &str, table: &str) -> Result<bool, TargetError>;

    async fn column_exists(
        &mut self,
        db: &str,
        table: &str,
        column: &str,
    ) -> Result<bool, TargetError>;

    async fn index_exists(
        &mut self,
        db: &str,
        table: &str,
        index: &str,
    ) -> Result<bool, TargetError>;

    /// `TABLE_ROWS` estimate, `None` when the table is unknown.
    async fn table_rows(&mut self, db: &str, table: &str) -> Result<Option<i64>, TargetError>;

    async fn column_info(
        &mut self,
        db: &str,
        table: &str,
        column: &str,
    ) -> Result<Option<RemoteColumn>, TargetError>;

    /// Optimizer row estimate for a DML statement.
    async fn explain_rows(
        &mut self,
        db: &str,
        sql: &str,
        db_type: DbType,
    ) -> Result<Option<i64>, TargetError>;
}

/// Escape a value for use inside a single-quoted SQL literal.
pub fn quote_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "''")
}

/// Backtick-quote an identifier.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// [`Catalog`] backed by a live target connection.
pub struct RemoteCatalog<'a> {
    conn: &'a mut dyn TargetConnection,
}

impl<'a> RemoteCatalog<'a> {
    pub fn new(conn: &'a mut dyn TargetConnection) -> Self {
        Self { conn }
    }

    async fn any_rows(&mut self, sql: &str) -> Result<bool, TargetError> {
        Ok(!self.conn.query(sql).await?.is_empty())
    }
}

fn cell_i64(row: &[Option<String>], i: usize) -> Option<i64> {
    row.get(i)?.as_deref()?.trim().parse().ok()
}

#[async_trait]
impl Catalog for RemoteCatalog<'_> {
    async fn database_exists(&mut self, db: &str) -> Result<bool, TargetError> {
        self.any_rows(&format!("SHOW DATABASES LIKE '{}'", quote_literal(db)))
            .await
    }

    async fn table_exists(&mut self, db: &str, table: &str) -> Result<bool, TargetError> {
        self.any_rows(&format!(
            "SELECT 1 FROM information_schema.TABLES WHERE TABLE_SCHEMA='{}' AND TABLE_NAME='{}'",
            quote_literal(db),
            quote_literal(table)
        ))
        .await
    }

    async fn column_exists(
        &mut self,
        db: &str,
        table: &str,
        column: &str,
    ) -> Result<bool, TargetError> {
        self.any_rows(&format!(
            "SELECT 1 FROM information_schema.COLUMNS WHERE TABLE_SCHEMA='{}' AND TABLE_NAME='{}' AND COLUMN_NAME='{}'",
            quote_literal(db),
            quote_literal(table),
            quote_literal(column)
        ))
        .await
    }

    async fn index_exists(
        &mut self,
        db: &str,
        table: &str,
        index: &str,
    ) -> Result<bool, TargetError> {
        self.any_rows(&format!(
            "SELECT 1 FROM information_schema.STATISTICS WHERE TABLE_SCHEMA='{}' AND TABLE_NAME='{}' AND INDEX_NAME='{}' LIMIT 1",
            quote_literal(db),
            quote_literal(table),
            quote_literal(index)
        ))
        .await
    }

    async fn table_rows(&mut self, db: &str, table: &str) -> Result<Option<i64>, TargetError> {
        let rows = self
            .conn
            .query(&format!(
                "SELECT TABLE_ROWS FROM information_schema.TABLES WHERE TABLE_SCHEMA='{}' AND TABLE_NAME='{}'",
                quote_literal(db),
                quote_literal(table)
            ))
            .await?;
        Ok(rows.first().and_then(|row| cell_i64(row, 0)))
    }

    async fn column_info(
        &mut self,
        db: &str,
        table: &str,
        column: &str,
    ) -> Result<Option<RemoteColumn>, TargetError> {
        let rows = self
            .conn
            .query(&format!(
                "SELECT DATA_TYPE, CHARACTER_MAXIMUM_LENGTH, NUMERIC_PRECISION, NUMERIC_SCALE \
                 FROM information_schema.COLUMNS WHERE TABLE_SCHEMA='{}' AND TABLE_NAME='{}' AND COLUMN_NAME='{}'",
                quote_literal(db),
                quote_literal(table),
                quote_literal(column)
            ))
            .await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let Some(data_type) = row.first().cloned().flatten() else {
            return Ok(None);
        };
        Ok(Some(RemoteColumn {
            data_type,
            char_max_length: cell_i64(row, 1),
            numeric_precision: cell_i64(row, 2),
            numeric_scale: cell_i64(row, 3),
        }))
    }

    async fn explain_rows(
        &mut self,
        db: &str,
        sql: &str,
        db_type: DbType,
    ) -> Result<Option<i64>, TargetError> {
        self.conn.execute(&format!("USE {}", quote_ident(db))).await?;
        let rows = self.conn.query(&format!("EXPLAIN {sql}")).await?;

        // MySQL reports `rows` in column 9; TiDB reports `estRows` in column 1
        // and only the root operator counts.
        let (column, root_only) = match db_type {
            DbType::MySql => (9, false),
            DbType::TiDb => (1, true),
        };
        let mut estimates = rows.iter().filter_map(|row| {
            row.get(column)?
                .as_deref()?
                .trim()
                .parse::<f64>()
                .ok()
                .map(|v| v as i64)
        });
        Ok(if root_only {
            estimates.next()
        } else {
            estimates.reduce(|a, b| a + b)
        })
    }
}
