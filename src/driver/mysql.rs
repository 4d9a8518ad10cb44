//! MySQL/MariaDB [`Driver`] implementation over `sqlx::MySqlPool`.
//!
//! Grounded in `jlon-starrocks-admin`'s `handlers/sql_diag.rs`, which
//! drives `EXPLAIN`/`SELECT VERSION()` over a pooled connection and
//! parses `information_schema` rows by column name; the session/version
//! probing shape carries over, `sqlx::query` replaces that repo's raw
//! string-keyed row access.

use async_trait::async_trait;
use compact_str::CompactString;
use sqlx::{MySqlPool, Row};
use tokio::sync::OnceCell;

use super::{ColumnStats, Driver, ExplainRow, SchemaRecord, capability::Capabilities, parse_version_triplet};
use crate::{
    error::{AppResult, driver_error},
    plan::AccessType
};

pub struct MySqlDriver {
    pool:    MySqlPool,
    version: OnceCell<CompactString>
}

impl MySqlDriver {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            version: OnceCell::new()
        }
    }

    async fn version_triplet(&self) -> AppResult<(u32, u32, u32)> {
        let version = self.get_version().await?;
        parse_version_triplet(&version)
            .ok_or_else(|| driver_error(format!("unrecognized MySQL version string '{version}'")))
    }
}

#[async_trait]
impl Driver for MySqlDriver {
    fn name(&self) -> &'static str {
        "mysql"
    }

    async fn get_version(&self) -> AppResult<CompactString> {
        self.version
            .get_or_try_init(|| async {
                let row = sqlx::query("SELECT VERSION() AS v")
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| driver_error(format!("failed to read server version: {e}")))?;
                let raw: String = row.try_get("v").map_err(|e| driver_error(e.to_string()))?;
                Ok(CompactString::from(raw))
            })
            .await
            .cloned()
    }

    async fn capabilities(&self) -> AppResult<Capabilities> {
        let (major, minor, patch) = self.version_triplet().await?;
        let explain_analyze = (major, minor, patch) >= (8, 0, 18);
        let histograms = (major, minor, patch) >= (8, 0, 0);
        Ok(Capabilities {
            explain_analyze,
            histograms,
            json_explain: major >= 5,
            covering_index_info: true,
            parallel_query: false
        })
    }

    async fn supports_analyze(&self) -> AppResult<bool> {
        Ok(self.capabilities().await?.explain_analyze)
    }

    async fn run_explain(&self, sql: &str) -> AppResult<Vec<ExplainRow>> {
        let rows = sqlx::query(&format!("EXPLAIN {sql}"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| driver_error(format!("EXPLAIN failed: {e}")))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut map = ExplainRow::new();
            for column in row.columns() {
                let name = column.name();
                let value: Option<String> = row.try_get(name).unwrap_or(None);
                map.insert(CompactString::from(name), value.unwrap_or_default());
            }
            out.push(map);
        }
        Ok(out)
    }

    async fn run_explain_analyze(&self, sql: &str) -> AppResult<String> {
        if self.supports_analyze().await? {
            let row = sqlx::query(&format!("EXPLAIN ANALYZE {sql}"))
                .fetch_one(&self.pool)
                .await
                .map_err(|e| driver_error(format!("EXPLAIN ANALYZE failed: {e}")))?;
            row.try_get::<String, _>(0)
                .map_err(|e| driver_error(format!("EXPLAIN ANALYZE returned no plan text: {e}")))
        } else {
            let row = sqlx::query(&format!("EXPLAIN FORMAT=TREE {sql}"))
                .fetch_one(&self.pool)
                .await
                .map_err(|e| driver_error(format!("EXPLAIN FORMAT=TREE failed: {e}")))?;
            row.try_get::<String, _>(0)
                .map_err(|e| driver_error(format!("EXPLAIN FORMAT=TREE returned no plan text: {e}")))
        }
    }

    fn normalize_access_type(&self, raw: &str) -> Option<AccessType> {
        match raw {
            "system" | "const" => Some(AccessType::ConstRow),
            "eq_ref" => Some(AccessType::SingleRowLookup),
            "ref" | "ref_or_null" => Some(AccessType::IndexLookup),
            "fulltext" => Some(AccessType::FulltextIndex),
            "range" => Some(AccessType::IndexRangeScan),
            "index" | "index_merge" => Some(AccessType::IndexScan),
            "ALL" => Some(AccessType::TableScan),
            _ => None
        }
    }

    fn normalize_join_type(&self, raw: &str) -> CompactString {
        let lower = raw.to_lowercase();
        if lower.contains("hash") {
            CompactString::from("hash_join")
        } else if lower.contains("merge") {
            CompactString::from("merge_join")
        } else {
            CompactString::from("nested_loop")
        }
    }

    async fn run_analyze_table(&self, table: &str) -> AppResult<()> {
        sqlx::query(&format!("ANALYZE TABLE {table}"))
            .execute(&self.pool)
            .await
            .map_err(|e| driver_error(format!("ANALYZE TABLE {table} failed: {e}")))?;
        Ok(())
    }

    async fn get_column_stats(&self, table: &str, column: &str) -> AppResult<ColumnStats> {
        let row = sqlx::query(
            "SELECT CARDINALITY AS n_distinct, AVG_ROW_LENGTH AS avg_row_length \
             FROM information_schema.STATISTICS s \
             JOIN information_schema.TABLES t ON t.TABLE_SCHEMA = s.TABLE_SCHEMA AND t.TABLE_NAME = s.TABLE_NAME \
             WHERE s.TABLE_SCHEMA = DATABASE() AND s.TABLE_NAME = ? AND s.COLUMN_NAME = ? LIMIT 1"
        )
        .bind(table)
        .bind(column)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| driver_error(format!("column stats lookup failed: {e}")))?;

        Ok(match row {
            Some(row) => ColumnStats {
                n_distinct:     row.try_get::<Option<i64>, _>("n_distinct").ok().flatten().map(|v| v as f64),
                null_fraction:  None,
                avg_row_length: row.try_get::<Option<f64>, _>("avg_row_length").ok().flatten()
            },
            None => ColumnStats::default()
        })
    }

    async fn table_exists(&self, name: &str) -> AppResult<Option<SchemaRecord>> {
        let row = sqlx::query(
            "SELECT TABLE_NAME FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? LIMIT 1"
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| driver_error(format!("table lookup failed: {e}")))?;

        Ok(row.map(|r| SchemaRecord {
            table_name:  r.try_get("TABLE_NAME").unwrap_or_default(),
            column_name: None
        }))
    }

    async fn list_tables(&self) -> AppResult<Vec<SchemaRecord>> {
        let rows = sqlx::query("SELECT TABLE_NAME FROM information_schema.TABLES WHERE TABLE_SCHEMA = DATABASE()")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| driver_error(format!("table listing failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|r| SchemaRecord {
                table_name:  r.try_get("TABLE_NAME").unwrap_or_default(),
                column_name: None
            })
            .collect())
    }

    async fn column_exists(&self, table: &str, column: &str) -> AppResult<Option<SchemaRecord>> {
        let row = sqlx::query(
            "SELECT TABLE_NAME, COLUMN_NAME FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND COLUMN_NAME = ? LIMIT 1"
        )
        .bind(table)
        .bind(column)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| driver_error(format!("column lookup failed: {e}")))?;

        Ok(row.map(|r| SchemaRecord {
            table_name:  r.try_get("TABLE_NAME").unwrap_or_default(),
            column_name: r.try_get("COLUMN_NAME").ok()
        }))
    }

    async fn list_columns(&self, table: &str) -> AppResult<Vec<SchemaRecord>> {
        let rows = sqlx::query(
            "SELECT TABLE_NAME, COLUMN_NAME FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?"
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| driver_error(format!("column listing failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|r| SchemaRecord {
                table_name:  r.try_get("TABLE_NAME").unwrap_or_default(),
                column_name: r.try_get("COLUMN_NAME").ok()
            })
            .collect())
    }

    async fn run_ddl(&self, ddl: &str) -> AppResult<()> {
        sqlx::query(ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| driver_error(format!("DDL execution failed: {e}")))?;
        Ok(())
    }
}
