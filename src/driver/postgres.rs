//! PostgreSQL [`Driver`] implementation over `sqlx::PgPool`.
//!
//! `EXPLAIN (ANALYZE, FORMAT TEXT)` already emits the same indented
//! `->` tree shape MySQL's `EXPLAIN ANALYZE` does, so it flows through
//! the same [`crate::plan::parse`] unchanged - only the node-type and
//! statistics vocabulary differs per engine.

use async_trait::async_trait;
use compact_str::CompactString;
use sqlx::{PgPool, Row};
use tokio::sync::OnceCell;

use super::{ColumnStats, Driver, ExplainRow, SchemaRecord, capability::Capabilities, parse_version_triplet};
use crate::{
    error::{AppResult, driver_error},
    plan::AccessType
};

pub struct PostgresDriver {
    pool:    PgPool,
    version: OnceCell<CompactString>
}

impl PostgresDriver {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            version: OnceCell::new()
        }
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn get_version(&self) -> AppResult<CompactString> {
        self.version
            .get_or_try_init(|| async {
                let row: (String,) = sqlx::query_as("SHOW server_version")
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| driver_error(format!("failed to read server version: {e}")))?;
                Ok(CompactString::from(row.0))
            })
            .await
            .cloned()
    }

    async fn capabilities(&self) -> AppResult<Capabilities> {
        let version = self.get_version().await?;
        let major = parse_version_triplet(&version).map(|(m, _, _)| m).unwrap_or(0);
        Ok(Capabilities {
            explain_analyze: true,
            histograms: true,
            json_explain: true,
            covering_index_info: major >= 9,
            parallel_query: major >= 9
        })
    }

    async fn supports_analyze(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn run_explain(&self, sql: &str) -> AppResult<Vec<ExplainRow>> {
        let rows = sqlx::query(&format!("EXPLAIN {sql}"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| driver_error(format!("EXPLAIN failed: {e}")))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut map = ExplainRow::new();
            let line: String = row.try_get(0).unwrap_or_default();
            map.insert(CompactString::from("QUERY PLAN"), line);
            out.push(map);
        }
        Ok(out)
    }

    async fn run_explain_analyze(&self, sql: &str) -> AppResult<String> {
        let rows = sqlx::query(&format!("EXPLAIN (ANALYZE, FORMAT TEXT) {sql}"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| driver_error(format!("EXPLAIN ANALYZE failed: {e}")))?;

        let mut plan = String::new();
        for row in rows {
            let line: String = row.try_get(0).unwrap_or_default();
            plan.push_str(&line);
            plan.push('\n');
        }
        Ok(plan)
    }

    fn normalize_access_type(&self, raw: &str) -> Option<AccessType> {
        let lower = raw.to_lowercase();
        if lower.contains("index only scan") {
            Some(AccessType::CoveringIndexLookup)
        } else if lower.contains("index scan") {
            Some(AccessType::IndexLookup)
        } else if lower.contains("bitmap index scan") || lower.contains("bitmap heap scan") {
            Some(AccessType::IndexRangeScan)
        } else if lower.contains("seq scan") {
            Some(AccessType::TableScan)
        } else if lower.contains("result") {
            Some(AccessType::ConstRow)
        } else {
            None
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
        sqlx::query(&format!("ANALYZE {table}"))
            .execute(&self.pool)
            .await
            .map_err(|e| driver_error(format!("ANALYZE {table} failed: {e}")))?;
        Ok(())
    }

    async fn get_column_stats(&self, table: &str, column: &str) -> AppResult<ColumnStats> {
        let row = sqlx::query(
            "SELECT n_distinct, null_frac, avg_width FROM pg_stats \
             WHERE schemaname = current_schema() AND tablename = $1 AND attname = $2 LIMIT 1"
        )
        .bind(table)
        .bind(column)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| driver_error(format!("column stats lookup failed: {e}")))?;

        Ok(match row {
            Some(row) => ColumnStats {
                n_distinct:     row.try_get::<Option<f32>, _>("n_distinct").ok().flatten().map(|v| v as f64),
                null_fraction:  row.try_get::<Option<f32>, _>("null_frac").ok().flatten().map(|v| v as f64),
                avg_row_length: row.try_get::<Option<i32>, _>("avg_width").ok().flatten().map(|v| v as f64)
            },
            None => ColumnStats::default()
        })
    }

    async fn table_exists(&self, name: &str) -> AppResult<Option<SchemaRecord>> {
        let row = sqlx::query(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1 LIMIT 1"
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| driver_error(format!("table lookup failed: {e}")))?;

        Ok(row.map(|r| SchemaRecord {
            table_name:  r.try_get("table_name").unwrap_or_default(),
            column_name: None
        }))
    }

    async fn list_tables(&self) -> AppResult<Vec<SchemaRecord>> {
        let rows = sqlx::query("SELECT table_name FROM information_schema.tables WHERE table_schema = current_schema()")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| driver_error(format!("table listing failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|r| SchemaRecord {
                table_name:  r.try_get("table_name").unwrap_or_default(),
                column_name: None
            })
            .collect())
    }

    async fn column_exists(&self, table: &str, column: &str) -> AppResult<Option<SchemaRecord>> {
        let row = sqlx::query(
            "SELECT table_name, column_name FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1 AND column_name = $2 LIMIT 1"
        )
        .bind(table)
        .bind(column)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| driver_error(format!("column lookup failed: {e}")))?;

        Ok(row.map(|r| SchemaRecord {
            table_name:  r.try_get("table_name").unwrap_or_default(),
            column_name: r.try_get("column_name").ok()
        }))
    }

    async fn list_columns(&self, table: &str) -> AppResult<Vec<SchemaRecord>> {
        let rows = sqlx::query(
            "SELECT table_name, column_name FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1"
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| driver_error(format!("column listing failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|r| SchemaRecord {
                table_name:  r.try_get("table_name").unwrap_or_default(),
                column_name: r.try_get("column_name").ok()
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
