//! SQLite [`Driver`] implementation over `sqlx::SqlitePool`.
//!
//! SQLite has no `EXPLAIN ANALYZE` and no indented tree output - `EXPLAIN
//! QUERY PLAN` instead returns `(id, parent, notused, detail)` rows that
//! describe a tree via parent ids. [`build_tree_text`] reconstructs the
//! same `->`-indented shape the MySQL/PostgreSQL drivers emit natively,
//! so [`crate::plan::parse`] needs no SQLite-specific branch.

use async_trait::async_trait;
use compact_str::CompactString;
use sqlx::{Row, SqlitePool};
use tokio::sync::OnceCell;

use super::{ColumnStats, Driver, ExplainRow, SchemaRecord, capability::Capabilities};
use crate::{
    error::{AppResult, driver_error},
    plan::AccessType
};

struct QueryPlanRow {
    id:     i64,
    parent: i64,
    detail: String
}

pub struct SqliteDriver {
    pool:    SqlitePool,
    version: OnceCell<CompactString>
}

impl SqliteDriver {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            version: OnceCell::new()
        }
    }
}

/// Reconstruct a `->`-indented tree from SQLite's flat parent-id rows.
/// Depth is the number of ancestors, two spaces per level, matching the
/// MySQL/PostgreSQL tree-text indentation convention closely enough for
/// [`crate::plan::parse`]'s indentation-only stack walk.
fn build_tree_text(rows: &[QueryPlanRow]) -> String {
    fn depth_of(rows: &[QueryPlanRow], id: i64) -> usize {
        match rows.iter().find(|r| r.id == id) {
            Some(row) if row.parent != 0 => 1 + depth_of(rows, row.parent),
            _ => 0
        }
    }

    let mut text = String::new();
    for row in rows {
        let depth = depth_of(rows, row.id);
        text.push_str(&"  ".repeat(depth));
        text.push_str("-> ");
        text.push_str(&row.detail);
        text.push('\n');
    }
    text
}

#[async_trait]
impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn get_version(&self) -> AppResult<CompactString> {
        self.version
            .get_or_try_init(|| async {
                let row: (String,) = sqlx::query_as("SELECT sqlite_version()")
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| driver_error(format!("failed to read server version: {e}")))?;
                Ok(CompactString::from(row.0))
            })
            .await
            .cloned()
    }

    async fn capabilities(&self) -> AppResult<Capabilities> {
        Ok(Capabilities {
            explain_analyze: false,
            histograms: false,
            json_explain: false,
            covering_index_info: true,
            parallel_query: false
        })
    }

    async fn supports_analyze(&self) -> AppResult<bool> {
        Ok(false)
    }

    async fn run_explain(&self, sql: &str) -> AppResult<Vec<ExplainRow>> {
        let rows = sqlx::query(&format!("EXPLAIN QUERY PLAN {sql}"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| driver_error(format!("EXPLAIN QUERY PLAN failed: {e}")))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut map = ExplainRow::new();
            let detail: String = row.try_get("detail").unwrap_or_default();
            map.insert(CompactString::from("detail"), detail);
            out.push(map);
        }
        Ok(out)
    }

    async fn run_explain_analyze(&self, sql: &str) -> AppResult<String> {
        let rows = sqlx::query(&format!("EXPLAIN QUERY PLAN {sql}"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| driver_error(format!("EXPLAIN QUERY PLAN failed: {e}")))?;

        let plan_rows: Vec<QueryPlanRow> = rows
            .into_iter()
            .map(|row| QueryPlanRow {
                id:     row.try_get("id").unwrap_or(0),
                parent: row.try_get("parent").unwrap_or(0),
                detail: row.try_get("detail").unwrap_or_default()
            })
            .collect();

        Ok(build_tree_text(&plan_rows))
    }

    fn normalize_access_type(&self, raw: &str) -> Option<AccessType> {
        let lower = raw.to_lowercase();
        if lower.contains("using covering index") {
            Some(AccessType::CoveringIndexLookup)
        } else if lower.contains("using index") {
            Some(AccessType::IndexLookup)
        } else if lower.contains("search") {
            Some(AccessType::IndexRangeScan)
        } else if lower.contains("scan") {
            Some(AccessType::TableScan)
        } else {
            None
        }
    }

    fn normalize_join_type(&self, _raw: &str) -> CompactString {
        CompactString::from("nested_loop")
    }

    async fn run_analyze_table(&self, table: &str) -> AppResult<()> {
        sqlx::query(&format!("ANALYZE {table}"))
            .execute(&self.pool)
            .await
            .map_err(|e| driver_error(format!("ANALYZE {table} failed: {e}")))?;
        Ok(())
    }

    async fn get_column_stats(&self, _table: &str, _column: &str) -> AppResult<ColumnStats> {
        // SQLite's `sqlite_stat1`/`sqlite_stat4` are opaque sampled
        // histograms, not a stable per-column API - cardinality-drift
        // analysis degrades gracefully to "no stats available" here.
        Ok(ColumnStats::default())
    }

    async fn table_exists(&self, name: &str) -> AppResult<Option<SchemaRecord>> {
        let row = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ? LIMIT 1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| driver_error(format!("table lookup failed: {e}")))?;

        Ok(row.map(|r| SchemaRecord {
            table_name:  r.try_get("name").unwrap_or_default(),
            column_name: None
        }))
    }

    async fn list_tables(&self) -> AppResult<Vec<SchemaRecord>> {
        let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| driver_error(format!("table listing failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|r| SchemaRecord {
                table_name:  r.try_get("name").unwrap_or_default(),
                column_name: None
            })
            .collect())
    }

    async fn column_exists(&self, table: &str, column: &str) -> AppResult<Option<SchemaRecord>> {
        let columns = self.list_columns(table).await?;
        Ok(columns.into_iter().find(|c| c.column_name.as_deref() == Some(column)))
    }

    async fn list_columns(&self, table: &str) -> AppResult<Vec<SchemaRecord>> {
        let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| driver_error(format!("column listing failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|r| SchemaRecord {
                table_name:  table.to_string(),
                column_name: r.try_get::<String, _>("name").ok()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_indented_tree_from_parent_ids() {
        let rows = vec![
            QueryPlanRow {
                id:     1,
                parent: 0,
                detail: "SCAN t".to_string()
            },
            QueryPlanRow {
                id:     2,
                parent: 1,
                detail: "SEARCH u USING INDEX idx (col=?)".to_string()
            },
        ];
        let text = build_tree_text(&rows);
        assert_eq!(text, "-> SCAN t\n  -> SEARCH u USING INDEX idx (col=?)\n");
    }
}
