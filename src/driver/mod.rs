//! Driver: the one seam every SQL engine (MySQL, PostgreSQL, SQLite)
//! implements so the rest of the pipeline never branches on engine.
//!
//! Grounded in `jlon-starrocks-admin`'s `handlers/sql_diag.rs`, the only
//! example repo that talks to a real SQL engine over the network
//! (session-based `EXPLAIN` execution, version probing, regex DDL
//! parsing); `sqlx` replaces that repo's hand-rolled `MySQLClient` since
//! one crate already covers all three target engines.

pub mod capability;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

use async_trait::async_trait;
use compact_str::CompactString;
use indexmap::IndexMap;

pub use capability::Capabilities;

use crate::{error::AppResult, plan::AccessType};

/// One row of a tabular (non-tree) `EXPLAIN`. Column names vary across
/// engines, so this stays a map rather than a fixed struct.
pub type ExplainRow = IndexMap<CompactString, String>;

/// Uniform record shape for schema lookups: every driver's catalog query
/// resolves to this regardless of the underlying `information_schema`
/// column names.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SchemaRecord {
    pub table_name:  String,
    pub column_name: Option<String>
}

/// Per-table/column cardinality statistics, used by the cardinality-drift
/// and regression analyzers.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct ColumnStats {
    pub n_distinct:      Option<f64>,
    pub null_fraction:   Option<f64>,
    pub avg_row_length:  Option<f64>
}

/// EXPLAIN / EXPLAIN ANALYZE execution, version/capability probing, and
/// index DDL execution for one SQL engine.
///
/// Every method is async because every method can touch the network; a
/// driver instance owns its connection pool and is safe to share across
/// concurrent `diagnose` calls - the Engine and all its collaborators are
/// stateless except where explicitly documented otherwise.
#[async_trait]
pub trait Driver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Memoized server version string. Implementations cache this behind
    /// a single-shot initializer (`tokio::sync::OnceCell`) so repeated
    /// calls across concurrent `diagnose` invocations issue at most one
    /// round-trip.
    async fn get_version(&self) -> AppResult<CompactString>;

    async fn capabilities(&self) -> AppResult<Capabilities>;

    /// `true` when this driver/version combination can run `EXPLAIN
    /// ANALYZE` (or its engine-specific equivalent). When `false`, the
    /// `ExplainExecutor` falls back to a non-analyzed plan.
    async fn supports_analyze(&self) -> AppResult<bool>;

    /// Tabular `EXPLAIN` (no ANALYZE) - used by the syntax-validation
    /// stage and as best-effort enrichment rows on a successful
    /// `EXPLAIN ANALYZE`.
    async fn run_explain(&self, sql: &str) -> AppResult<Vec<ExplainRow>>;

    /// Tree-format `EXPLAIN ANALYZE` text, ready for [`crate::plan::parse`].
    async fn run_explain_analyze(&self, sql: &str) -> AppResult<String>;

    /// Map a driver-native access-type string (e.g. MySQL's `type` column
    /// value, or a `Seq Scan`/`Index Scan` node type from PostgreSQL) to
    /// the engine-agnostic [`AccessType`].
    fn normalize_access_type(&self, raw: &str) -> Option<AccessType>;

    /// Map a driver-native join-strategy label to a stable lowercase name
    /// (`nested_loop`, `hash_join`, `merge_join`, ...).
    fn normalize_join_type(&self, raw: &str) -> CompactString;

    async fn run_analyze_table(&self, table: &str) -> AppResult<()>;

    async fn get_column_stats(&self, table: &str, column: &str) -> AppResult<ColumnStats>;

    async fn table_exists(&self, name: &str) -> AppResult<Option<SchemaRecord>>;

    async fn list_tables(&self) -> AppResult<Vec<SchemaRecord>>;

    async fn column_exists(&self, table: &str, column: &str) -> AppResult<Option<SchemaRecord>>;

    async fn list_columns(&self, table: &str) -> AppResult<Vec<SchemaRecord>>;

    /// Execute an arbitrary DDL statement. The only caller in this crate
    /// is [`crate::analyzers::hypothetical_index`], which always pairs a
    /// `CREATE` with a later `DROP` on every exit path.
    async fn run_ddl(&self, ddl: &str) -> AppResult<()>;
}

/// Strip common version-string noise (`-MariaDB`, `-debug`, `-log`
/// vendor suffixes) before numeric comparison, shared by every driver
/// that reports a `MAJOR.MINOR.PATCH[-suffix]` version string.
pub fn strip_version_suffix(raw: &str) -> &str {
    raw.split(['-', '+']).next().unwrap_or(raw)
}

/// Parse a `MAJOR.MINOR.PATCH` prefix into a comparable tuple, ignoring
/// anything after the first three numeric components.
pub fn parse_version_triplet(version: &str) -> Option<(u32, u32, u32)> {
    let core = strip_version_suffix(version);
    let mut parts = core.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().unwrap_or("0").parse().ok()?;
    let patch = parts.next().unwrap_or("0").parse().ok()?;
    Some((major, minor, patch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_mariadb_suffix() {
        assert_eq!(strip_version_suffix("10.6.12-MariaDB-log"), "10.6.12");
    }

    #[test]
    fn parses_version_triplet() {
        assert_eq!(parse_version_triplet("8.0.18-debug"), Some((8, 0, 18)));
        assert_eq!(parse_version_triplet("8.0"), Some((8, 0, 0)));
    }
}
