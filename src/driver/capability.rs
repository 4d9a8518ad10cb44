//! Per-engine, per-version feature flags. `ExplainExecutor` and the
//! analyzers branch on these instead of re-deriving version logic
//! themselves.

/// Feature flags resolved once per driver/version and cheap to clone.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct Capabilities {
    /// `EXPLAIN ANALYZE` (or equivalent) is available.
    pub explain_analyze: bool,
    /// The engine exposes column-value histograms.
    pub histograms: bool,
    /// `EXPLAIN FORMAT=JSON` (or native JSON plan output) is available.
    pub json_explain: bool,
    /// The engine reports whether an index lookup is fully covering.
    pub covering_index_info: bool,
    /// The engine can run statements with intra-query parallelism.
    pub parallel_query: bool
}
