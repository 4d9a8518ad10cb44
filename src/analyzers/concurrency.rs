//! ConcurrencyRiskAnalyzer: estimates the lock footprint and contention
//! exposure of a statement from its access path, without ever issuing a
//! second connection or observing real lock waits.
//!
//! A plain read under MVCC (the common case for every target engine's
//! default isolation level) takes no locks at all; this analyzer only
//! assigns a non-`None` [`LockScope`] once the statement is a locking
//! read (`FOR UPDATE`/`FOR SHARE`, see [`crate::safety::is_locking_read`]).

use serde::Serialize;

use crate::{
    metrics::Metrics,
    plan::AccessType,
    report::{Finding, Severity}
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockScope {
    /// MVCC read, no locks taken.
    None,
    Row,
    Gap,
    Range,
    Table
}

#[derive(Debug, Clone, Serialize)]
pub struct ConcurrencyReport {
    pub lock_scope:    LockScope,
    /// `[0, 1]`: share of the deadlock risk factors present (multi-table,
    /// subquery, non-index-backed access, deep nesting).
    pub deadlock_risk: f64,
    /// Rough contention proxy: `time_ms * (1 + depth * 0.5) * rows / 10_000`.
    pub contention:    f64,
    pub risk_label:    &'static str,
    pub findings:      Vec<Finding>
}

/// `is_plain_select` is true for a read that takes no row lock at all
/// (i.e. not `FOR UPDATE`/`FOR SHARE`); see [`crate::safety::is_locking_read`].
pub fn analyze(metrics: &Metrics, is_plain_select: bool, has_subquery: bool) -> ConcurrencyReport {
    if is_plain_select {
        return ConcurrencyReport {
            lock_scope: LockScope::None,
            deadlock_risk: 0.0,
            contention: 0.0,
            risk_label: "low",
            findings: Vec::new()
        };
    }

    let lock_scope = match metrics.primary_access_type {
        Some(AccessType::TableScan) => LockScope::Table,
        Some(AccessType::IndexScan | AccessType::IndexRangeScan) => LockScope::Range,
        Some(
            AccessType::SingleRowLookup
            | AccessType::ConstRow
            | AccessType::CoveringIndexLookup
            | AccessType::IndexLookup
            | AccessType::FulltextIndex
        ) => LockScope::Row,
        Some(AccessType::ZeroRowConst) | None => LockScope::Gap
    };

    let risk_factors = [
        metrics.tables_accessed.iter().collect::<std::collections::HashSet<_>>().len() > 1,
        has_subquery,
        !metrics.is_index_backed && metrics.primary_access_type != Some(AccessType::ConstRow),
        metrics.nested_loop_depth > 2,
    ];
    let deadlock_risk = risk_factors.iter().filter(|f| **f).count() as f64 / risk_factors.len() as f64;

    let contention =
        metrics.execution_time_ms * (1.0 + metrics.nested_loop_depth as f64 * 0.5) * metrics.rows_examined as f64
            / 10_000.0;

    let risk_label = if deadlock_risk >= 0.5 || contention >= 10.0 {
        "high"
    } else if deadlock_risk > 0.0 || contention >= 1.0 {
        "moderate"
    } else {
        "low"
    };

    let mut findings = Vec::new();
    if risk_label == "high" {
        findings.push(
            Finding::new(
                Severity::Warning,
                "concurrency",
                "High lock contention risk",
                format!(
                    "Locking read takes a {lock_scope:?} lock with deadlock risk {deadlock_risk:.2} and contention \
                     proxy {contention:.1}"
                )
            )
            .with_recommendation(
                "Narrow the WHERE clause to a single-row, index-backed lookup and keep the transaction short"
            )
        );
    } else if risk_label == "moderate" {
        findings.push(Finding::new(
            Severity::Optimization,
            "concurrency",
            "Moderate lock contention risk",
            format!("Locking read takes a {lock_scope:?} lock with deadlock risk {deadlock_risk:.2}")
        ));
    }

    ConcurrencyReport {
        lock_scope,
        deadlock_risk,
        contention,
        risk_label,
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ComplexityClass;

    fn base_metrics() -> Metrics {
        Metrics {
            execution_time_ms: 1.0,
            rows_examined: 5,
            rows_returned: 5,
            nested_loop_depth: 0,
            max_loops: 1,
            max_cost: 1.0,
            has_temp_table: false,
            has_weedout: false,
            has_filesort: false,
            has_table_scan: false,
            has_index_merge: false,
            has_covering_index: true,
            has_disk_temp: false,
            has_materialization: false,
            has_early_termination: false,
            is_index_backed: true,
            is_zero_row_const: false,
            is_intentional_scan: false,
            primary_access_type: Some(AccessType::CoveringIndexLookup),
            mysql_access_type: Some("ref"),
            complexity: ComplexityClass::Logarithmic,
            complexity_label: "Logarithmic",
            complexity_risk: "LOW",
            fanout_factor: 1,
            join_count: 0,
            selectivity_ratio: 1.0,
            indexes_used: vec![],
            tables_accessed: vec!["t".to_string()],
            node_count: 1,
            per_table_estimates: Default::default(),
            parsing_valid: true
        }
    }

    #[test]
    fn plain_select_never_locks() {
        let report = analyze(&base_metrics(), true, false);
        assert_eq!(report.lock_scope, LockScope::None);
        assert_eq!(report.deadlock_risk, 0.0);
    }

    #[test]
    fn table_scan_locking_read_is_table_scope() {
        let mut metrics = base_metrics();
        metrics.primary_access_type = Some(AccessType::TableScan);
        metrics.has_table_scan = true;
        metrics.is_index_backed = false;
        let report = analyze(&metrics, false, false);
        assert_eq!(report.lock_scope, LockScope::Table);
    }

    #[test]
    fn multi_table_subquery_deep_nesting_raises_deadlock_risk() {
        let mut metrics = base_metrics();
        metrics.tables_accessed = vec!["a".to_string(), "b".to_string()];
        metrics.nested_loop_depth = 3;
        metrics.is_index_backed = false;
        metrics.primary_access_type = Some(AccessType::IndexRangeScan);
        let report = analyze(&metrics, false, true);
        assert!(report.deadlock_risk > 0.5);
        assert_eq!(report.risk_label, "high");
    }
}
