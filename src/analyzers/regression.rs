//! RegressionBaselineAnalyzer: compares the current run's execution time
//! and composite score against the most recent snapshot stored in
//! [`BaselineStore`] for this statement's hash, then persists the current
//! run as the new most-recent snapshot.
//!
//! A regression only fires when the baseline itself is above
//! `minimum_measurable_ms` (default 5ms) - below that, timing noise
//! dominates and a percentage delta is meaningless. The same floor is
//! enforced again, independently, by [`crate::consistency`]'s rule 7.

use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    baseline::{BaselineEntry, BaselineStore},
    config::RegressionConfig,
    error::AppResult,
    metrics::Metrics,
    report::{Finding, Severity}
};

#[derive(Debug, Clone, Serialize)]
pub struct RegressionReport {
    pub baseline_execution_time_ms: Option<f64>,
    pub current_execution_time_ms:  f64,
    pub baseline_composite_score:   Option<f64>,
    pub current_composite_score:    f64,
    pub findings:                   Vec<Finding>
}

pub fn analyze(
    store: &BaselineStore,
    query_hash: &str,
    metrics: &Metrics,
    composite_score: f64,
    grade: char,
    config: &RegressionConfig
) -> AppResult<RegressionReport> {
    let previous = store.load(query_hash)?;
    let mut findings = Vec::new();

    let baseline_time = previous.as_ref().and_then(|e| e.snapshot.get("execution_time_ms").copied());
    let baseline_score = previous.as_ref().and_then(|e| e.snapshot.get("composite_score").copied());

    if let Some(baseline_time) = baseline_time
        && baseline_time >= config.minimum_measurable_ms
    {
        let delta = metrics.execution_time_ms - baseline_time;
        let pct = if baseline_time > 0.0 { delta / baseline_time * 100.0 } else { 0.0 };
        if delta > config.noise_floor_ms && pct >= config.time_critical_pct {
            findings.push(
                Finding::new(
                    Severity::Critical,
                    "regression",
                    "Execution time regressed",
                    format!(
                        "Execution time grew from {baseline_time:.2}ms to {:.2}ms ({pct:.0}% worse)",
                        metrics.execution_time_ms
                    )
                )
                .with_recommendation("Investigate recent schema, data, or plan changes for this query")
            );
        } else if delta > config.noise_floor_ms && pct >= config.time_warning_pct {
            findings.push(Finding::new(
                Severity::Warning,
                "regression",
                "Execution time regressed",
                format!(
                    "Execution time grew from {baseline_time:.2}ms to {:.2}ms ({pct:.0}% worse)",
                    metrics.execution_time_ms
                )
            ));
        }
    }

    if let Some(baseline_score) = baseline_score {
        let delta = baseline_score - composite_score;
        let pct = if baseline_score > 0.0 { delta / baseline_score * 100.0 } else { 0.0 };
        if delta > 0.0 && pct >= config.score_critical_pct {
            findings.push(Finding::new(
                Severity::Critical,
                "regression",
                "Composite score regressed",
                format!("Composite score dropped from {baseline_score:.1} to {composite_score:.1} ({pct:.0}% worse)")
            ));
        } else if delta > 0.0 && pct >= config.score_warning_pct {
            findings.push(Finding::new(
                Severity::Warning,
                "regression",
                "Composite score regressed",
                format!("Composite score dropped from {baseline_score:.1} to {composite_score:.1} ({pct:.0}% worse)")
            ));
        }
    }

    let mut snapshot = IndexMap::new();
    snapshot.insert("execution_time_ms".to_string(), metrics.execution_time_ms);
    snapshot.insert("composite_score".to_string(), composite_score);
    snapshot.insert("rows_examined".to_string(), metrics.rows_examined as f64);
    snapshot.insert("grade".to_string(), grade as u32 as f64);

    store.save(
        query_hash,
        BaselineEntry {
            query_hash: query_hash.to_string(),
            timestamp:  chrono::Utc::now(),
            snapshot
        }
    )?;

    Ok(RegressionReport {
        baseline_execution_time_ms: baseline_time,
        current_execution_time_ms: metrics.execution_time_ms,
        baseline_composite_score: baseline_score,
        current_composite_score: composite_score,
        findings
    })
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::{metrics::ComplexityClass, plan::AccessType};

    fn base_metrics(time_ms: f64) -> Metrics {
        Metrics {
            execution_time_ms: time_ms,
            rows_examined: 10,
            rows_returned: 10,
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
    fn first_run_has_no_baseline_and_no_findings() {
        let dir = tempdir().unwrap();
        let store = BaselineStore::new(dir.path(), 50).unwrap();
        let config = RegressionConfig::default();
        let report = analyze(&store, "h", &base_metrics(10.0), 90.0, 'A', &config).unwrap();
        assert!(report.baseline_execution_time_ms.is_none());
        assert!(report.findings.is_empty());
    }

    #[test]
    fn large_time_regression_above_noise_floor_is_flagged() {
        let dir = tempdir().unwrap();
        let store = BaselineStore::new(dir.path(), 50).unwrap();
        let config = RegressionConfig::default();
        analyze(&store, "h", &base_metrics(10.0), 90.0, 'A', &config).unwrap();
        let report = analyze(&store, "h", &base_metrics(30.0), 90.0, 'A', &config).unwrap();
        assert!(report.findings.iter().any(|f| f.category == "regression"));
    }

    #[test]
    fn regression_below_noise_floor_is_suppressed() {
        let dir = tempdir().unwrap();
        let store = BaselineStore::new(dir.path(), 50).unwrap();
        let config = RegressionConfig::default();
        analyze(&store, "h", &base_metrics(1.0), 90.0, 'A', &config).unwrap();
        let report = analyze(&store, "h", &base_metrics(3.0), 90.0, 'A', &config).unwrap();
        assert!(report.findings.is_empty());
    }
}
