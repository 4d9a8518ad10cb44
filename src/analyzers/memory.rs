//! MemoryPressureEstimator: projects per-query temp-table/sort/join buffer
//! usage into an order-of-magnitude byte estimate, then scales it by an
//! assumed concurrent-session count to flag aggregate pressure a single
//! EXPLAIN can never observe directly.

use serde::Serialize;

use crate::{
    config::MemoryPressureConfig,
    metrics::Metrics,
    report::{Finding, Severity}
};

/// Flat per-row-width assumption used to turn a row count into a byte
/// estimate. Deliberately coarse - EXPLAIN never reports row width, so
/// any constant here is a guess; it only needs to be consistent enough
/// for the high/moderate/low banding to be meaningful.
const ASSUMED_ROW_BYTES: u64 = 256;
const ASSUMED_SORT_KEY_BYTES: u64 = 64;
const ASSUMED_FANOUT_BUFFER_BYTES: u64 = 128;

#[derive(Debug, Clone, Serialize)]
pub struct MemoryPressureReport {
    pub estimated_bytes_per_query: u64,
    pub estimated_bytes_concurrent: u64,
    pub level: &'static str,
    pub findings: Vec<Finding>
}

pub fn analyze(metrics: &Metrics, config: &MemoryPressureConfig) -> MemoryPressureReport {
    let mut bytes: u64 = 0;

    if metrics.has_temp_table {
        bytes = bytes.saturating_add(metrics.rows_examined.min(1_000_000).saturating_mul(ASSUMED_ROW_BYTES));
    }
    if metrics.has_filesort {
        let sort_rows = metrics.rows_returned.max(metrics.rows_examined / 10).min(1_000_000);
        bytes = bytes.saturating_add(sort_rows.saturating_mul(ASSUMED_SORT_KEY_BYTES));
    }
    if metrics.nested_loop_depth > 0 {
        bytes = bytes.saturating_add(
            metrics
                .fanout_factor
                .min(1_000_000)
                .saturating_mul(ASSUMED_FANOUT_BUFFER_BYTES)
                .saturating_mul(metrics.nested_loop_depth as u64)
        );
    }

    let concurrent = bytes.saturating_mul(config.concurrent_sessions as u64);

    let level = if concurrent >= config.high_threshold_bytes {
        "high"
    } else if concurrent >= config.moderate_threshold_bytes {
        "moderate"
    } else {
        "low"
    };

    let mut findings = Vec::new();
    if level == "high" {
        findings.push(
            Finding::new(
                Severity::Warning,
                "memory_pressure",
                "High estimated memory pressure under concurrent load",
                format!(
                    "Estimated {concurrent} bytes across {} concurrent sessions, at or above the high threshold",
                    config.concurrent_sessions
                )
            )
            .with_recommendation("Add a covering index to avoid the temp table/filesort, or lower concurrent session count")
        );
    } else if level == "moderate" {
        findings.push(Finding::new(
            Severity::Optimization,
            "memory_pressure",
            "Moderate estimated memory pressure under concurrent load",
            format!("Estimated {concurrent} bytes across {} concurrent sessions", config.concurrent_sessions)
        ));
    }

    MemoryPressureReport {
        estimated_bytes_per_query: bytes,
        estimated_bytes_concurrent: concurrent,
        level,
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{metrics::ComplexityClass, plan::AccessType};

    fn base_metrics() -> Metrics {
        Metrics {
            execution_time_ms: 1.0,
            rows_examined: 1_000_000,
            rows_returned: 1_000_000,
            nested_loop_depth: 0,
            max_loops: 1,
            max_cost: 1.0,
            has_temp_table: true,
            has_weedout: false,
            has_filesort: false,
            has_table_scan: true,
            has_index_merge: false,
            has_covering_index: false,
            has_disk_temp: true,
            has_materialization: false,
            has_early_termination: false,
            is_index_backed: false,
            is_zero_row_const: false,
            is_intentional_scan: false,
            primary_access_type: Some(AccessType::TableScan),
            mysql_access_type: Some("ALL"),
            complexity: ComplexityClass::Linear,
            complexity_label: "Linear",
            complexity_risk: "MEDIUM",
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
    fn large_temp_table_under_many_sessions_is_high_pressure() {
        let config = MemoryPressureConfig::default();
        let report = analyze(&base_metrics(), &config);
        assert_eq!(report.level, "high");
    }

    #[test]
    fn no_temp_table_or_sort_is_low_pressure() {
        let mut metrics = base_metrics();
        metrics.has_temp_table = false;
        metrics.has_filesort = false;
        let config = MemoryPressureConfig::default();
        let report = analyze(&metrics, &config);
        assert_eq!(report.level, "low");
        assert_eq!(report.estimated_bytes_per_query, 0);
    }
}
