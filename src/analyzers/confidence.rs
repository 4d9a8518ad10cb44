//! ConfidenceScorer: a weighted blend of eight factors into a single
//! `[0, 1]` trust signal for the rest of the report, consumed by
//! [`crate::report::DiagnosticReport::new`] to cap the adjusted grade
//! when the underlying observation is shaky (tiny sample, no
//! EXPLAIN ANALYZE, stale stats, ...).

use serde::Serialize;

use crate::{
    driver::Capabilities,
    metrics::Metrics,
    plan::AccessType,
    report::{Finding, Severity}
};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ConfidenceFactors {
    pub estimation_accuracy: f64,
    pub sample_size: f64,
    pub explain_analyze_availability: f64,
    pub cache_warmth: f64,
    pub stats_freshness: f64,
    pub plan_stability: f64,
    pub query_complexity: f64,
    pub driver_capabilities: f64
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfidenceReport {
    pub score:   f64,
    pub label:   &'static str,
    pub factors: ConfidenceFactors,
    pub findings: Vec<Finding>
}

/// `composite_drift` is [`crate::analyzers::cardinality::CardinalityDriftReport::composite_drift`];
/// `plan_stability` is `1.0` unless the regression analyzer observed the
/// access path changing run over run (not modeled independently here, so
/// callers without a regression baseline should pass `1.0`).
pub fn analyze(metrics: &Metrics, composite_drift: f64, capabilities: Capabilities, plan_stability: f64) -> ConfidenceReport {
    let is_deterministic = matches!(
        metrics.primary_access_type,
        Some(AccessType::ConstRow | AccessType::ZeroRowConst | AccessType::SingleRowLookup)
    );

    let sample_size = if is_deterministic {
        1.0
    } else {
        (metrics.rows_examined as f64 / 1_000.0).clamp(0.1, 1.0)
    };

    let estimation_accuracy = (1.0 - composite_drift).clamp(0.0, 1.0);
    let explain_analyze_availability = if capabilities.explain_analyze { 1.0 } else { 0.5 };
    let cache_warmth = if metrics.max_loops > 1 { 1.0 } else { 0.6 };
    let stats_freshness = estimation_accuracy;
    let query_complexity = 1.0 - (metrics.complexity as u8 as f64 / 5.0);
    let driver_capabilities = [
        capabilities.explain_analyze,
        capabilities.histograms,
        capabilities.json_explain,
        capabilities.covering_index_info,
        capabilities.parallel_query,
    ]
    .iter()
    .filter(|b| **b)
    .count() as f64
        / 5.0;

    let factors = ConfidenceFactors {
        estimation_accuracy,
        sample_size,
        explain_analyze_availability,
        cache_warmth,
        stats_freshness,
        plan_stability,
        query_complexity,
        driver_capabilities
    };

    let score = estimation_accuracy * 0.25
        + sample_size * 0.20
        + explain_analyze_availability * 0.15
        + cache_warmth * 0.10
        + stats_freshness * 0.10
        + plan_stability * 0.10
        + query_complexity * 0.05
        + driver_capabilities * 0.05;

    let label = if score >= 0.9 {
        "high"
    } else if score >= 0.7 {
        "moderate"
    } else if score >= 0.5 {
        "low"
    } else {
        "unreliable"
    };

    let mut findings = Vec::new();
    if score < 0.5 {
        findings.push(
            Finding::new(
                Severity::Warning,
                "confidence",
                "Low confidence in diagnostic result",
                format!("Confidence score {score:.2} is below the reliable threshold")
            )
            .with_recommendation("Re-run with EXPLAIN ANALYZE support, fresh statistics, or a larger sample")
        );
    } else if score < 0.7 {
        findings.push(Finding::new(
            Severity::Optimization,
            "confidence",
            "Moderate confidence in diagnostic result",
            format!("Confidence score {score:.2}")
        ));
    }

    ConfidenceReport {
        score,
        label,
        factors,
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
            rows_examined: 10_000,
            rows_returned: 10,
            nested_loop_depth: 0,
            max_loops: 2,
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
    fn const_row_access_forces_full_sample_confidence() {
        let mut metrics = base_metrics();
        metrics.primary_access_type = Some(AccessType::ConstRow);
        let report = analyze(&metrics, 0.0, Capabilities::default(), 1.0);
        assert_eq!(report.factors.sample_size, 1.0);
    }

    #[test]
    fn high_drift_and_no_capabilities_yields_low_confidence() {
        let metrics = base_metrics();
        let report = analyze(&metrics, 0.9, Capabilities::default(), 0.5);
        assert!(report.score < 0.7);
        assert!(!report.findings.is_empty());
    }

    #[test]
    fn full_capabilities_and_no_drift_yields_high_confidence() {
        let mut metrics = base_metrics();
        metrics.rows_examined = 100_000;
        let capabilities = Capabilities {
            explain_analyze: true,
            histograms: true,
            json_explain: true,
            covering_index_info: true,
            parallel_query: true
        };
        let report = analyze(&metrics, 0.0, capabilities, 1.0);
        assert_eq!(report.label, "high");
    }
}
