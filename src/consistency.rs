//! ConsistencyValidator: cross-checks the other stages' outputs for
//! internal contradictions that would otherwise only surface as a
//! confusing report.
//!
//! Every check here is pure and log-only: a violation is written to
//! `tracing::warn!` and carried on [`crate::report::DiagnosticReport`] for
//! CI visibility, but never aborts or mutates the report it is checking.

use serde::Serialize;

use crate::{
    analyzers::concurrency::{ConcurrencyReport, LockScope},
    metrics::Metrics,
    report::{Finding, Severity}
};

/// One broken invariant between two otherwise-independent pipeline stages.
#[derive(Debug, Clone, Serialize)]
pub struct ConsistencyViolation {
    pub rule:    &'static str,
    pub message: String
}

impl ConsistencyViolation {
    fn new(rule: &'static str, message: impl Into<String>) -> Self {
        Self {
            rule,
            message: message.into()
        }
    }
}

/// Run every invariant check against one pipeline run's outputs.
///
/// `regression_baseline_ms` is the execution-time value read off the
/// baseline snapshot (if any) that the regression analyzer compared
/// against, needed by rule 8 below.
pub fn validate(
    metrics: &Metrics,
    findings: &[Finding],
    concurrency: Option<&ConcurrencyReport>,
    is_plain_select: bool,
    regression_baseline_ms: Option<f64>
) -> Vec<ConsistencyViolation> {
    let mut violations = Vec::new();

    // 1. Anything other than a table scan should have resolved to an
    //    index-backed access path.
    if metrics.primary_access_type != Some(crate::plan::AccessType::TableScan) && !metrics.is_index_backed {
        violations.push(ConsistencyViolation::new(
            "primary_access_requires_index",
            "primary_access_type is not table_scan but is_index_backed is false"
        ));
    }

    // 2. has_table_scan and primary_access_type must agree.
    if metrics.has_table_scan && metrics.primary_access_type != Some(crate::plan::AccessType::TableScan) {
        violations.push(ConsistencyViolation::new(
            "table_scan_flag_mismatch",
            "has_table_scan is true but primary_access_type is not table_scan"
        ));
    }
    if metrics.primary_access_type == Some(crate::plan::AccessType::TableScan) && !metrics.has_table_scan {
        violations.push(ConsistencyViolation::new(
            "table_scan_flag_mismatch",
            "primary_access_type is table_scan but has_table_scan is false"
        ));
    }

    // 3. A large, unintentional table scan should never be classified LOW
    //    complexity risk.
    if metrics.complexity_risk == "LOW"
        && metrics.has_table_scan
        && metrics.rows_examined > 1_000
        && !metrics.is_intentional_scan
    {
        violations.push(ConsistencyViolation::new(
            "low_risk_large_scan",
            format!(
                "complexity_risk is LOW but an unintentional table scan examined {} rows",
                metrics.rows_examined
            )
        ));
    }

    // 4. No two findings should be identical.
    let mut seen = std::collections::HashSet::new();
    for finding in findings {
        if !seen.insert(finding.identity()) {
            violations.push(ConsistencyViolation::new(
                "duplicate_finding",
                format!("duplicate finding: {}/{}", finding.category, finding.title)
            ));
        }
    }

    // 5. A plain SELECT (no FOR UPDATE/SHARE) must never report a lock
    //    scope other than none.
    if is_plain_select
        && let Some(concurrency) = concurrency
        && concurrency.lock_scope != LockScope::None
    {
        violations.push(ConsistencyViolation::new(
            "plain_select_lock_scope",
            format!("plain SELECT reported lock_scope {:?}, expected none", concurrency.lock_scope)
        ));
    }

    // 6. An intentional scan must not carry a Critical/Warning finding in
    //    the no_index/full_table_scan categories.
    if metrics.is_intentional_scan {
        let offending = findings.iter().any(|f| {
            matches!(f.severity, Severity::Critical | Severity::Warning)
                && (f.category == "no_index" || f.category == "full_table_scan")
        });
        if offending {
            violations.push(ConsistencyViolation::new(
                "intentional_scan_flagged",
                "is_intentional_scan is true but a no_index/full_table_scan finding was still raised"
            ));
        }
    }

    // 7. An execution-time regression finding requires a measurable
    //    baseline (>= 5ms); below the noise floor the comparison is not
    //    meaningful.
    let has_time_regression = findings
        .iter()
        .any(|f| f.category == "regression" && f.title.to_lowercase().contains("execution time"));
    if has_time_regression && regression_baseline_ms.unwrap_or(0.0) < 5.0 {
        violations.push(ConsistencyViolation::new(
            "regression_below_noise_floor",
            "an execution-time regression finding was raised against a baseline below the 5ms measurable floor"
        ));
    }

    // 8. Metrics claiming a real execution time but an unparsed plan.
    if !metrics.parsing_valid && metrics.execution_time_ms != 0.0 {
        violations.push(ConsistencyViolation::new(
            "unparsed_plan_with_timing",
            "parsing_valid is false but execution_time_ms is non-zero"
        ));
    }

    // 9. Selectivity ratio should never read as "better than possible":
    //    rows_examined can never be smaller than rows_returned.
    if metrics.rows_returned > 0 && metrics.rows_examined < metrics.rows_returned {
        violations.push(ConsistencyViolation::new(
            "impossible_selectivity",
            format!(
                "rows_examined ({}) is smaller than rows_returned ({})",
                metrics.rows_examined, metrics.rows_returned
            )
        ));
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{metrics::ComplexityClass, plan::AccessType};

    fn base_metrics() -> Metrics {
        Metrics {
            execution_time_ms: 1.0,
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
    fn clean_run_has_no_violations() {
        let metrics = base_metrics();
        let violations = validate(&metrics, &[], None, true, None);
        assert!(violations.is_empty());
    }

    #[test]
    fn flags_impossible_selectivity() {
        let mut metrics = base_metrics();
        metrics.rows_examined = 1;
        metrics.rows_returned = 10;
        let violations = validate(&metrics, &[], None, true, None);
        assert!(violations.iter().any(|v| v.rule == "impossible_selectivity"));
    }

    #[test]
    fn flags_duplicate_findings() {
        let metrics = base_metrics();
        let finding = Finding::new(Severity::Warning, "no_index", "Query is not index-backed", "x");
        let violations = validate(&metrics, &[finding.clone(), finding], None, true, None);
        assert!(violations.iter().any(|v| v.rule == "duplicate_finding"));
    }

    #[test]
    fn flags_regression_below_noise_floor() {
        let metrics = base_metrics();
        let finding = Finding::new(Severity::Critical, "regression", "Execution time regressed", "x");
        let violations = validate(&metrics, std::slice::from_ref(&finding), None, true, Some(2.0));
        assert!(violations.iter().any(|v| v.rule == "regression_below_noise_floor"));
    }
}
