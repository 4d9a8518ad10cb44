//! CardinalityDriftAnalyzer: compares the optimizer's estimated row counts
//! against what EXPLAIN ANALYZE actually observed, per table, and raises a
//! finding when the gap is wide enough to indicate stale statistics are
//! misleading the optimizer's plan choice.

use serde::Serialize;

use crate::{
    metrics::Metrics,
    report::{Finding, Severity}
};

#[derive(Debug, Clone, Serialize)]
pub struct TableDrift {
    pub table:          String,
    pub estimated_rows: u64,
    pub actual_rows:    u64,
    /// `1 - min(est, actual) / max(est, actual)`, in `[0, 1]`; `0` is a
    /// perfect estimate, `1` is maximally wrong.
    pub drift:          f64
}

#[derive(Debug, Clone, Serialize)]
pub struct CardinalityDriftReport {
    pub per_table:      Vec<TableDrift>,
    pub composite_drift: f64,
    pub findings:       Vec<Finding>
}

pub fn analyze(metrics: &Metrics, warning_threshold: f64, critical_threshold: f64) -> CardinalityDriftReport {
    let mut per_table = Vec::new();
    let mut findings = Vec::new();

    for (table, estimate) in &metrics.per_table_estimates {
        let estimated = estimate.estimated_rows.unwrap_or(0);
        let actual = estimate.actual_rows.unwrap_or(0) * estimate.loops.unwrap_or(1).max(1);
        let denom = estimated.max(actual).max(1) as f64;
        let drift = 1.0 - (estimated.min(actual) as f64 / denom);

        if drift > critical_threshold {
            findings.push(
                Finding::new(
                    Severity::Critical,
                    "cardinality_drift",
                    "Severe cardinality drift",
                    format!("Table `{table}` estimated {estimated} rows but EXPLAIN ANALYZE saw {actual} (drift {drift:.2})")
                )
                .with_recommendation(format!("ANALYZE TABLE `{table}`"))
            );
        } else if drift > warning_threshold {
            findings.push(
                Finding::new(
                    Severity::Warning,
                    "cardinality_drift",
                    "Cardinality drift detected",
                    format!("Table `{table}` estimated {estimated} rows but EXPLAIN ANALYZE saw {actual} (drift {drift:.2})")
                )
                .with_recommendation(format!("ANALYZE TABLE `{table}`"))
            );
        }

        per_table.push(TableDrift {
            table: table.clone(),
            estimated_rows: estimated,
            actual_rows: actual,
            drift
        });
    }

    let composite_drift = if per_table.is_empty() {
        0.0
    } else {
        per_table.iter().map(|t| t.drift).sum::<f64>() / per_table.len() as f64
    };

    CardinalityDriftReport {
        per_table,
        composite_drift,
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::TableEstimate;
    use indexmap::IndexMap;

    #[test]
    fn flags_severe_drift() {
        let mut per_table_estimates = IndexMap::new();
        per_table_estimates.insert(
            "orders".to_string(),
            TableEstimate {
                estimated_rows: Some(100),
                actual_rows:    Some(50_000),
                loops:          Some(1)
            }
        );
        let metrics = Metrics {
            per_table_estimates,
            ..crate::metrics::extract(
                &crate::plan::parse("-> Table scan on orders (cost=1 rows=1) (actual time=0.1..1.0 rows=1 loops=1)")
                    .unwrap(),
                "",
                false
            )
        };
        let report = analyze(&metrics, 0.5, 0.9);
        assert!(report.findings.iter().any(|f| f.severity == Severity::Critical));
    }
}
