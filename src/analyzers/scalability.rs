//! ScalabilityEstimator: projects execution time and rows examined at
//! larger target row counts, using the query's [`ComplexityClass`] as a
//! growth-rate exponent. Runs even in the shallow `analyze_sql` path,
//! since [`crate::report::Report`] carries a projection unconditionally.

use serde::Serialize;

use crate::metrics::Metrics;

#[derive(Debug, Clone, Serialize)]
pub struct TargetProjection {
    pub target_rows:            u64,
    pub projected_time_ms:      f64,
    pub projected_rows_examined: u64
}

#[derive(Debug, Clone, Serialize)]
pub struct ScalabilityProjection {
    pub targets:           Vec<TargetProjection>,
    pub risk:              &'static str,
    /// How much a LIMIT dampens the projected growth curve: near zero
    /// when the query already terminates early, 1.0 (no dampening)
    /// otherwise.
    pub limit_sensitivity: f64
}

/// Project `metrics` forward to each of `targets` using the complexity
/// class's scalability factor as a power-law growth exponent on the ratio
/// `target / current_rows`.
pub fn estimate(metrics: &Metrics, targets: &[u64]) -> ScalabilityProjection {
    let factor = metrics.complexity.scalability_factor();
    let current_rows = metrics.rows_examined.max(1) as f64;

    let targets = targets
        .iter()
        .map(|&target_rows| {
            let growth = (target_rows as f64 / current_rows).max(1.0);
            let scaled = growth.powf(factor.max(0.0));
            TargetProjection {
                target_rows,
                projected_time_ms: metrics.execution_time_ms * scaled,
                projected_rows_examined: (metrics.rows_examined as f64 * scaled).round() as u64
            }
        })
        .collect();

    let limit_sensitivity = if metrics.has_early_termination {
        0.1
    } else {
        1.0
    };

    ScalabilityProjection {
        targets,
        risk: metrics.complexity_risk,
        limit_sensitivity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{metrics::ComplexityClass, plan::AccessType};

    fn metrics_with(complexity: ComplexityClass, early_termination: bool) -> Metrics {
        Metrics {
            execution_time_ms: 10.0,
            rows_examined: 100,
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
            has_early_termination: early_termination,
            is_index_backed: true,
            is_zero_row_const: false,
            is_intentional_scan: false,
            primary_access_type: Some(AccessType::IndexRangeScan),
            mysql_access_type: Some("range"),
            complexity,
            complexity_label: complexity.label(),
            complexity_risk: complexity.risk(),
            fanout_factor: 1,
            join_count: 0,
            selectivity_ratio: 10.0,
            indexes_used: vec![],
            tables_accessed: vec!["t".to_string()],
            node_count: 1,
            per_table_estimates: Default::default(),
            parsing_valid: true
        }
    }

    #[test]
    fn constant_complexity_projects_flat() {
        let metrics = metrics_with(ComplexityClass::Constant, false);
        let projection = estimate(&metrics, &[1_000_000]);
        assert_eq!(projection.targets[0].projected_time_ms, metrics.execution_time_ms);
    }

    #[test]
    fn quadratic_complexity_grows_faster_than_linear() {
        let quadratic = estimate(&metrics_with(ComplexityClass::Quadratic, false), &[100_000]);
        let linear = estimate(&metrics_with(ComplexityClass::Linear, false), &[100_000]);
        assert!(quadratic.targets[0].projected_time_ms > linear.targets[0].projected_time_ms);
    }

    #[test]
    fn early_termination_lowers_limit_sensitivity() {
        let projection = estimate(&metrics_with(ComplexityClass::Linear, true), &[1_000]);
        assert!(projection.limit_sensitivity < 1.0);
    }
}
