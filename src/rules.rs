//! RuleRegistry: a sequential, registration-order rule runner. A single
//! `diagnose` call analyzes one statement's [`Metrics`], so there is no
//! per-query parallelism to exploit here - the registry just walks its
//! rules in order and collects whatever fires.

use crate::{
    config::RulesConfig,
    metrics::Metrics,
    plan::AccessType,
    report::{Finding, Severity}
};

/// One diagnostic rule: a pure function from [`Metrics`] to an optional
/// [`Finding`].
pub trait Rule: Send + Sync {
    /// Stable key used for config enable/disable matching.
    fn key(&self) -> &'static str;

    fn evaluate(&self, metrics: &Metrics) -> Option<Finding>;
}

/// Ordered collection of active rules, built once per [`crate::engine::Engine`]
/// and reused across every `diagnose` call.
pub struct RuleRegistry {
    rules:    Vec<Box<dyn Rule>>,
    severity: std::collections::HashMap<String, Severity>
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::with_config(&RulesConfig::default())
    }

    pub fn with_config(config: &RulesConfig) -> Self {
        let all: Vec<Box<dyn Rule>> = vec![
            Box::new(FullTableScanRule),
            Box::new(TempTableRule),
            Box::new(WeedoutRule),
            Box::new(DeepNestedLoopRule::new(3)),
            Box::new(IndexMergeRule),
            Box::new(StaleStatsRule),
            Box::new(LimitIneffectiveRule),
            Box::new(QuadraticComplexityRule),
            Box::new(NoIndexRule),
        ];

        let rules = all
            .into_iter()
            .filter(|rule| match &config.enabled {
                Some(enabled) => enabled.iter().any(|k| k.eq_ignore_ascii_case(rule.key())),
                None => !config.disabled.iter().any(|k| k.eq_ignore_ascii_case(rule.key()))
            })
            .collect();

        let severity = config
            .severity
            .iter()
            .filter_map(|(key, value)| parse_severity(value).map(|s| (key.to_ascii_lowercase(), s)))
            .collect();

        Self {
            rules,
            severity
        }
    }

    pub fn evaluate(&self, metrics: &Metrics) -> Vec<Finding> {
        self.rules
            .iter()
            .filter_map(|rule| {
                let mut finding = rule.evaluate(metrics)?;
                if let Some(&override_severity) = self.severity.get(&rule.key().to_ascii_lowercase()) {
                    finding.severity = override_severity;
                }
                Some(finding)
            })
            .collect()
    }
}

/// Parses a config-supplied severity name (case-insensitive) for the
/// `[rules.severity]` override table. Unrecognized names are ignored rather
/// than rejected, so a typo in config falls back to the rule's own severity.
fn parse_severity(name: &str) -> Option<Severity> {
    match name.to_ascii_lowercase().as_str() {
        "info" => Some(Severity::Info),
        "optimization" => Some(Severity::Optimization),
        "warning" => Some(Severity::Warning),
        "critical" => Some(Severity::Critical),
        _ => None
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

struct FullTableScanRule;
impl Rule for FullTableScanRule {
    fn key(&self) -> &'static str {
        "full_table_scan"
    }

    fn evaluate(&self, m: &Metrics) -> Option<Finding> {
        if !m.has_table_scan || m.is_intentional_scan {
            return None;
        }
        let severity = if m.rows_examined > 10_000 {
            Severity::Critical
        } else {
            Severity::Warning
        };
        Some(
            Finding::new(
                severity,
                "full_table_scan",
                "Full table scan detected",
                format!("The query performs a full table scan examining {} rows", m.rows_examined)
            )
            .with_recommendation("Add an index on the filtered columns to avoid scanning the entire table")
        )
    }
}

struct TempTableRule;
impl Rule for TempTableRule {
    fn key(&self) -> &'static str {
        "temp_table"
    }

    fn evaluate(&self, m: &Metrics) -> Option<Finding> {
        if !m.has_temp_table {
            return None;
        }
        let (severity, recommendation) = if m.has_disk_temp {
            (
                Severity::Critical,
                "Increase tmp_table_size/max_heap_table_size, or restructure the query to avoid an on-disk temp table"
            )
        } else {
            (Severity::Warning, "Consider restructuring the query to avoid the temporary table")
        };
        Some(
            Finding::new(
                severity,
                "temp_table",
                "Temporary table created",
                "The query requires a temporary table to complete execution"
            )
            .with_recommendation(recommendation)
        )
    }
}

struct WeedoutRule;
impl Rule for WeedoutRule {
    fn key(&self) -> &'static str {
        "weedout"
    }

    fn evaluate(&self, m: &Metrics) -> Option<Finding> {
        if !m.has_weedout {
            return None;
        }
        Some(
            Finding::new(
                Severity::Optimization,
                "weedout",
                "Semi-join weedout strategy used",
                "The optimizer materializes a weedout table to deduplicate a semi-join"
            )
            .with_recommendation("An index on the join columns can often let the optimizer avoid weedout entirely")
        )
    }
}

struct DeepNestedLoopRule {
    warning_threshold: usize
}

impl DeepNestedLoopRule {
    fn new(warning_threshold: usize) -> Self {
        Self {
            warning_threshold
        }
    }
}

impl Rule for DeepNestedLoopRule {
    fn key(&self) -> &'static str {
        "deep_nested_loop"
    }

    fn evaluate(&self, m: &Metrics) -> Option<Finding> {
        if m.nested_loop_depth < self.warning_threshold {
            return None;
        }
        let severity = if m.nested_loop_depth >= 6 {
            Severity::Critical
        } else {
            Severity::Warning
        };
        Some(
            Finding::new(
                severity,
                "deep_nested_loop",
                "Deeply nested loop join",
                format!(
                    "Nested loop depth is {}, at or above the configured threshold of {}",
                    m.nested_loop_depth, self.warning_threshold
                )
            )
            .with_recommendation("Reduce the number of joined tables or add covering indexes to shrink fanout per level")
        )
    }
}

struct IndexMergeRule;
impl Rule for IndexMergeRule {
    fn key(&self) -> &'static str {
        "index_merge"
    }

    fn evaluate(&self, m: &Metrics) -> Option<Finding> {
        if !m.has_index_merge {
            return None;
        }
        Some(
            Finding::new(
                Severity::Optimization,
                "index_merge",
                "Index merge used",
                "The optimizer combined multiple single-column indexes instead of using one composite index"
            )
            .with_recommendation("Consider a single composite index covering all merged conditions")
        )
    }
}

struct StaleStatsRule;
impl Rule for StaleStatsRule {
    fn key(&self) -> &'static str {
        "stale_stats"
    }

    fn evaluate(&self, m: &Metrics) -> Option<Finding> {
        for (table, estimate) in &m.per_table_estimates {
            let Some(estimated) = estimate.estimated_rows else {
                continue;
            };
            let Some(actual) = estimate.actual_rows else {
                continue;
            };
            if actual == 0 {
                continue;
            }
            let estimated = estimated.max(1);
            let ratio = (actual as f64 / estimated as f64).max(estimated as f64 / actual as f64);
            if ratio > 10.0 {
                return Some(
                    Finding::new(
                        Severity::Warning,
                        "stale_stats",
                        "Stale table statistics",
                        format!(
                            "Table `{table}` estimated {estimated} rows but actually returned {actual} (deviation {ratio:.1}x)"
                        )
                    )
                    .with_recommendation(format!("ANALYZE TABLE `{table}`"))
                );
            }
        }
        None
    }
}

struct LimitIneffectiveRule;
impl Rule for LimitIneffectiveRule {
    fn key(&self) -> &'static str {
        "limit_ineffective"
    }

    fn evaluate(&self, m: &Metrics) -> Option<Finding> {
        if m.has_early_termination {
            return None;
        }
        let threshold = m.rows_returned.max(1) as f64 * 50.0;
        if (m.rows_examined as f64) <= threshold {
            return None;
        }
        Some(
            Finding::new(
                Severity::Warning,
                "limit_ineffective",
                "LIMIT did not reduce work",
                format!(
                    "{} rows were examined to return {} rows; the engine could not terminate early",
                    m.rows_examined, m.rows_returned
                )
            )
            .with_recommendation("Add a selective, index-backed WHERE condition so LIMIT can short-circuit the scan")
        )
    }
}

struct QuadraticComplexityRule;
impl Rule for QuadraticComplexityRule {
    fn key(&self) -> &'static str {
        "quadratic_complexity"
    }

    fn evaluate(&self, m: &Metrics) -> Option<Finding> {
        if m.complexity != crate::metrics::ComplexityClass::Quadratic {
            return None;
        }
        Some(
            Finding::new(
                Severity::Critical,
                "quadratic_complexity",
                "Quadratic complexity detected",
                format!(
                    "Nested loop depth {} with up to {} loops classifies this query as quadratic",
                    m.nested_loop_depth, m.max_loops
                )
            )
            .with_recommendation("Restructure joins to avoid nested-loop fanout, or add indexes to cap per-level loop counts")
        )
    }
}

struct NoIndexRule;
impl Rule for NoIndexRule {
    fn key(&self) -> &'static str {
        "no_index"
    }

    fn evaluate(&self, m: &Metrics) -> Option<Finding> {
        if m.is_zero_row_const || m.is_intentional_scan {
            return None;
        }
        if matches!(m.primary_access_type, Some(AccessType::ConstRow | AccessType::SingleRowLookup)) {
            return None;
        }
        if m.is_index_backed {
            return None;
        }
        let severity = if m.has_table_scan {
            Severity::Critical
        } else {
            Severity::Warning
        };
        Some(
            Finding::new(
                severity,
                "no_index",
                "Query is not index-backed",
                "No index-backed access path was found for this query"
            )
            .with_recommendation("Add an index covering the WHERE/JOIN columns used by this query")
        )
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
    fn full_table_scan_fires_critical_on_large_scan() {
        let mut metrics = base_metrics();
        metrics.has_table_scan = true;
        metrics.rows_examined = 50_000;
        metrics.primary_access_type = Some(AccessType::TableScan);
        metrics.is_index_backed = false;
        let registry = RuleRegistry::new();
        let findings = registry.evaluate(&metrics);
        let finding = findings.iter().find(|f| f.category == "full_table_scan").unwrap();
        assert_eq!(finding.severity, Severity::Critical);
    }

    #[test]
    fn intentional_scan_suppresses_full_table_scan_and_no_index() {
        let mut metrics = base_metrics();
        metrics.has_table_scan = true;
        metrics.is_intentional_scan = true;
        metrics.primary_access_type = Some(AccessType::TableScan);
        metrics.is_index_backed = false;
        let registry = RuleRegistry::new();
        let findings = registry.evaluate(&metrics);
        assert!(findings.iter().all(|f| f.category != "full_table_scan" && f.category != "no_index"));
    }

    #[test]
    fn disabled_rule_is_excluded() {
        let config = RulesConfig {
            enabled:  None,
            disabled: vec!["temp_table".to_string()],
            severity: Default::default()
        };
        let mut metrics = base_metrics();
        metrics.has_temp_table = true;
        let registry = RuleRegistry::with_config(&config);
        let findings = registry.evaluate(&metrics);
        assert!(findings.iter().all(|f| f.category != "temp_table"));
    }
}
