//! AntiPatternAnalyzer: flags SQL-text-level smells that a plan-shape-only
//! view (metrics, rules) cannot see - `SELECT *`, long `OR` chains,
//! correlated subqueries, functions wrapping a filtered column, leading
//! wildcard `LIKE`, and large unbounded scans with no `LIMIT`.

use crate::{
    config::AntiPatternsConfig,
    lexical::LexicalFacts,
    metrics::Metrics,
    report::{Finding, Severity}
};

pub fn analyze(facts: &LexicalFacts, metrics: &Metrics, config: &AntiPatternsConfig) -> Vec<Finding> {
    let mut findings = Vec::new();

    if facts.has_select_star {
        findings.push(
            Finding::new(
                Severity::Optimization,
                "select_star",
                "SELECT * used",
                "Selecting all columns prevents covering-index optimization and over-fetches data"
            )
            .with_recommendation("List only the columns the caller actually needs")
        );
    }

    if facts.or_chain_count >= config.or_chain_threshold {
        findings.push(
            Finding::new(
                Severity::Warning,
                "or_chain",
                "Long OR chain in WHERE clause",
                format!(
                    "{} OR conditions were found, at or above the configured threshold of {}",
                    facts.or_chain_count, config.or_chain_threshold
                )
            )
            .with_recommendation("Rewrite as IN (...) so the optimizer can use a single index range scan")
        );
    }

    if facts.has_correlated_subquery {
        findings.push(
            Finding::new(
                Severity::Warning,
                "correlated_subquery",
                "Correlated subquery detected",
                "A subquery references the outer query's tables, re-evaluating once per outer row"
            )
            .with_recommendation("Rewrite as a JOIN or a derived table so the subquery runs once")
        );
    }

    if facts.has_function_on_where_column {
        findings.push(
            Finding::new(
                Severity::Warning,
                "function_on_column",
                "Function wraps a filtered column",
                "Wrapping a WHERE column in a function call prevents the optimizer from using an index on that \
                 column"
            )
            .with_recommendation(
                "Rewrite the predicate so the column is unwrapped (e.g. compare against a computed bound instead \
                 of calling the function on the column)"
            )
        );
    }

    if facts.has_leading_wildcard_like {
        findings.push(
            Finding::new(
                Severity::Warning,
                "leading_wildcard",
                "Leading wildcard in LIKE",
                "A LIKE pattern starting with '%' cannot use a B-tree index prefix"
            )
            .with_recommendation("Use a full-text index, or anchor the pattern at the start of the string")
        );
    }

    if !facts.has_limit && metrics.has_table_scan && metrics.rows_examined > config.missing_limit_row_threshold {
        findings.push(
            Finding::new(
                Severity::Optimization,
                "missing_limit",
                "Large scan without LIMIT",
                format!("{} rows were examined with no LIMIT clause", metrics.rows_examined)
            )
            .with_recommendation("Add a LIMIT clause if the caller does not need every row")
        );
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ComplexityClass;

    fn base_metrics() -> Metrics {
        Metrics {
            execution_time_ms: 1.0,
            rows_examined: 50_000,
            rows_returned: 50_000,
            nested_loop_depth: 0,
            max_loops: 1,
            max_cost: 1.0,
            has_temp_table: false,
            has_weedout: false,
            has_filesort: false,
            has_table_scan: true,
            has_index_merge: false,
            has_covering_index: false,
            has_disk_temp: false,
            has_materialization: false,
            has_early_termination: false,
            is_index_backed: false,
            is_zero_row_const: false,
            is_intentional_scan: false,
            primary_access_type: Some(crate::plan::AccessType::TableScan),
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
    fn flags_select_star_and_missing_limit() {
        let mut facts = LexicalFacts::new("SELECT * FROM t".to_string());
        facts.has_select_star = true;
        let config = AntiPatternsConfig::default();
        let findings = analyze(&facts, &base_metrics(), &config);
        assert!(findings.iter().any(|f| f.category == "select_star"));
        assert!(findings.iter().any(|f| f.category == "missing_limit"));
    }

    #[test]
    fn clean_query_has_no_findings() {
        let facts = LexicalFacts::new("SELECT id FROM t WHERE id = 1".to_string());
        let mut metrics = base_metrics();
        metrics.has_table_scan = false;
        metrics.rows_examined = 1;
        let config = AntiPatternsConfig::default();
        assert!(analyze(&facts, &metrics, &config).is_empty());
    }
}
