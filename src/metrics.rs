//! MetricsExtractor: walks a parsed [`crate::plan::PlanNode`] tree into the
//! flat [`Metrics`] bag every downstream stage (scoring, rules, analyzers)
//! reads from.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;

use crate::plan::{AccessType, PlanNode};

/// Complexity classification of a query's access pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ComplexityClass {
    Constant,
    Logarithmic,
    LogRange,
    Linear,
    Linearithmic,
    Quadratic
}

impl ComplexityClass {
    pub fn label(self) -> &'static str {
        match self {
            Self::Constant => "Constant",
            Self::Logarithmic => "Logarithmic",
            Self::LogRange => "Log-range",
            Self::Linear => "Linear",
            Self::Linearithmic => "Linearithmic",
            Self::Quadratic => "Quadratic"
        }
    }

    pub fn risk(self) -> &'static str {
        match self {
            Self::Constant | Self::Logarithmic | Self::LogRange => "LOW",
            Self::Linear | Self::Linearithmic => "MEDIUM",
            Self::Quadratic => "HIGH"
        }
    }

    /// Linear-projection factor used by the scalability estimator: how
    /// many times the row count, metrics grow when the target row count
    /// grows by the same factor.
    pub fn scalability_factor(self) -> f64 {
        match self {
            Self::Constant => 0.0,
            Self::Logarithmic => 0.1,
            Self::LogRange => 0.3,
            Self::Linear => 1.0,
            Self::Linearithmic => 1.3,
            Self::Quadratic => 2.0
        }
    }
}

/// Flat map of every scalar metric downstream stages depend on. A typed
/// struct rather than an untyped map: each key from the original design
/// becomes an explicit field.
#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    pub execution_time_ms:   f64,
    pub rows_examined:       u64,
    pub rows_returned:       u64,
    pub nested_loop_depth:   usize,
    pub max_loops:           u64,
    pub max_cost:            f64,
    pub has_temp_table:      bool,
    pub has_weedout:         bool,
    pub has_filesort:        bool,
    pub has_table_scan:      bool,
    pub has_index_merge:     bool,
    pub has_covering_index:  bool,
    pub has_disk_temp:       bool,
    pub has_materialization: bool,
    pub has_early_termination: bool,
    pub is_index_backed:     bool,
    pub is_zero_row_const:   bool,
    pub is_intentional_scan: bool,
    pub primary_access_type: Option<AccessType>,
    pub mysql_access_type:   Option<&'static str>,
    pub complexity:          ComplexityClass,
    pub complexity_label:    &'static str,
    pub complexity_risk:     &'static str,
    pub fanout_factor:       u64,
    pub join_count:          usize,
    pub selectivity_ratio:   f64,
    pub indexes_used:        Vec<String>,
    pub tables_accessed:     Vec<String>,
    pub node_count:          usize,
    pub per_table_estimates: IndexMap<String, TableEstimate>,
    pub parsing_valid:       bool
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TableEstimate {
    pub estimated_rows: Option<u64>,
    pub actual_rows:    Option<u64>,
    pub loops:          Option<u64>
}

static COVERING_INDEX_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)covering index").expect("valid regex"));
static TEMP_TABLE_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)temporary").expect("valid regex"));
static FILESORT_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsort\b").expect("valid regex"));
static WEEDOUT_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)weedout").expect("valid regex"));
static INDEX_MERGE_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)index merge").expect("valid regex"));
static DISK_TEMP_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)using (temporary; )?.*disk|disk temp").expect("valid regex"));
static MATERIALIZE_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)materializ").expect("valid regex"));
static LIMIT_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blimit\b").expect("valid regex"));

const DERIVED_TABLE_MARKERS: &[&str] = &["<subquery", "<temporary>", "drv"];

/// Walk the plan tree and compute every metric in one pass.
pub fn extract(root: &PlanNode, plan_text: &str, is_intentional_scan: bool) -> Metrics {
    let nodes = root.flatten();

    let execution_time_ms = root.actual_time_end.unwrap_or(0.0);
    let rows_returned = root.actual_rows.unwrap_or(0);

    let rows_examined: u64 = nodes.iter().filter(|n| n.is_io()).map(|n| n.rows_processed()).sum();

    let nested_loop_depth = nodes
        .iter()
        .filter(|n| n.operation.to_lowercase().contains("nested loop"))
        .count();

    let max_loops = nodes.iter().filter_map(|n| n.loops).max().unwrap_or(0);
    let max_cost = nodes.iter().filter_map(|n| n.estimated_cost).fold(0.0_f64, f64::max);

    let primary_access_type = nodes.iter().filter_map(|n| n.access_type).max();
    let mysql_access_type = primary_access_type.map(AccessType::mysql_name);

    let is_index_backed = nodes
        .iter()
        .any(|n| n.access_type.is_some_and(AccessType::is_index_backed));

    let has_table_scan = nodes.iter().any(|n| {
        n.access_type == Some(AccessType::TableScan)
            && n.table
                .as_deref()
                .map(|t| !DERIVED_TABLE_MARKERS.iter().any(|m| t.contains(m)))
                .unwrap_or(true)
    });

    let has_covering_index = nodes
        .iter()
        .any(|n| n.access_type == Some(AccessType::CoveringIndexLookup))
        || COVERING_INDEX_TEXT.is_match(plan_text);

    let has_temp_table = TEMP_TABLE_TEXT.is_match(plan_text);
    let has_filesort = FILESORT_TEXT.is_match(plan_text);
    let has_weedout = WEEDOUT_TEXT.is_match(plan_text);
    let has_index_merge = INDEX_MERGE_TEXT.is_match(plan_text);
    let has_disk_temp = DISK_TEMP_TEXT.is_match(plan_text);
    let has_materialization = MATERIALIZE_TEXT.is_match(plan_text);

    let has_early_termination = LIMIT_TEXT.is_match(plan_text)
        && nodes.iter().any(|n| {
            n.loops == Some(1)
                && match (n.estimated_rows, n.actual_rows) {
                    (Some(est), Some(act)) if act > 0 => (est as f64) > 5.0 * (act as f64),
                    _ => false
                }
        });

    let is_zero_row_const = nodes.iter().any(|n| n.access_type == Some(AccessType::ZeroRowConst));
    let parsing_valid = root.actual_time_end.is_some();

    let selectivity_ratio = if rows_returned == 0 {
        rows_examined as f64
    } else {
        rows_examined as f64 / rows_returned.max(1) as f64
    };

    let fanout_factor = nodes
        .iter()
        .filter(|n| n.is_io())
        .map(|n| n.rows_processed())
        .max()
        .unwrap_or(0);

    let indexes_used: Vec<String> = nodes.iter().filter_map(|n| n.index.clone()).collect();
    let tables_accessed: Vec<String> = nodes.iter().filter_map(|n| n.table.clone()).collect();

    let mut per_table_estimates: IndexMap<String, TableEstimate> = IndexMap::new();
    for node in &nodes {
        let Some(table) = &node.table else {
            continue;
        };
        let candidate = TableEstimate {
            estimated_rows: node.estimated_rows,
            actual_rows:    node.actual_rows,
            loops:          node.loops
        };
        per_table_estimates
            .entry(table.clone())
            .and_modify(|existing| {
                if candidate.actual_rows.unwrap_or(0) > existing.actual_rows.unwrap_or(0) {
                    *existing = candidate;
                }
            })
            .or_insert(candidate);
    }

    let join_count = nodes.iter().filter(|n| n.table.is_some()).count().saturating_sub(1).max(0);

    let complexity = classify_complexity(
        has_table_scan,
        max_loops,
        nested_loop_depth,
        primary_access_type,
        has_filesort,
        has_temp_table
    );

    Metrics {
        execution_time_ms,
        rows_examined,
        rows_returned,
        nested_loop_depth,
        max_loops,
        max_cost,
        has_temp_table,
        has_weedout,
        has_filesort,
        has_table_scan,
        has_index_merge,
        has_covering_index,
        has_disk_temp,
        has_materialization,
        has_early_termination,
        is_index_backed,
        is_zero_row_const,
        is_intentional_scan,
        primary_access_type,
        mysql_access_type,
        complexity,
        complexity_label: complexity.label(),
        complexity_risk: complexity.risk(),
        fanout_factor,
        join_count,
        selectivity_ratio,
        indexes_used,
        tables_accessed,
        node_count: nodes.len(),
        per_table_estimates,
        parsing_valid
    }
}

fn classify_complexity(
    has_table_scan: bool,
    max_loops: u64,
    nested_loop_depth: usize,
    primary_access_type: Option<AccessType>,
    has_filesort: bool,
    has_temp_table: bool
) -> ComplexityClass {
    if (has_table_scan && nested_loop_depth > 0)
        || (has_table_scan && max_loops > 10_000)
        || (nested_loop_depth > 3 && max_loops > 1_000)
    {
        return ComplexityClass::Quadratic;
    }

    let base_class = match primary_access_type {
        Some(AccessType::ZeroRowConst | AccessType::ConstRow | AccessType::SingleRowLookup) => {
            ComplexityClass::Constant
        }
        Some(AccessType::CoveringIndexLookup | AccessType::IndexLookup) => ComplexityClass::Logarithmic,
        Some(AccessType::IndexRangeScan) => ComplexityClass::LogRange,
        Some(AccessType::IndexScan | AccessType::TableScan | AccessType::FulltextIndex) => {
            ComplexityClass::Linear
        }
        None => ComplexityClass::Linear
    };
    let mut class = base_class;

    if has_filesort && class < ComplexityClass::Linearithmic {
        class = ComplexityClass::Linearithmic;
    }
    if has_temp_table && class < ComplexityClass::Linear {
        class = ComplexityClass::Linear;
    }
    // Evaluated against the base class, not the filesort/temp-table-lifted
    // `class` above: a temp table that already lifted a Logarithmic base to
    // Linear must not then dodge this rule just because Linear > Logarithmic.
    if nested_loop_depth >= 2 && base_class <= ComplexityClass::Logarithmic {
        class = class.max(ComplexityClass::Linearithmic);
    }

    class
}
