//! PlanParser: turns `EXPLAIN ANALYZE` tree-format text into a [`PlanNode`]
//! tree via a stack-based indentation walk.
//!
//! Unlike the recursive descent `lexical::extract` uses for nested
//! set-expressions, plan indentation is iterative, not recursive-AST
//! shaped, so an explicit `Vec` stack replaces the recursive call stack.

use std::sync::LazyLock;

use regex::Regex;

/// Access-type tag for one plan node, ascending severity order. The
/// derive order of the variants IS the severity order: `table_scan` is
/// the worst outcome, `zero_row_const` the best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    ZeroRowConst,
    ConstRow,
    SingleRowLookup,
    CoveringIndexLookup,
    FulltextIndex,
    IndexLookup,
    IndexRangeScan,
    IndexScan,
    TableScan
}

impl AccessType {
    /// I/O access types: the node actually touches storage.
    pub fn is_io(self) -> bool {
        matches!(
            self,
            Self::TableScan
                | Self::IndexLookup
                | Self::IndexRangeScan
                | Self::CoveringIndexLookup
                | Self::SingleRowLookup
                | Self::IndexScan
                | Self::FulltextIndex
                | Self::ConstRow
        )
    }

    pub fn is_index_backed(self) -> bool {
        matches!(
            self,
            Self::SingleRowLookup
                | Self::CoveringIndexLookup
                | Self::FulltextIndex
                | Self::IndexLookup
                | Self::IndexRangeScan
                | Self::IndexScan
        )
    }

    /// Maps to MySQL's own `EXPLAIN` `type` column vocabulary.
    pub fn mysql_name(self) -> &'static str {
        match self {
            Self::ZeroRowConst | Self::ConstRow => "const",
            Self::SingleRowLookup => "eq_ref",
            Self::CoveringIndexLookup | Self::IndexLookup => "ref",
            Self::FulltextIndex => "fulltext",
            Self::IndexRangeScan => "range",
            Self::IndexScan => "index",
            Self::TableScan => "ALL"
        }
    }

    /// Longest/most-specific prefixes first, so "single-row covering index
    /// lookup" matches before "covering index lookup" before "index
    /// lookup".
    const PREFIXES: &'static [(&'static str, Option<Self>)] = &[
        ("single-row covering index lookup", Some(Self::SingleRowLookup)),
        ("single row covering index lookup", Some(Self::SingleRowLookup)),
        ("covering index lookup", Some(Self::CoveringIndexLookup)),
        ("full-text index", Some(Self::FulltextIndex)),
        ("fulltext index", Some(Self::FulltextIndex)),
        ("index lookup", Some(Self::IndexLookup)),
        ("table scan", Some(Self::TableScan)),
        ("index range scan", Some(Self::IndexRangeScan)),
        ("index scan", Some(Self::IndexScan)),
        ("constant row", Some(Self::ConstRow)),
        ("zero rows", Some(Self::ZeroRowConst)),
        ("nested loop", None),
        ("sort", None),
        ("filter", None),
        ("limit", None),
        ("materialize", None),
        ("stream results", None),
        ("group", None),
        ("hash join", None),
        ("hash", None)
    ];

    /// Classify the operation label via starts-with matching on the
    /// priority-ordered prefix list. Control-flow labels (nested loop,
    /// sort, ...) classify but carry no access type.
    pub fn classify(operation: &str) -> Option<Self> {
        let lower = operation.to_lowercase();
        for (prefix, access_type) in Self::PREFIXES {
            if lower.starts_with(prefix) {
                return *access_type;
            }
        }
        None
    }
}

/// One node in the parsed plan tree.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PlanNode {
    pub operation:        String,
    pub raw_line:         String,
    pub indent:           usize,
    pub actual_time_start: Option<f64>,
    pub actual_time_end:  Option<f64>,
    pub actual_rows:      Option<u64>,
    pub loops:            Option<u64>,
    pub estimated_cost:   Option<f64>,
    pub estimated_rows:   Option<u64>,
    pub table:            Option<String>,
    pub index:            Option<String>,
    pub access_type:      Option<AccessType>,
    pub never_executed:   bool,
    pub children:         Vec<PlanNode>
}

impl PlanNode {
    /// `rowsProcessed = actualRows × loops` when both are present, else 0.
    pub fn rows_processed(&self) -> u64 {
        match (self.actual_rows, self.loops) {
            (Some(rows), Some(loops)) => rows * loops,
            _ => 0
        }
    }

    /// A node is an I/O operation iff its access type is in the read set.
    /// `zero_row_const` is resolved at plan time and is never I/O.
    pub fn is_io(&self) -> bool {
        match self.access_type {
            Some(AccessType::ZeroRowConst) => false,
            Some(t) => t.is_io(),
            None => false
        }
    }

    /// Depth-first, pre-order flattening of this node and its descendants.
    pub fn flatten(&self) -> Vec<&PlanNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.flatten());
        }
        out
    }
}

static NODE_START: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*->").expect("valid regex"));
static INDENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\s*)->").expect("valid regex"));
static COST_ROWS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(cost=([\d.e+-]+)\s+rows=([\d.e+-]+)\)").expect("valid regex")
});
static ACTUAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(actual time=([\d.]+)\.\.([\d.]+)\s+rows=(\d+)\s+loops=(\d+)\)")
        .expect("valid regex")
});
static NEVER_EXECUTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)never executed").expect("valid regex"));
static TABLE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:scan|lookup|search) on (\S+)|\bconstant row from (\S+)").expect("valid regex")
});
static INDEX_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)using ([A-Za-z0-9_`]+)").expect("valid regex"));

const INDEX_NOISE: &[&str] = &["index", "temporary", "where"];

/// Parse tree-format EXPLAIN ANALYZE text into a root [`PlanNode`].
///
/// Line folding: a new node begins at `^\s*->`; continuation lines are
/// appended to the current node's text with a separating space.
pub fn parse(plan_text: &str) -> Option<PlanNode> {
    let mut folded: Vec<(usize, String)> = Vec::new();
    for line in plan_text.lines() {
        if NODE_START.is_match(line) {
            let indent = INDENT
                .captures(line)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().len())
                .unwrap_or(0);
            folded.push((indent, line.trim().to_string()));
        } else if let Some((_, last)) = folded.last_mut() {
            last.push(' ');
            last.push_str(line.trim());
        }
    }

    let mut stack: Vec<PlanNode> = Vec::new();
    for (indent, text) in folded {
        let node = parse_line(indent, &text);
        while let Some(top) = stack.last()
            && top.indent >= indent
        {
            let finished = stack.pop().unwrap();
            attach_or_push(&mut stack, finished);
        }
        stack.push(node);
    }
    while stack.len() > 1 {
        let finished = stack.pop().unwrap();
        attach_or_push(&mut stack, finished);
    }
    stack.pop()
}

fn attach_or_push(stack: &mut Vec<PlanNode>, node: PlanNode) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    } else {
        stack.push(node);
    }
}

fn parse_line(indent: usize, text: &str) -> PlanNode {
    let stripped = text.trim_start_matches("->").trim();

    let operation = operation_label(stripped);
    let (estimated_cost, estimated_rows) = COST_ROWS
        .captures(stripped)
        .map(|c| {
            (
                c.get(1).and_then(|m| m.as_str().parse::<f64>().ok()),
                c.get(2).and_then(|m| parse_scientific_rows(m.as_str()))
            )
        })
        .unwrap_or((None, None));

    let (actual_time_start, actual_time_end, actual_rows, loops) = ACTUAL
        .captures(stripped)
        .map(|c| {
            (
                c.get(1).and_then(|m| m.as_str().parse::<f64>().ok()),
                c.get(2).and_then(|m| m.as_str().parse::<f64>().ok()),
                c.get(3).and_then(|m| m.as_str().parse::<u64>().ok()),
                c.get(4).and_then(|m| m.as_str().parse::<u64>().ok())
            )
        })
        .unwrap_or((None, None, None, None));

    let never_executed = NEVER_EXECUTED.is_match(stripped);

    let table = TABLE_REF
        .captures(stripped)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().trim_matches('`').to_string());

    let index = INDEX_REF
        .captures(stripped)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|name| !INDEX_NOISE.iter().any(|n| n.eq_ignore_ascii_case(name)));

    let mut access_type = AccessType::classify(&operation);
    if access_type.is_none() && stripped.to_lowercase().contains("zero rows") {
        access_type = Some(AccessType::ZeroRowConst);
    }

    PlanNode {
        operation,
        raw_line: text.to_string(),
        indent,
        actual_time_start,
        actual_time_end,
        actual_rows,
        loops,
        estimated_cost,
        estimated_rows,
        table,
        index,
        access_type,
        never_executed,
        children: Vec::new()
    }
}

/// The operation label is the substring before `(cost=…`, `(actual …`, or
/// `never executed`.
fn operation_label(stripped: &str) -> String {
    let markers = ["(cost=", "(actual", "never executed"];
    let mut end = stripped.len();
    for marker in markers {
        if let Some(pos) = stripped.find(marker)
            && pos < end
        {
            end = pos;
        }
    }
    stripped[..end].trim().to_string()
}

fn parse_scientific_rows(s: &str) -> Option<u64> {
    s.parse::<f64>().ok().map(|f| f.round() as u64)
}
