use std::collections::HashMap;

use compact_str::CompactString;
use serde::Serialize;
use smallvec::SmallVec;

/// Type alias for small column vectors (a single clause rarely names more
/// than a handful of columns).
pub type ColumnVec = SmallVec<[CompactString; 8]>;

/// Best-effort facts extracted from one read-only SQL statement.
///
/// `extract` never fails: every field defaults to empty/false when the
/// regex-level or AST-level extraction finds nothing. Downstream analyzers
/// treat these as hints, not as ground truth (regex cannot perfectly parse
/// nested SQL - see module docs).
#[derive(Debug, Clone, Serialize, Default)]
pub struct LexicalFacts {
    pub raw:            String,
    pub tables:         Vec<CompactString>,
    /// alias -> physical base table name; `None` for a derived-subquery
    /// alias that has no single backing table.
    pub alias_map:      HashMap<CompactString, Option<CompactString>>,
    /// `AS` aliases introduced in the SELECT list. These are virtual
    /// columns and must be skipped by schema validation.
    pub virtual_aliases: Vec<CompactString>,

    pub where_cols: ColumnVec,
    pub join_cols:  ColumnVec,
    pub order_cols: ColumnVec,
    pub select_cols: ColumnVec,
    pub group_cols: ColumnVec,
    pub having_cols: ColumnVec,

    pub has_select_star:              bool,
    pub has_leading_wildcard_like:    bool,
    pub has_function_on_where_column: bool,
    pub has_correlated_subquery:      bool,
    pub or_chain_count:               usize,
    pub has_limit:                    bool,
    pub has_exists:                   bool,
    pub has_aggregation_without_group_by: bool,
    /// A SELECT with no WHERE/JOIN/GROUP/HAVING/ORDER - reading a whole
    /// table by design, not an accidental missing filter.
    pub is_intentional_full_scan: bool,

    pub has_union:    bool,
    pub has_distinct: bool,
    pub has_subquery: bool,

    pub limit:  Option<u64>,
    pub offset: Option<u64>
}

impl LexicalFacts {
    pub fn new(raw: String) -> Self {
        Self {
            raw,
            ..Default::default()
        }
    }

    /// All columns referenced anywhere in the statement, for schema
    /// validation and index-synthesis candidate gathering.
    pub fn all_referenced_columns(&self) -> Vec<&str> {
        self.where_cols
            .iter()
            .chain(self.join_cols.iter())
            .chain(self.order_cols.iter())
            .chain(self.group_cols.iter())
            .chain(self.having_cols.iter())
            .map(|c| c.as_str())
            .collect()
    }
}
