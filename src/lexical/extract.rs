mod expr;
mod set_expr;
mod table;

use std::collections::HashMap;

use compact_str::CompactString;
pub use expr::{contains_subquery, extract_columns_from_expr};
use indexmap::IndexSet;
pub use set_expr::extract_from_set_expr;

/// Context threaded through the AST walk while building a [`LexicalFacts`](super::types::LexicalFacts).
pub struct ExtractionContext<'a> {
    pub tables:          &'a mut IndexSet<CompactString>,
    pub alias_map:       &'a mut HashMap<CompactString, Option<CompactString>>,
    pub where_cols:      &'a mut IndexSet<CompactString>,
    pub join_cols:       &'a mut IndexSet<CompactString>,
    pub select_cols:     &'a mut IndexSet<CompactString>,
    pub virtual_aliases: &'a mut IndexSet<CompactString>,
    pub group_cols:      &'a mut IndexSet<CompactString>,
    pub having_cols:     &'a mut IndexSet<CompactString>,
    pub has_union:       &'a mut bool,
    pub has_distinct:    &'a mut bool,
    pub has_subquery:    &'a mut bool
}
