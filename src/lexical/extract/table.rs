use std::collections::HashMap;

use compact_str::CompactString;
use indexmap::IndexSet;

use super::{ExtractionContext, set_expr::extract_from_set_expr};

pub fn extract_from_table_factor(
    table_factor: &sqlparser::ast::TableFactor,
    tables: &mut IndexSet<CompactString>,
    alias_map: &mut HashMap<CompactString, Option<CompactString>>
) {
    use sqlparser::ast::TableFactor;

    match table_factor {
        TableFactor::Table {
            name,
            alias,
            ..
        } => {
            let physical: CompactString = name.to_string().into();
            tables.insert(physical.clone());
            if let Some(alias) = alias {
                alias_map.insert(alias.name.value.as_str().into(), Some(physical));
            }
        }
        TableFactor::Derived {
            subquery,
            alias,
            ..
        } => {
            if let Some(alias) = alias {
                alias_map.insert(alias.name.value.as_str().into(), None);
            }
            let mut sub_where = IndexSet::new();
            let mut sub_join = IndexSet::new();
            let mut sub_select = IndexSet::new();
            let mut sub_virtual = IndexSet::new();
            let mut sub_group = IndexSet::new();
            let mut sub_having = IndexSet::new();
            let mut has_union = false;
            let mut has_distinct = false;
            let mut has_subquery = false;
            let mut ctx = ExtractionContext {
                tables,
                alias_map,
                where_cols: &mut sub_where,
                join_cols: &mut sub_join,
                select_cols: &mut sub_select,
                virtual_aliases: &mut sub_virtual,
                group_cols: &mut sub_group,
                having_cols: &mut sub_having,
                has_union: &mut has_union,
                has_distinct: &mut has_distinct,
                has_subquery: &mut has_subquery
            };
            extract_from_set_expr(&subquery.body, &mut ctx);
        }
        TableFactor::TableFunction {
            ..
        } => {}
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            extract_from_table_factor(&table_with_joins.relation, tables, alias_map);
            for join in &table_with_joins.joins {
                extract_from_table_factor(&join.relation, tables, alias_map);
            }
        }
        _ => {}
    }
}
