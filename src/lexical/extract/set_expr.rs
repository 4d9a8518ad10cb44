use super::{
    ExtractionContext,
    expr::{contains_subquery, extract_columns_from_expr},
    table::extract_from_table_factor
};

pub fn extract_from_set_expr(set_expr: &sqlparser::ast::SetExpr, ctx: &mut ExtractionContext<'_>) {
    use sqlparser::ast::SetExpr;
    match set_expr {
        SetExpr::Select(select) => {
            *ctx.has_distinct = select.distinct.is_some();
            for item in &select.projection {
                match item {
                    sqlparser::ast::SelectItem::UnnamedExpr(expr) => {
                        extract_columns_from_expr(expr, ctx.select_cols);
                        if contains_subquery(expr) {
                            *ctx.has_subquery = true;
                        }
                    }
                    sqlparser::ast::SelectItem::ExprWithAlias {
                        expr,
                        alias
                    } => {
                        extract_columns_from_expr(expr, ctx.select_cols);
                        ctx.virtual_aliases.insert(alias.value.as_str().into());
                        if contains_subquery(expr) {
                            *ctx.has_subquery = true;
                        }
                    }
                    _ => {}
                }
            }
            for table in &select.from {
                extract_from_table_factor(&table.relation, ctx.tables, ctx.alias_map);
                for join in &table.joins {
                    extract_from_table_factor(&join.relation, ctx.tables, ctx.alias_map);
                    match &join.join_operator {
                        sqlparser::ast::JoinOperator::Inner(constraint)
                        | sqlparser::ast::JoinOperator::LeftOuter(constraint)
                        | sqlparser::ast::JoinOperator::RightOuter(constraint)
                        | sqlparser::ast::JoinOperator::FullOuter(constraint) => {
                            if let sqlparser::ast::JoinConstraint::On(expr) = constraint {
                                extract_columns_from_expr(expr, ctx.join_cols);
                            }
                        }
                        _ => {}
                    }
                }
            }
            if let Some(selection) = &select.selection {
                extract_columns_from_expr(selection, ctx.where_cols);
                if contains_subquery(selection) {
                    *ctx.has_subquery = true;
                }
            }
            if let sqlparser::ast::GroupByExpr::Expressions(exprs, _) = &select.group_by {
                for expr in exprs {
                    extract_columns_from_expr(expr, ctx.group_cols);
                }
            }
            if let Some(having) = &select.having {
                extract_columns_from_expr(having, ctx.having_cols);
            }
        }
        SetExpr::SetOperation {
            left,
            right,
            ..
        } => {
            *ctx.has_union = true;
            extract_from_set_expr(left, ctx);
            extract_from_set_expr(right, ctx);
        }
        SetExpr::Query(query) => {
            extract_from_set_expr(&query.body, ctx);
        }
        SetExpr::Values(_)
        | SetExpr::Insert(_)
        | SetExpr::Update(_)
        | SetExpr::Table(_)
        | SetExpr::Delete(_)
        | SetExpr::Merge(_) => {}
    }
}
