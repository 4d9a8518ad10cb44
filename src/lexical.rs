//! SqlLexicalParser: best-effort extraction of structural and heuristic
//! facts from one read-only SQL statement.
//!
//! Table/alias/column extraction walks the `sqlparser` AST (reliable,
//! reused by [`extract`]). Pattern-shaped signals that the AST cannot
//! express cheaply - wildcard LIKE, function-wrapped WHERE columns,
//! OR-chain counts, correlated subqueries - fall back to regex over the
//! raw SQL text. Regex cannot perfectly parse nested SQL; treat these
//! fields as hints, not ground truth.

mod extract;
mod types;

use std::{collections::HashMap, sync::LazyLock};

use compact_str::CompactString;
use extract::{ExtractionContext, extract_from_set_expr};
use indexmap::IndexSet;
use regex::Regex;
use sqlparser::{
    dialect::{Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect},
    parser::Parser
};
pub use types::{ColumnVec, LexicalFacts};

use crate::error::{AppResult, query_parse_error};

/// SQL dialect for parsing.
#[derive(Debug, Clone, Copy, Default)]
#[non_exhaustive]
pub enum SqlDialect {
    #[default]
    Generic,
    MySQL,
    PostgreSQL,
    SQLite
}

impl SqlDialect {
    pub fn into_parser_dialect(self) -> Box<dyn Dialect> {
        match self {
            Self::Generic => Box::new(GenericDialect {}),
            Self::MySQL => Box::new(MySqlDialect {}),
            Self::PostgreSQL => Box::new(PostgreSqlDialect {}),
            Self::SQLite => Box::new(SQLiteDialect {})
        }
    }
}

static LIKE_LEADING_WILDCARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blike\s+'%").expect("valid regex"));
static FUNCTION_WRAPPED_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[a-z_][a-z0-9_]*\s*\(\s*[a-z_][a-z0-9_.]*\s*\)\s*(=|<|>|<=|>=|<>|!=|in\b|like\b)")
        .expect("valid regex")
});
static OR_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bor\b").expect("valid regex"));
static EXISTS_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bexists\s*\(").expect("valid regex"));
static WHERE_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\bwhere\b(.*?)(\bgroup\s+by\b|\border\s+by\b|\bhaving\b|\blimit\b|$)")
        .expect("valid regex")
});
static PARENTHESIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^()]*\)").expect("valid regex"));

/// Parse one read-only SQL statement and extract its [`LexicalFacts`].
///
/// Only the first statement in `sql` is analyzed; the pipeline diagnoses
/// one statement at a time (see SafetyGuard).
pub fn extract(sql: &str, dialect: SqlDialect) -> AppResult<LexicalFacts> {
    let parser_dialect = dialect.into_parser_dialect();
    let statements = Parser::parse_sql(parser_dialect.as_ref(), sql)
        .map_err(|e| query_parse_error(e.to_string()))?;
    let statement = statements
        .into_iter()
        .next()
        .ok_or_else(|| query_parse_error("no statement found"))?;

    let mut facts = LexicalFacts::new(sql.to_string());
    populate_from_statement(&mut facts, statement);
    populate_heuristics(&mut facts, sql);
    Ok(facts)
}

fn populate_from_statement(facts: &mut LexicalFacts, statement: sqlparser::ast::Statement) {
    use sqlparser::ast::Statement;

    let Statement::Query(query) = statement else {
        return;
    };

    if let Some(limit_clause) = &query.limit_clause {
        apply_limit_clause(facts, limit_clause);
    }
    facts.has_limit = facts.limit.is_some();

    if let Some(order_by) = &query.order_by
        && let sqlparser::ast::OrderByKind::Expressions(exprs) = &order_by.kind
    {
        let mut cols = IndexSet::new();
        for expr in exprs {
            extract::extract_columns_from_expr(&expr.expr, &mut cols);
        }
        facts.order_cols = cols.into_iter().collect();
    }

    let mut tables = IndexSet::new();
    let mut alias_map: HashMap<CompactString, Option<CompactString>> = HashMap::new();
    let mut where_cols = IndexSet::new();
    let mut join_cols = IndexSet::new();
    let mut select_cols = IndexSet::new();
    let mut virtual_aliases = IndexSet::new();
    let mut group_cols = IndexSet::new();
    let mut having_cols = IndexSet::new();
    let mut ctx = ExtractionContext {
        tables: &mut tables,
        alias_map: &mut alias_map,
        where_cols: &mut where_cols,
        join_cols: &mut join_cols,
        select_cols: &mut select_cols,
        virtual_aliases: &mut virtual_aliases,
        group_cols: &mut group_cols,
        having_cols: &mut having_cols,
        has_union: &mut facts.has_union,
        has_distinct: &mut facts.has_distinct,
        has_subquery: &mut facts.has_subquery
    };
    extract_from_set_expr(&query.body, &mut ctx);

    facts.tables = tables.into_iter().collect();
    facts.alias_map = alias_map;
    facts.where_cols = where_cols.into_iter().collect();
    facts.join_cols = join_cols.into_iter().collect();
    facts.select_cols = select_cols.into_iter().collect();
    facts.virtual_aliases = virtual_aliases.into_iter().collect();
    facts.group_cols = group_cols.into_iter().collect();
    facts.having_cols = having_cols.into_iter().collect();
    facts.has_select_star = has_wildcard_projection(&query.body);
    facts.has_aggregation_without_group_by =
        facts.group_cols.is_empty() && has_aggregate_projection(&query.body);
    facts.is_intentional_full_scan = facts.where_cols.is_empty()
        && facts.join_cols.is_empty()
        && facts.group_cols.is_empty()
        && facts.having_cols.is_empty()
        && facts.order_cols.is_empty()
        && !facts.has_limit;
}

fn apply_limit_clause(facts: &mut LexicalFacts, limit_clause: &sqlparser::ast::LimitClause) {
    use sqlparser::ast::{Expr, LimitClause, Value};

    let parse_number = |expr: &Expr| -> Option<u64> {
        if let Expr::Value(val) = expr
            && let Value::Number(n, _) = &val.value
        {
            n.parse().ok()
        } else {
            None
        }
    };

    match limit_clause {
        LimitClause::LimitOffset {
            limit,
            offset,
            ..
        } => {
            facts.limit = limit.as_ref().and_then(parse_number);
            facts.offset = offset.as_ref().and_then(|o| parse_number(&o.value));
        }
        LimitClause::OffsetCommaLimit {
            offset,
            limit,
            ..
        } => {
            facts.limit = parse_number(limit);
            facts.offset = parse_number(offset);
        }
    }
}

fn has_wildcard_projection(set_expr: &sqlparser::ast::SetExpr) -> bool {
    use sqlparser::ast::{SelectItem, SetExpr};
    match set_expr {
        SetExpr::Select(select) => select
            .projection
            .iter()
            .any(|item| matches!(item, SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(..))),
        SetExpr::SetOperation {
            left, right, ..
        } => has_wildcard_projection(left) || has_wildcard_projection(right),
        SetExpr::Query(query) => has_wildcard_projection(&query.body),
        _ => false
    }
}

fn has_aggregate_projection(set_expr: &sqlparser::ast::SetExpr) -> bool {
    use sqlparser::ast::{SelectItem, SetExpr};
    const AGGREGATES: &[&str] = &["count", "sum", "avg", "min", "max"];
    let is_aggregate_call = |expr: &sqlparser::ast::Expr| {
        if let sqlparser::ast::Expr::Function(func) = expr {
            let name = func.name.to_string().to_lowercase();
            AGGREGATES.iter().any(|a| name == *a)
        } else {
            false
        }
    };
    match set_expr {
        SetExpr::Select(select) => select.projection.iter().any(|item| match item {
            SelectItem::UnnamedExpr(e) | SelectItem::ExprWithAlias {
                expr: e, ..
            } => is_aggregate_call(e),
            _ => false
        }),
        SetExpr::SetOperation {
            left, right, ..
        } => has_aggregate_projection(left) || has_aggregate_projection(right),
        SetExpr::Query(query) => has_aggregate_projection(&query.body),
        _ => false
    }
}

/// Regex-shaped signals the AST walk does not attempt to express.
fn populate_heuristics(facts: &mut LexicalFacts, sql: &str) {
    facts.has_leading_wildcard_like = LIKE_LEADING_WILDCARD.is_match(sql);
    facts.has_exists = EXISTS_KEYWORD.is_match(sql);

    let where_clause = WHERE_CLAUSE
        .captures(sql)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    facts.has_function_on_where_column = FUNCTION_WRAPPED_COLUMN.is_match(&where_clause);

    let stripped = strip_parenthesized(&where_clause);
    facts.or_chain_count = OR_KEYWORD.find_iter(&stripped).count();

    facts.has_correlated_subquery = facts.has_subquery
        && facts
            .tables
            .iter()
            .any(|t| where_clause.matches(t.as_str()).count() > 0 && PARENTHESIZED.is_match(&where_clause));
}

/// Remove one level of parenthesized groups (subqueries) before counting
/// top-level OR chains, so `WHERE a=1 OR b IN (SELECT x FROM t WHERE y OR z)`
/// counts one OR, not two.
fn strip_parenthesized(s: &str) -> String {
    let mut prev = s.to_string();
    loop {
        let next = PARENTHESIZED.replace_all(&prev, " ").into_owned();
        if next == prev {
            return next;
        }
        prev = next;
    }
}
