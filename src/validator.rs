//! Validator Pipeline: an ordered sequence of stages that each abort the
//! whole diagnosis on the first failure, modeled as an early-returning
//! `Option<ValidationFailureReport>` chain rather than a thrown exception.
//!
//! Order: table validation -> column validation -> join validation ->
//! syntax validation. Table/column validation runs against the schema via
//! [`crate::schema::SchemaIntrospector`]; join/syntax validation lean on
//! regex over the raw text the way [`crate::lexical`] already does for
//! its own heuristic-only signals.

use std::sync::LazyLock;

use regex::Regex;

use crate::{
    driver::Driver,
    error::AppResult,
    lexical::LexicalFacts,
    report::{FailureStage, ValidationFailureReport},
    schema::{SchemaIntrospector, STATIC_KEYWORD_TYPOS, suggest}
};

static QUALIFIED_COLUMN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\.[A-Za-z_][A-Za-z0-9_]*\b").expect("valid regex"));
static SQLSTATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)sqlstate[:\s]*'?([0-9A-Z]{5})'?").expect("valid regex"));
static LINE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bline[:\s]+(\d+)").expect("valid regex"));

/// Run every stage in order; returns the first failure, or `None` when the
/// statement passes all of them.
pub async fn validate(
    sql: &str,
    facts: &LexicalFacts,
    driver: &dyn Driver
) -> AppResult<Option<ValidationFailureReport>> {
    if let Some(failure) = validate_tables(facts, driver).await? {
        return Ok(Some(failure));
    }
    if let Some(failure) = validate_columns(facts, driver).await? {
        return Ok(Some(failure));
    }
    if let Some(failure) = validate_joins(sql, facts) {
        return Ok(Some(failure));
    }
    validate_syntax(sql, driver).await
}

async fn validate_tables(facts: &LexicalFacts, driver: &dyn Driver) -> AppResult<Option<ValidationFailureReport>> {
    let introspector = SchemaIntrospector::new(driver);
    for table in &facts.tables {
        if introspector.table_exists(table).await?.is_some() {
            continue;
        }
        let suggestion = introspector.suggest_table(table).await?;
        let mut report = ValidationFailureReport::new(
            FailureStage::TableValidation,
            "ERROR - Table Not Found",
            format!("Table '{table}' does not exist")
        )
        .with_missing_table(table.to_string());

        report = match &suggestion {
            Some(candidate) => report
                .with_typo_suggestion(candidate.clone())
                .with_recommendation(format!("Did you mean '{candidate}'?")),
            None => report.with_recommendation("Check the table name and the connected schema")
        };
        return Ok(Some(report));
    }
    Ok(None)
}

/// Resolve the set of real base tables a statement touches: its FROM/JOIN
/// tables plus every alias that resolves to a concrete table (derived
/// subquery aliases map to `None` and are skipped).
fn base_tables(facts: &LexicalFacts) -> Vec<String> {
    let mut tables: Vec<String> = facts.tables.iter().map(|t| t.to_string()).collect();
    for base in facts.alias_map.values().flatten() {
        let base = base.to_string();
        if !tables.iter().any(|t| t.eq_ignore_ascii_case(&base)) {
            tables.push(base);
        }
    }
    tables
}

/// Column extraction drops table qualifiers (`t.col` -> `col`), so a bare
/// column in a multi-table query cannot be pinned to one specific table.
/// This validates against the union of every involved table's columns: a
/// column is accepted if it exists on *any* of them, consistent with the
/// lexical layer being documented as best-effort rather than ground truth.
async fn validate_columns(facts: &LexicalFacts, driver: &dyn Driver) -> AppResult<Option<ValidationFailureReport>> {
    let tables = base_tables(facts);
    if tables.is_empty() {
        return Ok(None);
    }

    let introspector = SchemaIntrospector::new(driver);
    let mut known_columns: Vec<String> = Vec::new();
    for table in &tables {
        for record in introspector.list_columns(table).await? {
            if let Some(name) = record.column_name {
                known_columns.push(name);
            }
        }
    }

    for column in facts.all_referenced_columns() {
        if column == "*" || facts.virtual_aliases.iter().any(|alias| alias.eq_ignore_ascii_case(column)) {
            continue;
        }
        if known_columns.iter().any(|known| known.eq_ignore_ascii_case(column)) {
            continue;
        }

        let candidates: Vec<&str> = known_columns.iter().map(|c| c.as_str()).collect();
        let suggestion = suggest(column, &candidates);
        let mut report = ValidationFailureReport::new(
            FailureStage::ColumnValidation,
            "ERROR - Column Not Found",
            format!("Column '{column}' does not exist in the referenced tables")
        )
        .with_missing_column(column.to_string());

        report = match &suggestion {
            Some(candidate) => report
                .with_typo_suggestion(candidate.clone())
                .with_recommendation(format!("Did you mean '{candidate}'?")),
            None => report.with_recommendation("Check the column name")
        };
        return Ok(Some(report));
    }
    Ok(None)
}

/// Every table-qualified column reference (`alias.col`) must use a known
/// alias or table name. A bare regex scan of every `ident.ident` reference
/// approximates "every JOIN-ON column references a known table or alias"
/// without needing a second AST pass over ON clauses specifically.
fn validate_joins(sql: &str, facts: &LexicalFacts) -> Option<ValidationFailureReport> {
    let known: std::collections::HashSet<String> = facts
        .tables
        .iter()
        .map(|t| t.to_lowercase())
        .chain(facts.alias_map.keys().map(|a| a.to_lowercase()))
        .collect();

    for capture in QUALIFIED_COLUMN.captures_iter(sql) {
        let qualifier = capture[1].to_lowercase();
        if known.contains(&qualifier) {
            continue;
        }
        return Some(
            ValidationFailureReport::new(
                FailureStage::JoinValidation,
                "ERROR - Unknown Table Reference",
                format!("'{}' does not match any table or alias referenced by this query", &capture[1])
            )
            .with_recommendation("Check the table alias used in the JOIN/ON clause")
        );
    }
    None
}

async fn validate_syntax(sql: &str, driver: &dyn Driver) -> AppResult<Option<ValidationFailureReport>> {
    if let Err(e) = driver.run_explain(sql).await {
        let message = e.to_string();
        let mut report =
            ValidationFailureReport::new(FailureStage::SyntaxValidation, "ERROR - Invalid Syntax", message.clone());

        if let Some(sqlstate) = SQLSTATE.captures(&message).and_then(|c| c.get(1)) {
            report = report.with_sqlstate(sqlstate.as_str().to_string());
        }
        if let Some(line) = LINE_NUMBER
            .captures(&message)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        {
            report = report.with_line_number(line);
        }

        let upper = message.to_uppercase();
        for (typo, correct) in STATIC_KEYWORD_TYPOS {
            if upper.contains(typo) {
                report = report
                    .with_typo_suggestion(*correct)
                    .with_recommendation(format!("Did you mean '{correct}'?"));
                break;
            }
        }
        return Ok(Some(report));
    }
    Ok(None)
}
