//! IndexSynthesizer: proposes composite-index DDL from the WHERE/JOIN
//! columns a statement actually touches, ordering columns
//! equality-before-range (ERS) so the proposed index can seek rather than
//! scan its range predicate.
//!
//! [`LexicalFacts`] only records which columns are referenced, not which
//! operator touches them, so this module classifies equality vs. range
//! with its own narrow regex scan of the raw statement text rather than
//! widening the shared lexical-extraction layer for a single consumer.

use regex::Regex;
use serde::Serialize;

use crate::{config::IndexSynthesisConfig, lexical::LexicalFacts};

#[derive(Debug, Clone, Serialize)]
pub struct IndexProposal {
    pub table:         String,
    pub columns:        Vec<String>,
    pub ddl:            String,
    pub rationale:      String,
    pub overlaps_with: Option<String>
}

fn column_operator<'a>(raw: &'a str, col: &str) -> Option<&'a str> {
    let escaped = regex::escape(col);
    let pattern = Regex::new(&format!(r"(?i)\b{escaped}\b\s*(=|<=|>=|<>|!=|<|>|in\s*\(|between\b|like\b)")).ok()?;
    pattern.captures(raw).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Split `candidates` into (equality, range) groups by scanning `raw` for
/// the operator immediately following each column name. Columns whose
/// operator cannot be determined default to equality, since an
/// unclassified predicate is more likely a plain `=` than a range.
fn classify_columns(raw: &str, candidates: &[String]) -> (Vec<String>, Vec<String>) {
    let mut equality = Vec::new();
    let mut range = Vec::new();
    for col in candidates {
        match column_operator(raw, col) {
            Some(op) => {
                let op = op.to_lowercase();
                if op == "=" || op.starts_with("in") {
                    equality.push(col.clone());
                } else {
                    range.push(col.clone());
                }
            }
            None => equality.push(col.clone())
        }
    }
    (equality, range)
}

/// Synthesize up to `config.max_recommendations` composite-index proposals
/// for the first table referenced. Multi-table column attribution is not
/// modeled ([`LexicalFacts`] does not map columns back to their owning
/// table), matching the same simplification [`crate::validator`] already
/// makes when validating columns against the union of referenced tables.
pub fn analyze(facts: &LexicalFacts, config: &IndexSynthesisConfig) -> Vec<IndexProposal> {
    let Some(table) = facts.tables.first().map(|t| t.to_string()) else {
        return Vec::new();
    };

    let mut candidates: Vec<String> =
        facts.where_cols.iter().chain(facts.join_cols.iter()).map(|c| c.to_string()).collect();
    candidates.sort();
    candidates.dedup();
    candidates.truncate(config.max_columns_per_index);

    if candidates.is_empty() {
        return Vec::new();
    }

    let (equality, range) = classify_columns(&facts.raw, &candidates);
    let mut ordered = equality;
    ordered.extend(range);
    ordered.dedup();

    if ordered.is_empty() {
        return Vec::new();
    }

    let index_name = format!("idx_{}_{}", table, ordered.join("_"));
    let ddl = format!("CREATE INDEX {index_name} ON {table} ({})", ordered.join(", "));

    vec![IndexProposal {
        table,
        columns: ordered.clone(),
        ddl,
        rationale: format!("Equality columns ordered before range columns (ERS): {}", ordered.join(", ")),
        overlaps_with: None
    }]
    .into_iter()
    .take(config.max_recommendations)
    .collect()
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::*;

    #[test]
    fn orders_equality_before_range() {
        let mut facts = LexicalFacts::new("SELECT * FROM orders WHERE status = 'open' AND created_at > 5".to_string());
        facts.tables = vec!["orders".into()];
        facts.where_cols = smallvec!["created_at".into(), "status".into()];
        let config = IndexSynthesisConfig::default();
        let proposals = analyze(&facts, &config);
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].columns, vec!["status".to_string(), "created_at".to_string()]);
    }

    #[test]
    fn no_candidate_columns_yields_no_proposal() {
        let mut facts = LexicalFacts::new("SELECT * FROM orders".to_string());
        facts.tables = vec!["orders".into()];
        let config = IndexSynthesisConfig::default();
        assert!(analyze(&facts, &config).is_empty());
    }

    #[test]
    fn respects_max_columns_per_index() {
        let mut facts = LexicalFacts::new("SELECT * FROM t WHERE a = 1 AND b = 1 AND c = 1 AND d = 1 AND e = 1".to_string());
        facts.tables = vec!["t".into()];
        facts.where_cols = smallvec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()];
        let config = IndexSynthesisConfig {
            max_recommendations: 3,
            max_columns_per_index: 2
        };
        let proposals = analyze(&facts, &config);
        assert_eq!(proposals[0].columns.len(), 2);
    }
}
