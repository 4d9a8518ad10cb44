//! HypotheticalIndexAnalyzer: CREATE -> EXPLAIN -> compare -> DROP.
//!
//! Gated to `{local, testing}` by default ([`HypotheticalIndexConfig`])
//! since it mutates the target schema, even if only transiently. Each
//! simulation always drops the index it created, on every exit path
//! (success, no measurable improvement, or error) - async `Drop` cannot
//! `.await`, so [`DropGuard`] only records the obligation for a log
//! warning if a bug ever lets a create go un-dropped; the actual `DROP`
//! is driven explicitly by [`simulate_one`].

use std::time::Duration;

use serde::Serialize;
use tokio::time::timeout;

use super::index_synthesis::IndexProposal;
use crate::{
    config::HypotheticalIndexConfig,
    driver::{Driver, ExplainRow},
    error::{AppResult, driver_error},
    plan::AccessType,
    report::{Finding, Severity}
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Improvement {
    None,
    Marginal,
    Moderate,
    Significant
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub ddl:                    String,
    pub table:                  String,
    pub index_name:             String,
    pub baseline_access_type:   Option<AccessType>,
    pub baseline_rows:          u64,
    pub simulated_access_type:  Option<AccessType>,
    pub simulated_rows:         u64,
    pub improvement:            Improvement,
    /// `true` only when the access-type severity strictly decreased -
    /// a row-count-only improvement is never considered validated.
    pub validated:              bool
}

#[derive(Debug, Clone, Serialize)]
pub struct HypotheticalIndexReport {
    pub simulations:         Vec<SimulationResult>,
    pub best_recommendation: Option<String>,
    pub findings:            Vec<Finding>
}

/// `true` when this feature is enabled and `environment` is in the
/// configured allow-list (case-insensitive).
pub fn is_enabled(config: &HypotheticalIndexConfig, environment: &str) -> bool {
    config.enabled && config.allowed_environments.iter().any(|e| e.eq_ignore_ascii_case(environment))
}

/// Records whether the synthesized index still needs dropping. `Drop`
/// cannot `.await`; this only emits a log warning on an un-dropped leak.
/// The real `DROP` always runs explicitly in [`simulate_one`], on both
/// the success and error paths, before the guard is disarmed.
struct DropGuard {
    armed: bool,
    ddl:   String
}

impl DropGuard {
    fn new(drop_ddl: String) -> Self {
        Self {
            armed: true,
            ddl: drop_ddl
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        if self.armed {
            tracing::error!(ddl = %self.ddl, "hypothetical index was not dropped before its guard went out of scope");
        }
    }
}

/// Parse `CREATE INDEX idx_name ON table (...)`, tolerating backtick
/// quoting, into `(index_name, table_name)`.
fn parse_ddl(ddl: &str) -> Option<(String, String)> {
    let lower = ddl.to_lowercase();
    let on_pos = lower.find(" on ")?;
    let head = ddl[..on_pos].trim();
    let index_name = head
        .strip_prefix("CREATE INDEX")
        .or_else(|| head.strip_prefix("create index"))
        .unwrap_or(head)
        .trim()
        .trim_matches('`')
        .to_string();
    let after = ddl[on_pos + 4..].trim();
    let table_name = after.split(['(', ' ']).next()?.trim_matches('`').to_string();
    if index_name.is_empty() || table_name.is_empty() {
        return None;
    }
    Some((index_name, table_name))
}

fn field<'a>(row: &'a ExplainRow, key: &str) -> Option<&'a str> {
    row.iter().find(|(k, _)| k.as_str().eq_ignore_ascii_case(key)).map(|(_, v)| v.as_str())
}

fn extract_access_and_rows(driver: &dyn Driver, rows: &[ExplainRow]) -> (Option<AccessType>, u64) {
    let rows_pattern = regex::Regex::new(r"rows=(\d+)").expect("valid regex");

    let mut best_access: Option<AccessType> = None;
    let mut total_rows: u64 = 0;

    for row in rows {
        let text = field(row, "type").or_else(|| field(row, "QUERY PLAN")).or_else(|| field(row, "detail"));
        if let Some(text) = text {
            if let Some(access) = driver.normalize_access_type(text) {
                best_access = Some(best_access.map_or(access, |existing| existing.max(access)));
            }
            if let Some(caps) = rows_pattern.captures(text)
                && let Ok(n) = caps[1].parse::<u64>()
            {
                total_rows += n;
            }
        }
        if let Some(rows_value) = field(row, "rows")
            && let Ok(n) = rows_value.parse::<u64>()
        {
            total_rows += n;
        }
    }

    (best_access, total_rows)
}

fn classify_improvement(
    baseline_access: Option<AccessType>,
    baseline_rows: u64,
    simulated_access: Option<AccessType>,
    simulated_rows: u64
) -> (Improvement, bool) {
    let access_improved = matches!((baseline_access, simulated_access), (Some(b), Some(s)) if s < b);
    if access_improved {
        return (Improvement::Significant, true);
    }
    if baseline_rows == 0 {
        return (Improvement::None, false);
    }
    let reduction = 1.0 - (simulated_rows as f64 / baseline_rows as f64);
    let improvement = if reduction > 0.5 {
        Improvement::Moderate
    } else if reduction > 0.1 {
        Improvement::Marginal
    } else {
        Improvement::None
    };
    (improvement, false)
}

async fn simulate_one(
    driver: &dyn Driver,
    sql: &str,
    proposal: &IndexProposal,
    timeout_secs: u64
) -> AppResult<SimulationResult> {
    let (index_name, table) =
        parse_ddl(&proposal.ddl).unwrap_or_else(|| (format!("idx_{}", proposal.table), proposal.table.clone()));
    let drop_ddl = format!("DROP INDEX {index_name} ON {table}");
    let dur = Duration::from_secs(timeout_secs);

    let baseline_rows = driver.run_explain(sql).await?;
    let (baseline_access_type, baseline_rows_count) = extract_access_and_rows(driver, &baseline_rows);

    let create_result = timeout(dur, driver.run_ddl(&proposal.ddl)).await;
    let mut guard = DropGuard::new(drop_ddl.clone());

    match create_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            let _ = driver.run_ddl(&drop_ddl).await;
            guard.disarm();
            return Err(e);
        }
        Err(_) => {
            let _ = driver.run_ddl(&drop_ddl).await;
            guard.disarm();
            return Err(driver_error("hypothetical index simulation timed out creating the index"));
        }
    }

    let explain_result = timeout(dur, driver.run_explain(sql)).await;

    // The index is always dropped here, regardless of what the re-EXPLAIN
    // returned - this is the one unconditional exit path every branch
    // above funnels into.
    let drop_outcome = driver.run_ddl(&drop_ddl).await;
    guard.disarm();
    drop_outcome?;

    let simulated_rows = match explain_result {
        Ok(inner) => inner?,
        Err(_) => return Err(driver_error("hypothetical index simulation timed out re-running EXPLAIN"))
    };
    let (simulated_access_type, simulated_rows_count) = extract_access_and_rows(driver, &simulated_rows);

    let (improvement, validated) = classify_improvement(
        baseline_access_type,
        baseline_rows_count,
        simulated_access_type,
        simulated_rows_count
    );

    Ok(SimulationResult {
        ddl: proposal.ddl.clone(),
        table,
        index_name,
        baseline_access_type,
        baseline_rows: baseline_rows_count,
        simulated_access_type,
        simulated_rows: simulated_rows_count,
        improvement,
        validated
    })
}

fn improvement_rank(i: Improvement) -> u8 {
    match i {
        Improvement::None => 0,
        Improvement::Marginal => 1,
        Improvement::Moderate => 2,
        Improvement::Significant => 3
    }
}

pub async fn analyze(
    driver: &dyn Driver,
    sql: &str,
    proposals: &[IndexProposal],
    config: &HypotheticalIndexConfig,
    environment: &str
) -> AppResult<Option<HypotheticalIndexReport>> {
    if !is_enabled(config, environment) || proposals.is_empty() {
        return Ok(None);
    }

    let mut simulations = Vec::new();
    for proposal in proposals.iter().take(config.max_simulations) {
        match simulate_one(driver, sql, proposal, config.timeout_seconds).await {
            Ok(result) => simulations.push(result),
            Err(error) => {
                tracing::warn!(%error, ddl = %proposal.ddl, "hypothetical index simulation failed");
            }
        }
    }

    let mut findings = Vec::new();
    for sim in &simulations {
        let finding = match sim.improvement {
            Improvement::Significant => Some(
                Finding::new(
                    Severity::Warning,
                    "hypothetical_index",
                    "Hypothetical index yields significant improvement",
                    format!(
                        "`{}` would change the access path from {:?} to {:?}",
                        sim.ddl, sim.baseline_access_type, sim.simulated_access_type
                    )
                )
                .with_recommendation(sim.ddl.clone())
            ),
            Improvement::Moderate => Some(
                Finding::new(
                    Severity::Optimization,
                    "hypothetical_index",
                    "Hypothetical index yields moderate improvement",
                    format!(
                        "`{}` would reduce rows examined from {} to {}",
                        sim.ddl, sim.baseline_rows, sim.simulated_rows
                    )
                )
                .with_recommendation(sim.ddl.clone())
            ),
            Improvement::Marginal => Some(Finding::new(
                Severity::Info,
                "hypothetical_index",
                "Hypothetical index yields marginal improvement",
                format!(
                    "`{}` would reduce rows examined from {} to {}",
                    sim.ddl, sim.baseline_rows, sim.simulated_rows
                )
            )),
            Improvement::None => None
        };
        if let Some(finding) = finding {
            findings.push(finding);
        }
    }

    let best_recommendation = simulations
        .iter()
        .filter(|s| s.validated)
        .max_by_key(|s| improvement_rank(s.improvement))
        .map(|s| s.ddl.clone());

    Ok(Some(HypotheticalIndexReport {
        simulations,
        best_recommendation,
        findings
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use compact_str::CompactString;

    use super::*;
    use crate::driver::{Capabilities, ColumnStats, SchemaRecord};

    #[derive(Default)]
    struct FakeDriver {
        ddl_log: Arc<Mutex<Vec<String>>>,
        explain_calls: Arc<Mutex<u32>>
    }

    #[async_trait]
    impl Driver for FakeDriver {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn get_version(&self) -> AppResult<CompactString> {
            Ok(CompactString::from("1.0.0"))
        }

        async fn capabilities(&self) -> AppResult<Capabilities> {
            Ok(Capabilities::default())
        }

        async fn supports_analyze(&self) -> AppResult<bool> {
            Ok(true)
        }

        async fn run_explain(&self, _sql: &str) -> AppResult<Vec<ExplainRow>> {
            let mut calls = self.explain_calls.lock().unwrap();
            *calls += 1;
            let mut row = ExplainRow::new();
            if *calls == 1 {
                row.insert(CompactString::from("type"), "ALL".to_string());
                row.insert(CompactString::from("rows"), "1000".to_string());
            } else {
                row.insert(CompactString::from("type"), "ref".to_string());
                row.insert(CompactString::from("rows"), "10".to_string());
            }
            Ok(vec![row])
        }

        async fn run_explain_analyze(&self, _sql: &str) -> AppResult<String> {
            Ok(String::new())
        }

        fn normalize_access_type(&self, raw: &str) -> Option<AccessType> {
            match raw {
                "ALL" => Some(AccessType::TableScan),
                "ref" => Some(AccessType::IndexLookup),
                _ => None
            }
        }

        fn normalize_join_type(&self, _raw: &str) -> CompactString {
            CompactString::from("nested_loop")
        }

        async fn run_analyze_table(&self, _table: &str) -> AppResult<()> {
            Ok(())
        }

        async fn get_column_stats(&self, _table: &str, _column: &str) -> AppResult<ColumnStats> {
            Ok(ColumnStats::default())
        }

        async fn table_exists(&self, _name: &str) -> AppResult<Option<SchemaRecord>> {
            Ok(None)
        }

        async fn list_tables(&self) -> AppResult<Vec<SchemaRecord>> {
            Ok(Vec::new())
        }

        async fn column_exists(&self, _table: &str, _column: &str) -> AppResult<Option<SchemaRecord>> {
            Ok(None)
        }

        async fn list_columns(&self, _table: &str) -> AppResult<Vec<SchemaRecord>> {
            Ok(Vec::new())
        }

        async fn run_ddl(&self, ddl: &str) -> AppResult<()> {
            self.ddl_log.lock().unwrap().push(ddl.to_string());
            Ok(())
        }
    }

    fn proposal() -> IndexProposal {
        IndexProposal {
            table: "orders".to_string(),
            columns: vec!["status".to_string()],
            ddl: "CREATE INDEX idx_orders_status ON orders (status)".to_string(),
            rationale: String::new(),
            overlaps_with: None
        }
    }

    #[test]
    fn parses_create_ddl() {
        let (index, table) = parse_ddl("CREATE INDEX idx_orders_status ON orders (status)").unwrap();
        assert_eq!(index, "idx_orders_status");
        assert_eq!(table, "orders");
    }

    #[tokio::test]
    async fn disabled_outside_allowed_environments() {
        let config = HypotheticalIndexConfig {
            enabled: true,
            ..HypotheticalIndexConfig::default()
        };
        let driver = FakeDriver::default();
        let report = analyze(&driver, "SELECT 1", &[proposal()], &config, "production").await.unwrap();
        assert!(report.is_none());
    }

    #[tokio::test]
    async fn always_drops_the_created_index() {
        let config = HypotheticalIndexConfig {
            enabled: true,
            ..HypotheticalIndexConfig::default()
        };
        let driver = FakeDriver::default();
        let report = analyze(&driver, "SELECT 1", &[proposal()], &config, "local").await.unwrap().unwrap();
        assert_eq!(report.simulations.len(), 1);
        assert!(report.simulations[0].validated);
        let ddl_log = driver.ddl_log.lock().unwrap();
        assert!(ddl_log.iter().any(|d| d.starts_with("DROP INDEX")));
    }
}
