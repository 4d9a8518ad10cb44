//! End-to-end pipeline scenarios driven through [`Engine::diagnose`]
//! against an in-memory [`support::FakeDriver`] - no network, no real
//! database. Each scenario hand-verifies one pipeline outcome: a hand
//! crafted `EXPLAIN ANALYZE` plan text in, a specific grade/finding/
//! rejection out.

mod support;

use std::sync::Arc;

use compact_str::CompactString;
use sql_diag::{config::Config, engine::Engine, lexical::SqlDialect, report::{EngineOutcome, Severity}};
use support::FakeDriver;

fn config_with_baseline(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.regression.storage_path = dir.to_path_buf();
    config.regression.enabled = true;
    config
}

fn engine(driver: Arc<FakeDriver>, config: Config) -> Engine {
    Engine::new(driver, config, SqlDialect::MySQL, CompactString::from("test")).expect("engine construction")
}

#[tokio::test]
async fn full_table_scan_on_large_table_is_critical_and_fails() {
    let dir = tempfile::tempdir().unwrap();
    let driver = Arc::new(
        FakeDriver::new().with_table("orders", &["id", "customer_id", "status"]).with_plan_text(
            "-> Filter: (orders.status = 'shipped')  (cost=500000.00 rows=3) (actual time=2500.100..2500.750 rows=3 loops=1)\n    \
             -> Table scan on orders  (cost=500000.00 rows=5000000) (actual time=0.050..2499.900 rows=5000000 loops=1)"
        )
    );

    let engine = engine(driver, config_with_baseline(dir.path()));
    let outcome = engine.diagnose("SELECT * FROM orders WHERE status = 'shipped'").await.expect("diagnose succeeds");

    let EngineOutcome::Report(diagnostic) = outcome else {
        panic!("expected a report, got a rejection");
    };

    assert_eq!(diagnostic.report.grade, 'D');
    assert!(!diagnostic.report.passed);
    assert!(
        diagnostic
            .report
            .result
            .findings
            .iter()
            .any(|f| f.category == "full_table_scan" && f.severity == Severity::Critical),
        "expected a critical full_table_scan finding, got {:?}",
        diagnostic.report.result.findings
    );
}

#[tokio::test]
async fn covering_index_with_limit_scores_perfectly() {
    let dir = tempfile::tempdir().unwrap();
    let driver = Arc::new(
        FakeDriver::new().with_table("users", &["id", "email"]).with_plan_text(
            "-> Limit: 10 row(s)  (cost=50.00 rows=5000) (actual time=0.010..0.200 rows=10 loops=1)\n    \
             -> Covering index lookup on users using idx_email (email='a@example.com')  (cost=50.00 rows=5000) (actual time=0.010..0.190 rows=10 loops=1)"
        )
    );

    let engine = engine(driver, config_with_baseline(dir.path()));
    let outcome = engine.diagnose("SELECT id, email FROM users WHERE email = 'a@example.com' LIMIT 10").await.expect("diagnose succeeds");

    let EngineOutcome::Report(diagnostic) = outcome else {
        panic!("expected a report, got a rejection");
    };

    assert_eq!(diagnostic.report.grade, 'A');
    assert!(diagnostic.report.passed);
    assert!((diagnostic.report.composite_score - 100.0).abs() < 0.01, "composite was {}", diagnostic.report.composite_score);
    assert!(!diagnostic.report.result.findings.iter().any(|f| f.severity == Severity::Critical));
}

#[tokio::test]
async fn stale_statistics_are_flagged_without_failing_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let driver = Arc::new(
        FakeDriver::new().with_table("orders", &["id", "status"]).with_plan_text(
            "-> Index range scan on orders using idx_status  (cost=50.00 rows=100) (actual time=0.010..400.000 rows=50000 loops=1)"
        )
    );

    let engine = engine(driver, config_with_baseline(dir.path()));
    let outcome = engine.diagnose("SELECT * FROM orders WHERE status = 'pending'").await.expect("diagnose succeeds");

    let EngineOutcome::Report(diagnostic) = outcome else {
        panic!("expected a report, got a rejection");
    };

    assert!(diagnostic.report.passed);
    assert!(
        diagnostic.report.result.findings.iter().any(|f| f.category == "stale_stats"),
        "expected a stale_stats finding, got {:?}",
        diagnostic.report.result.findings
    );
}

#[tokio::test]
async fn missing_table_is_rejected_with_a_typo_suggestion() {
    let dir = tempfile::tempdir().unwrap();
    let driver = Arc::new(FakeDriver::new().with_table("users", &["id", "email"]));

    let engine = engine(driver, config_with_baseline(dir.path()));
    let outcome = engine.diagnose("SELECT id FROM usres WHERE id = 1").await.expect("diagnose succeeds");

    let EngineOutcome::Rejected(failure) = outcome else {
        panic!("expected a rejection, got a report");
    };

    assert_eq!(failure.missing_table.as_deref(), Some("usres"));
    assert_eq!(failure.typo_suggestion.as_deref(), Some("users"));
}

#[tokio::test]
async fn regression_below_the_noise_floor_is_suppressed() {
    let dir = tempfile::tempdir().unwrap();
    let driver = Arc::new(FakeDriver::new().with_table("orders", &["id", "customer_id"]).with_plan_text(
        "-> Index lookup on orders using PRIMARY (id=1)  (cost=1.00 rows=1) (actual time=0.010..0.010 rows=1 loops=1)"
    ));

    let engine = engine(driver.clone(), config_with_baseline(dir.path()));
    let sql = "SELECT * FROM orders WHERE id = 1";

    driver.set_plan_text(
        "-> Index lookup on orders using PRIMARY (id=1)  (cost=1.00 rows=1) (actual time=0.003..0.003 rows=1 loops=1)"
    );
    let first = engine.diagnose(sql).await.expect("first diagnose succeeds");
    assert!(matches!(first, EngineOutcome::Report(_)), "expected a report on the first run");

    driver.set_plan_text(
        "-> Index lookup on orders using PRIMARY (id=1)  (cost=1.00 rows=1) (actual time=0.004..0.004 rows=1 loops=1)"
    );
    let second = engine.diagnose(sql).await.expect("second diagnose succeeds");
    let EngineOutcome::Report(second) = second else {
        panic!("expected a report on the second run");
    };

    let regression_findings: Vec<_> = second
        .analyzers
        .regression
        .as_ref()
        .map(|r| r.findings.clone())
        .unwrap_or_default();
    assert!(
        regression_findings.is_empty(),
        "expected no regression findings below the noise floor, got {regression_findings:?}"
    );
}
