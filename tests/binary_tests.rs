//! Black-box tests of the `sql-diag` binary via [`assert_cmd`]. No network
//! or real database - each case is chosen to resolve deterministically
//! without one (usage errors, DSN-scheme resolution, an empty baseline
//! directory).

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_every_subcommand() {
    Command::cargo_bin("sql-diag")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("diagnose"))
        .stdout(predicate::str::contains("explain-raw"))
        .stdout(predicate::str::contains("baseline"));
}

#[test]
fn diagnose_without_a_dsn_is_a_usage_error() {
    Command::cargo_bin("sql-diag")
        .unwrap()
        .env_remove("SQL_DIAG_CONNECTION")
        .args(["diagnose", "--sql", "query.sql"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn diagnose_with_an_unrecognized_dsn_scheme_and_no_driver_flag_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let sql_path = dir.path().join("query.sql");
    std::fs::write(&sql_path, "SELECT 1").unwrap();

    Command::cargo_bin("sql-diag")
        .unwrap()
        .env_remove("SQL_DIAG_CONNECTION")
        .args(["diagnose", "--dsn", "oracle://localhost/orcl", "--sql"])
        .arg(&sql_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("pass --driver explicitly"));
}

#[test]
fn baseline_history_on_an_empty_directory_reports_no_history() {
    let dir = tempfile::tempdir().unwrap();

    Command::cargo_bin("sql-diag")
        .unwrap()
        .args(["baseline", "history", "--dir"])
        .arg(dir.path())
        .args(["--hash", "deadbeefcafebabe"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No baseline history for hash 'deadbeefcafebabe'"));
}
