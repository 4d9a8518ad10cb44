//! # SQL Query Diagnostic Engine - reference CLI
//!
//! `sql-diag` is the minimal reference consumer of the [`Engine`] contract:
//! a host web framework, interactive TUI, or CI pipeline would wrap the
//! same contract rather than reimplement it.
//!
//! # Subcommands
//!
//! - `diagnose` - run the full pipeline (validation, `EXPLAIN ANALYZE`,
//!   scoring, rules, every deep analyzer) on one statement.
//! - `explain-raw` - run only `EXPLAIN ANALYZE` and print the raw plan
//!   text, skipping scoring/rules/analyzers.
//! - `baseline history` - inspect a [`sql_diag::baseline::BaselineStore`]
//!   directory without running a query, for CI triage.
//!
//! # Exit codes
//!
//! `0` on a passed report, `1` on a report that failed CI gating
//! (`ci.fail_on_warning` / `ci.fail_on_grade_below`), `2` when the
//! pipeline rejected the statement before a report could be produced.

use std::{
    fs::read_to_string,
    io::{self, Read},
    process,
    sync::Arc,
    time::Duration
};

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use sql_diag::{
    baseline::BaselineStore,
    cli::{BaselineCommands, Cli, Commands, DriverKind, Format},
    config::Config,
    driver::{Driver, mysql::MySqlDriver, postgres::PostgresDriver, sqlite::SqliteDriver},
    engine::Engine,
    error::{AppResult, config_error, driver_error, file_read_error},
    explain,
    lexical::SqlDialect,
    output::{OutputFormat, OutputOptions, exit_code_for, format_outcome}
};
use sqlx::{MySqlPool, PgPool, SqlitePool};

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

async fn run() -> AppResult<i32> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Diagnose {
            dsn,
            driver,
            sql,
            baseline_dir,
            environment,
            format,
            no_color
        } => run_diagnose(dsn, driver, sql, baseline_dir, environment, format, no_color, config).await,
        Commands::ExplainRaw {
            dsn,
            driver,
            sql
        } => run_explain_raw(dsn, driver, sql, config).await,
        Commands::Baseline {
            action: BaselineCommands::History {
                dir,
                hash,
                limit,
                format
            }
        } => run_baseline_history(dir, hash, limit, format, config)
    }
}

async fn run_diagnose(
    dsn: String,
    driver_kind: Option<DriverKind>,
    sql_path: std::path::PathBuf,
    baseline_dir: Option<std::path::PathBuf>,
    environment: String,
    format: Format,
    no_color: bool,
    mut config: Config
) -> AppResult<i32> {
    if let Some(dir) = baseline_dir {
        config.regression.storage_path = dir;
    }

    let sql = read_sql(&sql_path)?;
    let kind = resolve_driver_kind(driver_kind, &config, &dsn)?;
    let driver = connect_driver(kind, &dsn).await?;
    let dialect = dialect_for(kind);

    let engine = Engine::new(driver, config, dialect, environment)?;

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message("Running EXPLAIN ANALYZE and diagnostics...");
    pb.enable_steady_tick(Duration::from_millis(100));
    let outcome = engine.diagnose(&sql).await;
    pb.finish_and_clear();
    let outcome = outcome?;

    let opts = OutputOptions {
        format: map_format(format),
        colored: !no_color,
        verbose: false
    };
    println!("{}", format_outcome(&outcome, &opts));
    Ok(exit_code_for(&outcome))
}

async fn run_explain_raw(dsn: String, driver_kind: Option<DriverKind>, sql_path: std::path::PathBuf, config: Config) -> AppResult<i32> {
    let sql = read_sql(&sql_path)?;
    let kind = resolve_driver_kind(driver_kind, &config, &dsn)?;
    let driver = connect_driver(kind, &dsn).await?;

    match explain::execute(&sql, driver.as_ref()).await? {
        explain::ExplainResult::Success {
            plan_text, ..
        } => {
            println!("{plan_text}");
            Ok(0)
        }
        explain::ExplainResult::Failure(failure) => {
            eprintln!("{}: {}", failure.status, failure.detailed_error);
            Ok(2)
        }
    }
}

fn run_baseline_history(
    dir: Option<std::path::PathBuf>,
    hash: String,
    limit: usize,
    format: Format,
    config: Config
) -> AppResult<i32> {
    let dir = dir.unwrap_or(config.regression.storage_path);
    let store = BaselineStore::new(dir, config.regression.max_history)?;
    let history = store.history(&hash, limit)?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&history).unwrap_or_default()),
        Format::Yaml => println!("{}", serde_yaml::to_string(&history).unwrap_or_default()),
        Format::Text => {
            if history.is_empty() {
                println!("No baseline history for hash '{hash}'.");
            } else {
                for entry in &history {
                    println!("{} -> {:?}", entry.timestamp, entry.snapshot);
                }
            }
        }
    }
    Ok(0)
}

fn read_sql(path: &std::path::Path) -> AppResult<String> {
    if path.to_str() == Some("-") {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).map_err(|e| file_read_error("stdin", e))?;
        Ok(buffer)
    } else {
        read_to_string(path).map_err(|e| file_read_error(&path.display().to_string(), e))
    }
}

fn resolve_driver_kind(explicit: Option<DriverKind>, config: &Config, dsn: &str) -> AppResult<DriverKind> {
    if let Some(kind) = explicit {
        return Ok(kind);
    }
    if let Some(driver) = &config.driver {
        return match driver.as_str() {
            "mysql" => Ok(DriverKind::Mysql),
            "pgsql" | "postgres" | "postgresql" => Ok(DriverKind::Postgresql),
            "sqlite" => Ok(DriverKind::Sqlite),
            other => Err(config_error(format!("unknown configured driver '{other}'")))
        };
    }
    if dsn.starts_with("mysql://") {
        Ok(DriverKind::Mysql)
    } else if dsn.starts_with("postgres://") || dsn.starts_with("postgresql://") {
        Ok(DriverKind::Postgresql)
    } else if dsn.starts_with("sqlite://") || dsn.ends_with(".db") || dsn.ends_with(".sqlite") {
        Ok(DriverKind::Sqlite)
    } else {
        Err(config_error("--driver was not given and the DSN scheme did not disambiguate one; pass --driver explicitly"))
    }
}

async fn connect_driver(kind: DriverKind, dsn: &str) -> AppResult<Arc<dyn Driver>> {
    match kind {
        DriverKind::Mysql => {
            let pool = MySqlPool::connect(dsn).await.map_err(|e| driver_error(format!("failed to connect: {e}")))?;
            Ok(Arc::new(MySqlDriver::new(pool)))
        }
        DriverKind::Postgresql => {
            let pool = PgPool::connect(dsn).await.map_err(|e| driver_error(format!("failed to connect: {e}")))?;
            Ok(Arc::new(PostgresDriver::new(pool)))
        }
        DriverKind::Sqlite => {
            let pool = SqlitePool::connect(dsn).await.map_err(|e| driver_error(format!("failed to connect: {e}")))?;
            Ok(Arc::new(SqliteDriver::new(pool)))
        }
    }
}

fn dialect_for(kind: DriverKind) -> SqlDialect {
    match kind {
        DriverKind::Mysql => SqlDialect::MySQL,
        DriverKind::Postgresql => SqlDialect::PostgreSQL,
        DriverKind::Sqlite => SqlDialect::SQLite
    }
}

fn map_format(format: Format) -> OutputFormat {
    match format {
        Format::Text => OutputFormat::Text,
        Format::Json => OutputFormat::Json,
        Format::Yaml => OutputFormat::Yaml
    }
}
