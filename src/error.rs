//! Error types and constructors for the SQL query diagnostic engine.
//!
//! [`AppError`]/[`AppResult`] (via `masterror`) are reserved for
//! infrastructure failures: I/O, driver connection errors, config parse
//! errors. Expected pipeline aborts (missing table, bad syntax, unsafe
//! statement) are never modeled as an `AppError` - they become a
//! [`crate::report::ValidationFailureReport`] returned as a normal value,
//! per the Engine's `EngineOutcome` design.
//!
//! # Error Categories
//!
//! - **File errors**: IO failures reading config/baseline files
//! - **Parse errors**: SQL lexical-extraction failures
//! - **Driver errors**: connection/EXPLAIN execution failures
//! - **Config errors**: invalid configuration files or values
//! - **Baseline errors**: regression-store I/O failures

pub use masterror::{AppError, AppResult};

/// Create file read error with path context.
pub fn file_read_error(path: &str, source: std::io::Error) -> AppError {
    AppError::internal(format!("Failed to read file '{}': {}", path, source))
}

/// Create a lexical-extraction parse error with optional position info.
pub fn query_parse_error(message: impl Into<String>) -> AppError {
    let msg = message.into();
    AppError::bad_request(format_sql_error("SQL parse error", &msg))
}

/// Create a driver-level error (connection failure, EXPLAIN execution
/// failure that could not even be decoded into a structured failure).
pub fn driver_error(message: impl Into<String>) -> AppError {
    AppError::service(message.into())
}

/// Create config error
pub fn config_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(message.into())
}

/// Create a baseline-store I/O error.
pub fn baseline_error(message: impl Into<String>) -> AppError {
    AppError::internal(message.into())
}

/// Format SQL error with position highlighting
///
/// # Notes
///
/// - Attempts to extract line and column information from sqlparser errors
/// - Uses "Line: X, Column Y" pattern matching
fn format_sql_error(prefix: &str, message: &str) -> String {
    if let Some(pos) = extract_position(message) {
        format!(
            "{prefix} at line {line}, column {column}:\n  {message}",
            prefix = prefix,
            line = pos.line,
            column = pos.column,
            message = message
        )
    } else {
        format!("{}:\n  {}", prefix, message)
    }
}

struct SqlPosition {
    line:   usize,
    column: usize
}

/// Extract position from sqlparser error message
///
/// # Notes
///
/// - Looks for "Line: X, Column Y" pattern in error messages
fn extract_position(message: &str) -> Option<SqlPosition> {
    let line_marker = "Line: ";
    let col_marker = ", Column ";
    let line_start = message.find(line_marker)?;
    let line_num_start = line_start + line_marker.len();
    let rest = message.get(line_num_start..)?;
    let col_start = rest.find(col_marker)?;
    let line_str = message.get(line_num_start..line_num_start + col_start)?;
    let col_num_start = line_num_start + col_start + col_marker.len();
    let col_rest = message.get(col_num_start..)?;
    let col_end = col_rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(col_rest.len());
    let col_str = message.get(col_num_start..col_num_start + col_end)?;
    let line = line_str.parse().ok()?;
    let column = col_str.parse().ok()?;
    Some(SqlPosition {
        line,
        column
    })
}
