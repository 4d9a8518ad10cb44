//! SafetyGuard: rejects anything that is not a read-only statement.
//!
//! `validate` returns `Result<(), UnsafeQuery>` so the Engine can turn a
//! rejection straight into a [`crate::report::ValidationFailureReport`]
//! without treating it as an `AppError`.

use std::sync::LazyLock;

use regex::Regex;

const ALLOWED_STARTERS: &[&str] = &["SELECT", "EXPLAIN", "WITH", "SHOW", "DESC", "DESCRIBE"];
const DESTRUCTIVE_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "TRUNCATE", "CREATE", "RENAME", "REPLACE",
    "GRANT", "REVOKE", "LOCK", "UNLOCK", "CALL", "LOAD"
];

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("valid regex"));

/// The statement is not read-only and must not reach EXPLAIN execution.
#[derive(Debug, Clone)]
pub struct UnsafeQuery {
    pub reason: String
}

impl std::fmt::Display for UnsafeQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl std::error::Error for UnsafeQuery {}

/// Validate that `sanitized_sql` is safe to EXPLAIN. Expects sanitized
/// input (see [`crate::sanitizer::sanitize`]); the first token is matched
/// case-insensitively against the allowed-starter set.
pub fn validate(sanitized_sql: &str) -> Result<(), UnsafeQuery> {
    let upper = sanitized_sql.to_uppercase();
    let starter = first_word(&upper);

    let Some(starter) = starter else {
        return Err(UnsafeQuery {
            reason: "empty statement".to_string()
        });
    };

    if !ALLOWED_STARTERS.contains(&starter.as_str()) {
        return Err(UnsafeQuery {
            reason: format!("statement must start with one of {ALLOWED_STARTERS:?}, found '{starter}'")
        });
    }

    // SHOW/EXPLAIN/DESC skip destructive scanning: `SHOW CREATE TABLE`
    // legitimately contains the word CREATE.
    if matches!(starter.as_str(), "SELECT" | "WITH") {
        for word in WORD.find_iter(&upper) {
            if DESTRUCTIVE_KEYWORDS.contains(&word.as_str()) {
                return Err(UnsafeQuery {
                    reason: format!("destructive keyword '{}' is not allowed in a read-only statement", word.as_str())
                });
            }
        }
    }

    Ok(())
}

/// `true` iff the statement starts with SELECT or WITH.
pub fn is_select(sanitized_sql: &str) -> bool {
    first_word(&sanitized_sql.to_uppercase()).is_some_and(|w| w == "SELECT" || w == "WITH")
}

/// Non-throwing variant of [`validate`].
pub fn is_safe(sanitized_sql: &str) -> bool {
    validate(sanitized_sql).is_ok()
}

/// `true` for a SELECT that takes a row lock (`FOR UPDATE`/`FOR SHARE`/
/// `LOCK IN SHARE MODE`), used by the concurrency analyzer to distinguish
/// a plain read from one the database will actually lock rows for.
pub fn is_locking_read(sanitized_sql: &str) -> bool {
    let upper = sanitized_sql.to_uppercase();
    upper.contains("FOR UPDATE") || upper.contains("FOR SHARE") || upper.contains("LOCK IN SHARE MODE")
}

fn first_word(upper: &str) -> Option<String> {
    WORD.find(upper).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_select() {
        assert!(validate("SELECT * FROM users").is_ok());
    }

    #[test]
    fn accepts_with_cte() {
        assert!(validate("WITH x AS (SELECT 1) SELECT * FROM x").is_ok());
    }

    #[test]
    fn rejects_insert() {
        assert!(validate("INSERT INTO users VALUES (1)").is_err());
    }

    #[test]
    fn rejects_destructive_keyword_inside_select() {
        let err = validate("SELECT * FROM users WHERE id = (DELETE FROM logs)").unwrap_err();
        assert!(err.reason.contains("DELETE"));
    }

    #[test]
    fn show_create_table_is_benign() {
        assert!(validate("SHOW CREATE TABLE users").is_ok());
    }

    #[test]
    fn is_select_true_for_select_and_with() {
        assert!(is_select("SELECT 1"));
        assert!(is_select("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(!is_select("SHOW TABLES"));
    }

    #[test]
    fn detects_locking_reads() {
        assert!(is_locking_read("SELECT * FROM t WHERE id = 1 FOR UPDATE"));
        assert!(is_locking_read("SELECT * FROM t LOCK IN SHARE MODE"));
        assert!(!is_locking_read("SELECT * FROM t"));
    }
}
