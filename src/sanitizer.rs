//! Sanitizer: strips comments, trailing semicolons, and collapses
//! whitespace before anything downstream sees the statement.
//!
//! Idempotent: running `sanitize` twice produces the same output as
//! running it once, since every operation only removes or collapses
//! text, never introduces anything a second pass would need to touch.

use std::sync::LazyLock;

use regex::Regex;

// `/*+ ... */` is an optimizer hint, not a comment - it must survive.
// Matching it first and temporarily fencing it out of the block-comment
// pass is simpler than teaching one regex both "strip" and "keep".
static HINT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/\*\+.*?\*/").expect("valid regex"));
static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));
static LINE_COMMENT_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--[^\n]*").expect("valid regex"));
static LINE_COMMENT_HASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#[^\n]*").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

const HINT_PLACEHOLDER_PREFIX: &str = "\u{0}HINT";

/// Sanitize one SQL statement: strip comments (preserving `/*+ ... */`
/// optimizer hints), drop the trailing `;`, and collapse whitespace runs
/// to a single space.
pub fn sanitize(sql: &str) -> String {
    let mut hints = Vec::new();
    let fenced = HINT.replace_all(sql, |caps: &regex::Captures<'_>| {
        hints.push(caps[0].to_string());
        format!("{HINT_PLACEHOLDER_PREFIX}{}\u{0}", hints.len() - 1)
    });

    let without_block = BLOCK_COMMENT.replace_all(&fenced, " ");
    let without_dash = LINE_COMMENT_DASH.replace_all(&without_block, "");
    let without_hash = LINE_COMMENT_HASH.replace_all(&without_dash, "");

    let mut restored = without_hash.into_owned();
    for (i, hint) in hints.iter().enumerate() {
        let placeholder = format!("{HINT_PLACEHOLDER_PREFIX}{i}\u{0}");
        restored = restored.replace(&placeholder, hint);
    }

    let trimmed = restored.trim().trim_end_matches(';').trim();
    WHITESPACE.replace_all(trimmed, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_block_comment() {
        assert_eq!(sanitize("SELECT /* comment */ id FROM t"), "SELECT id FROM t");
    }

    #[test]
    fn preserves_optimizer_hint() {
        assert_eq!(
            sanitize("SELECT /*+ INDEX(t idx) */ id FROM t"),
            "SELECT /*+ INDEX(t idx) */ id FROM t"
        );
    }

    #[test]
    fn strips_line_comments() {
        assert_eq!(sanitize("SELECT id -- trailing\nFROM t # also\n"), "SELECT id FROM t");
    }

    #[test]
    fn trims_trailing_semicolon_and_collapses_whitespace() {
        assert_eq!(sanitize("SELECT   id\n\nFROM t;  \n"), "SELECT id FROM t");
    }

    #[test]
    fn idempotent() {
        let once = sanitize("SELECT /*+ H */ id -- c\nFROM t;");
        let twice = sanitize(&once);
        assert_eq!(once, twice);
    }
}
