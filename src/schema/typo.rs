//! Levenshtein-distance typo suggestion, grounded in
//! `mcp-agent-mail-search-core`'s `lexical_parser.rs`
//! `levenshtein_distance`/`suggest_hint_field` pair: a classic
//! two-row DP for the distance, a distance <= 2 cutoff with
//! alphabetical tie-break for the suggestion.

/// Static map of common SQL-keyword misspellings consulted before the
/// more expensive per-candidate Levenshtein scan.
pub const STATIC_KEYWORD_TYPOS: &[(&str, &str)] = &[
    ("SELEC", "SELECT"),
    ("FORM", "FROM"),
    ("WERE", "WHERE"),
    ("ORDE", "ORDER"),
    ("GROP", "GROUP"),
    ("LIMT", "LIMIT")
];

pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let (a, b) = (a.to_lowercase(), b.to_lowercase());
    if a == b {
        return 0;
    }
    if a.is_empty() {
        return b.chars().count();
    }
    if b.is_empty() {
        return a.chars().count();
    }

    let b_chars: Vec<char> = b.chars().collect();
    let mut prev_row: Vec<usize> = (0..=b_chars.len()).collect();
    let mut cur_row = vec![0usize; b_chars.len() + 1];

    for (i, a_ch) in a.chars().enumerate() {
        cur_row[0] = i + 1;
        for (j, b_ch) in b_chars.iter().enumerate() {
            let cost = usize::from(a_ch != *b_ch);
            cur_row[j + 1] = (prev_row[j + 1] + 1)
                .min(cur_row[j] + 1)
                .min(prev_row[j] + cost);
        }
        prev_row.copy_from_slice(&cur_row);
    }
    prev_row[b_chars.len()]
}

/// Nearest candidate to `input` by Levenshtein distance <= 2,
/// case-insensitive, ties broken alphabetically. `None` when no
/// candidate is within range.
pub fn suggest(input: &str, candidates: &[&str]) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for candidate in candidates {
        let distance = levenshtein_distance(input, candidate);
        if distance > 2 {
            continue;
        }
        match best {
            None => best = Some((candidate, distance)),
            Some((best_candidate, best_distance)) => {
                if distance < best_distance || (distance == best_distance && *candidate < best_candidate) {
                    best = Some((candidate, distance));
                }
            }
        }
    }
    best.map(|(candidate, _)| candidate.to_string())
}

/// Look up a statement-starter typo against the static keyword map.
pub fn suggest_keyword(word: &str) -> Option<&'static str> {
    let upper = word.to_uppercase();
    STATIC_KEYWORD_TYPOS
        .iter()
        .find(|(typo, _)| *typo == upper)
        .map(|(_, correct)| *correct)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_zero_for_equal_strings() {
        assert_eq!(levenshtein_distance("users", "users"), 0);
    }

    #[test]
    fn distance_counts_single_edit() {
        assert_eq!(levenshtein_distance("user", "users"), 1);
        assert_eq!(levenshtein_distance("usres", "users"), 2);
    }

    #[test]
    fn suggests_closest_within_range() {
        let candidates = ["users", "orders", "order_items"];
        assert_eq!(suggest("usres", &candidates), Some("users".to_string()));
    }

    #[test]
    fn no_suggestion_past_distance_two() {
        let candidates = ["users"];
        assert_eq!(suggest("completely_different", &candidates), None);
    }

    #[test]
    fn recognizes_static_keyword_typo() {
        assert_eq!(suggest_keyword("selec"), Some("SELECT"));
        assert_eq!(suggest_keyword("WERE"), Some("WHERE"));
        assert_eq!(suggest_keyword("select"), None);
    }
}
