// pattern.rs — Tool-name pattern matching.
//
// Patterns are a restricted glob: `*` means "zero or more of any character"
// and everything else is literal, including `?`, `[` and `/`. Matching is
// case-insensitive (Unicode lowercase on both sides, before matching) and
// anchored at both ends, so `read_*` matches `READ_data` but not
// `unread_data`.
//
// We compile through the `glob` crate after escaping every literal segment,
// so its richer syntax (`?`, character classes, `**` path semantics) never
// leaks into tool patterns. A pattern that still fails to compile falls back
// to case-insensitive equality rather than matching everything.

use glob::{MatchOptions, Pattern};

// Case is folded before matching; `glob` itself only folds ASCII.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Check whether `pattern` matches `value` in full.
pub fn matches(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    let pattern = pattern.to_lowercase();
    let value = value.to_lowercase();
    if !pattern.contains('*') {
        return pattern == value;
    }
    match compile(&pattern) {
        Ok(p) => p.matches_with(&value, MATCH_OPTIONS),
        Err(_) => pattern == value,
    }
}

/// Check whether any pattern in `patterns` matches `value`.
pub fn matches_any<S: AsRef<str>>(patterns: &[S], value: &str) -> bool {
    patterns.iter().any(|p| matches(p.as_ref(), value))
}

/// Escape literal segments and rejoin on single `*` wildcards.
///
/// Runs of `*` collapse to one; `**` would otherwise take on the glob
/// crate's recursive-directory meaning.
fn compile(pattern: &str) -> Result<Pattern, glob::PatternError> {
    let mut escaped = String::with_capacity(pattern.len() + 8);
    let mut last_was_star = false;
    for (i, segment) in pattern.split('*').enumerate() {
        if i > 0 && !last_was_star {
            escaped.push('*');
        }
        last_was_star = segment.is_empty() && i > 0;
        escaped.push_str(&Pattern::escape(segment));
    }
    Pattern::new(&escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lone_star_matches_everything() {
        assert!(matches("*", ""));
        assert!(matches("*", "delete_everything"));
    }

    #[test]
    fn prefix_and_suffix_wildcards() {
        assert!(matches("delete_*", "delete_records"));
        assert!(matches("delete_*", "delete_"));
        assert!(matches("*_admin", "grant_admin"));
        assert!(!matches("delete_*", "undelete_records"));
    }

    #[test]
    fn match_is_anchored() {
        assert!(!matches("read", "read_data"));
        assert!(!matches("*data", "data_lake"));
        assert!(matches("*data*", "big_data_lake"));
    }

    #[test]
    fn match_is_case_insensitive() {
        assert!(matches("Delete_*", "DELETE_RECORDS"));
        assert!(matches("query_users", "Query_Users"));
    }

    #[test]
    fn non_ascii_case_folds_with_and_without_wildcards() {
        assert!(matches("DÄTA", "däta"));
        assert!(matches("DÄTA_*", "däta_export"));
        assert!(matches("*_ÉXPORT", "data_éxport"));
        assert!(matches_any(&["DÄTA_*".to_string()], "Däta_Export"));
    }

    #[test]
    fn other_glob_syntax_is_literal() {
        assert!(!matches("file?", "files"));
        assert!(matches("file?", "FILE?"));
        assert!(matches("db[prod]_*", "db[prod]_drop"));
        assert!(!matches("db[prod]_*", "dbp_drop"));
    }

    #[test]
    fn star_spans_separators_and_runs_collapse() {
        assert!(matches("fs://*", "fs://workspace/src/main.rs"));
        assert!(matches("a**b", "a/x/y/b"));
        assert!(matches("a***", "a"));
    }

    #[test]
    fn middle_wildcard_needs_both_ends() {
        assert!(matches("s3_*_write", "s3_bucket_write"));
        assert!(!matches("s3_*_write", "s3_bucket_read"));
    }

    #[test]
    fn any_over_list() {
        let patterns = vec!["read_*".to_string(), "query_*".to_string()];
        assert!(matches_any(&patterns, "query_orders"));
        assert!(!matches_any(&patterns, "drop_table"));
        assert!(!matches_any::<String>(&[], "anything"));
    }
}
