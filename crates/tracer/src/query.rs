// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Query normalization and tag extraction
//!
//! Statements are logged on one line: every run of spaces, tabs, carriage
//! returns and newlines collapses to a single space.
//!
//! An operator can label a statement with an inline comment:
//!
//! ```text
//! SELECT * FROM users /* list-users */ WHERE id = ?
//! ```
//!
//! The first `/* ... */` comment becomes the record's tag, and the logged
//! query stops before it. This keeps lines short for statements like
//! `INSERT INTO t /* bulk */ VALUES (...), (...), ...`.
//!
//! The first `*/` closes the comment; nested comment markers are not
//! understood.

use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\r\n]+").expect("whitespace pattern is valid"));

static TAG_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\*(.*?)\*/").expect("tag comment pattern is valid"));

/// A statement prepared for the SQL log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedQuery {
    /// Content of the first tag comment, trimmed; empty when there is none
    pub tag: String,
    /// Normalized statement text, cut before the tag comment when one exists
    pub query: String,
}

/// Collapse every whitespace run to a single space
pub fn normalize(query: &str) -> String {
    WHITESPACE_RUN.replace_all(query, " ").into_owned()
}

/// Normalize `query` and split off its tag comment
///
/// # Example
///
/// ```ignore
/// let extracted = extract("SELECT   *\nFROM users  /* list-users */ WHERE id = ?");
/// assert_eq!(extracted.tag, "list-users");
/// assert_eq!(extracted.query, "SELECT * FROM users");
/// ```
pub fn extract(query: &str) -> ExtractedQuery {
    let normalized = normalize(query);

    let Some(caps) = TAG_COMMENT.captures(&normalized) else {
        return ExtractedQuery {
            tag: String::new(),
            query: normalized,
        };
    };

    let tag = caps
        .get(1)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    let comment_start = caps.get(0).map(|m| m.start()).unwrap_or(normalized.len());

    ExtractedQuery {
        tag,
        query: normalized[..comment_start].trim_end().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace_runs() {
        assert_eq!(
            normalize("SELECT\t*\r\n  FROM   users\nWHERE id = ?"),
            "SELECT * FROM users WHERE id = ?"
        );
    }

    #[test]
    fn test_normalize_single_newline_becomes_space() {
        assert_eq!(normalize("SELECT 1\nFROM dual"), "SELECT 1 FROM dual");
    }

    #[test]
    fn test_normalize_keeps_edges_collapsed_not_trimmed() {
        assert_eq!(normalize("\n\n SELECT 1 \t"), " SELECT 1 ");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "",
            "SELECT 1",
            "  a \t b\n\nc  ",
            "INSERT INTO t VALUES (1,\n 2)\r\n",
            "/* tag */\tSELECT\n1",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn test_extract_without_tag_matches_normalize() {
        let inputs = ["SELECT * FROM users", "UPDATE t\nSET a = 1", "", "SELECT '*/'"];
        for input in inputs {
            let extracted = extract(input);
            assert_eq!(extracted.tag, "");
            assert_eq!(extracted.query, normalize(input));
        }
    }

    #[test]
    fn test_extract_list_users_scenario() {
        let extracted = extract("SELECT   *\nFROM users  /* list-users */ WHERE id = ?");
        assert_eq!(extracted.tag, "list-users");
        assert_eq!(extracted.query, "SELECT * FROM users");
    }

    #[test]
    fn test_extract_tag_is_trimmed() {
        let extracted = extract("SELECT 1 /*    padded tag   */");
        assert_eq!(extracted.tag, "padded tag");
        assert_eq!(extracted.query, "SELECT 1");
    }

    #[test]
    fn test_extract_drops_values_after_tag() {
        let extracted = extract("INSERT INTO items /* bulk */ VALUES (1), (2), (3)");
        assert_eq!(extracted.tag, "bulk");
        assert_eq!(extracted.query, "INSERT INTO items");
    }

    #[test]
    fn test_extract_only_first_tag_is_honored() {
        let extracted = extract("SELECT /* first */ a /* second */ FROM t");
        assert_eq!(extracted.tag, "first");
        assert_eq!(extracted.query, "SELECT");
    }

    #[test]
    fn test_extract_first_close_marker_ends_comment() {
        let extracted = extract("SELECT 1 /* outer /* inner */ rest */");
        assert_eq!(extracted.tag, "outer /* inner");
        assert_eq!(extracted.query, "SELECT 1");
    }

    #[test]
    fn test_extract_multiline_tag_comment() {
        let extracted = extract("SELECT 1 /*\n  warm\tcache\n*/ FROM dual");
        assert_eq!(extracted.tag, "warm cache");
        assert_eq!(extracted.query, "SELECT 1");
    }

    #[test]
    fn test_extract_leading_tag_leaves_empty_query() {
        let extracted = extract("/* ping */ SELECT 1");
        assert_eq!(extracted.tag, "ping");
        assert_eq!(extracted.query, "");
    }
}
