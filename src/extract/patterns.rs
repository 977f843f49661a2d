//! Pattern table for feature extraction
//!
//! Raw patterns are scanned once per line; kind discriminators then sort the
//! raw matches into buckets without another pass over file content.

use crate::models::HitKind;
use regex::bytes::Regex as BytesRegex;
use regex::Regex;
use std::sync::OnceLock;

pub const ROUTE_PATTERNS: &[&str] = &[
    r"@router\.(get|post|put|delete|patch)\(.*\)",
    r"APIRouter\(.*prefix=.*\)",
];

pub const CLI_PATTERNS: &[&str] = &[
    r#"if __name__ == ['"]__main__['"]:"#,
    r"argparse\.(ArgumentParser|add_argument)",
    r"import typer|from typer import",
    r"import click|from click import",
];

pub const TOOL_PATTERNS: &[&str] = &[
    r"def\s+(run|handle|execute)\(.*\):",
    r"class\s+.*Adapter\(.*\):",
];

pub const STREAMLIT_PATTERNS: &[&str] = &[
    r"import streamlit as st",
    r"st\.(sidebar|page|set_page_config|tabs)\(.*\)",
];

pub const TEST_PATTERNS: &[&str] = &[r"pytest|unittest", r"client\.(get|post|put|delete)\("];

pub const DOC_PATTERNS: &[&str] = &[r"signature|capsule|CLAUDE|README"];

/// Discriminators in evaluation order; a raw hit lands in every bucket it matches
const DISCRIMINATORS: &[(HitKind, &str)] = &[
    (HitKind::Route, r"@router\.(get|post|put|delete|patch)"),
    (HitKind::Route, r"APIRouter\("),
    (HitKind::Cli, r"__main__|argparse|typer|click"),
    (HitKind::Tool, r"def\s+(run|handle|execute)\("),
    (HitKind::Adapter, r"Adapter\("),
    (HitKind::Streamlit, r"import streamlit|st\."),
    (HitKind::Test, r"pytest|unittest|client\."),
    (HitKind::Doc, r"signature|capsule|CLAUDE|README"),
];

/// One compiled raw pattern
///
/// Raw patterns run over undecoded line bytes, so `.` never matches an
/// invalid UTF-8 sequence, the same as ripgrep.
#[derive(Debug)]
pub struct RawPattern {
    pub source: &'static str,
    pub regex: BytesRegex,
}

/// Compiled raw patterns and kind discriminators
#[derive(Debug)]
pub struct PatternTable {
    pub patterns: Vec<RawPattern>,
    discriminators: Vec<(HitKind, Regex)>,
}

impl PatternTable {
    /// The built-in table, compiled once per process
    pub fn builtin() -> &'static PatternTable {
        static TABLE: OnceLock<PatternTable> = OnceLock::new();
        TABLE.get_or_init(|| {
            let patterns = ROUTE_PATTERNS
                .iter()
                .chain(CLI_PATTERNS)
                .chain(TOOL_PATTERNS)
                .chain(STREAMLIT_PATTERNS)
                .chain(TEST_PATTERNS)
                .chain(DOC_PATTERNS)
                .map(|source| RawPattern {
                    source,
                    regex: BytesRegex::new(source).expect("valid builtin pattern"),
                })
                .collect();
            let discriminators = DISCRIMINATORS
                .iter()
                .map(|(kind, source)| {
                    (*kind, Regex::new(source).expect("valid builtin discriminator"))
                })
                .collect();
            PatternTable {
                patterns,
                discriminators,
            }
        })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Indices of raw patterns matching `line`, in table order
    pub fn matching<'a>(&'a self, line: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
        self.patterns
            .iter()
            .enumerate()
            .filter(move |(_, p)| p.regex.is_match(line))
            .map(|(i, _)| i)
    }

    /// Kinds whose discriminator matches `text`, deduplicated, in evaluation order
    pub fn kinds_for(&self, text: &str) -> Vec<HitKind> {
        let mut kinds = Vec::new();
        for (kind, regex) in &self.discriminators {
            if !kinds.contains(kind) && regex.is_match(text) {
                kinds.push(*kind);
            }
        }
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_line_matches_route_pattern() {
        let table = PatternTable::builtin();
        let hits: Vec<usize> = table.matching(b"@router.get(\"/users\")").collect();
        assert_eq!(hits, vec![0]);
        assert_eq!(table.kinds_for("@router.get(\"/users\")"), vec![HitKind::Route]);
    }

    #[test]
    fn test_main_guard_is_cli() {
        let table = PatternTable::builtin();
        let line = "if __name__ == \"__main__\":";
        assert_eq!(table.matching(line.as_bytes()).count(), 1);
        assert_eq!(table.kinds_for(line), vec![HitKind::Cli]);
    }

    #[test]
    fn test_adapter_class_and_tool_def() {
        let table = PatternTable::builtin();
        assert_eq!(
            table.kinds_for("class SlackAdapter(BaseAdapter):"),
            vec![HitKind::Adapter]
        );
        assert_eq!(table.kinds_for("def run(self, payload):"), vec![HitKind::Tool]);
    }

    #[test]
    fn test_line_in_multiple_buckets() {
        let table = PatternTable::builtin();
        // a test module importing click lands in both buckets
        let kinds = table.kinds_for("import click  # used by pytest fixtures");
        assert_eq!(kinds, vec![HitKind::Cli, HitKind::Test]);
    }

    #[test]
    fn test_dot_does_not_match_invalid_utf8() {
        let table = PatternTable::builtin();
        assert_eq!(table.matching(b"@router.get(\xff)").count(), 0);
        assert_eq!(table.matching("@router.get(\u{e9})".as_bytes()).count(), 1);
    }

    #[test]
    fn test_unrelated_line_matches_nothing() {
        let table = PatternTable::builtin();
        assert_eq!(table.matching(b"x = compute(1, 2)").count(), 0);
    }
}
