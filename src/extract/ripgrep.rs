//! External scan engine delegating to ripgrep
//!
//! Each raw pattern is run once per chunk of candidate files. Files are
//! selected with root-anchored `-g` include filters so ripgrep never looks
//! outside the candidate set.

use super::patterns::PatternTable;
use super::{RawHit, ScanEngine, ScanError};
use crate::models::CandidateFile;
use std::collections::HashSet;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use tracing::debug;

const RG_ARGS: &[&str] = &[
    "--no-config",
    "--text",
    "--no-ignore",
    "--hidden",
    "--line-number",
    "--with-filename",
    "--no-heading",
    "--color",
    "never",
];

/// Max include filters per invocation, keeps argv well below OS limits
const GLOB_CHUNK: usize = 200;

static RG_AVAILABLE: OnceLock<bool> = OnceLock::new();

/// Whether `rg` can be spawned
pub fn rg_available() -> bool {
    *RG_AVAILABLE.get_or_init(|| {
        let found = Command::new("rg")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        debug!("ripgrep available: {}", found);
        found
    })
}

pub struct RipgrepScanner;

impl ScanEngine for RipgrepScanner {
    fn name(&self) -> &'static str {
        "external"
    }

    fn scan(
        &self,
        root: &Path,
        candidates: &[CandidateFile],
        table: &PatternTable,
    ) -> Result<Vec<RawHit>, ScanError> {
        if !rg_available() {
            return Err(ScanError::ToolMissing);
        }

        let known: HashSet<&str> = candidates.iter().map(|c| c.rel_path.as_str()).collect();
        let mut hits = Vec::new();

        for chunk in candidates.chunks(GLOB_CHUNK) {
            let mut globs = Vec::with_capacity(chunk.len() * 2);
            for candidate in chunk {
                globs.push("-g".to_string());
                globs.push(format!("/{}", escape_glob(&candidate.rel_path)));
            }

            for (index, pattern) in table.patterns.iter().enumerate() {
                let stdout = run_rg(root, pattern.source, &globs)?;
                for line in stdout.lines() {
                    if let Some(hit) = parse_line(line, index) {
                        if known.contains(hit.file.as_str()) {
                            hits.push(hit);
                        }
                    }
                }
            }
        }

        Ok(hits)
    }
}

fn run_rg(root: &Path, pattern: &str, globs: &[String]) -> Result<String, ScanError> {
    let output = Command::new("rg")
        .args(RG_ARGS)
        .arg("--regexp")
        .arg(pattern)
        .args(globs)
        .current_dir(root)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(ScanError::Spawn)?;

    match output.status.code() {
        // 1 means no match
        Some(0) | Some(1) => Ok(String::from_utf8_lossy(&output.stdout).to_string()),
        code => Err(ScanError::ToolFailed {
            code,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }),
    }
}

/// Parse `path:line:text`
fn parse_line(line: &str, pattern: usize) -> Option<RawHit> {
    let mut parts = line.splitn(3, ':');
    let path = parts.next()?;
    let lineno: u32 = parts.next()?.parse().ok()?;
    let text = parts.next()?;
    let file = path.trim_start_matches("./").replace('\\', "/");
    Some(RawHit {
        file,
        line: lineno,
        text: text.strip_suffix('\r').unwrap_or(text).to_string(),
        pattern,
    })
}

fn escape_glob(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '{' | '}' | '\\' | '!') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_keeps_colons_in_text() {
        let hit = parse_line("api/server.py:12:    x = {'a': 1}", 3).unwrap();
        assert_eq!(hit.file, "api/server.py");
        assert_eq!(hit.line, 12);
        assert_eq!(hit.text, "    x = {'a': 1}");
        assert_eq!(hit.pattern, 3);
    }

    #[test]
    fn test_parse_line_rejects_malformed() {
        assert!(parse_line("no separators here", 0).is_none());
        assert!(parse_line("file.py:abc:text", 0).is_none());
    }

    #[test]
    fn test_escape_glob_metacharacters() {
        assert_eq!(escape_glob("a/[id]/b*.py"), "a/\\[id\\]/b\\*.py");
        assert_eq!(escape_glob("plain/file.py"), "plain/file.py");
    }
}
