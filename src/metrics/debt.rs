//! Technical-debt marker scanner
//!
//! Looks for TODO/FIXME/HACK/XXX/BUG: markers in `#` comments of Python
//! and config files. Findings are capped; the owner of each file (from the
//! tag cache) is attached so issues can be routed.

use super::{HealthContext, Metric, MetricResult};
use crate::scoring::round2;
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

pub const DEBT_REPORT: &str = "debt_report.md";
pub const MAX_FINDINGS: usize = 200;
/// Upper bound on issues filed by one `--auto-issue` run
pub const MAX_AUTO_ISSUES: usize = 5;
const MAX_SCORE: f64 = 10.0;
const HASH_COMMENT_EXTENSIONS: &[&str] = &["py", "pyi", "yaml", "yml", "toml"];

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(TODO|FIXME|HACK|XXX)\b|\b(BUG):").expect("valid debt marker regex")
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtFinding {
    pub file: String,
    pub line: u32,
    pub marker: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// Markers in the `#` comments of `content`
pub fn scan_debt(content: &str, file: &str) -> Vec<DebtFinding> {
    let mut findings = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let Some(hash) = line.find('#') else {
            continue;
        };
        let comment = &line[hash..];
        if let Some(caps) = marker_regex().captures(comment) {
            let marker = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            findings.push(DebtFinding {
                file: file.to_string(),
                line: idx as u32 + 1,
                marker: marker.to_string(),
                text: comment.trim_start_matches('#').trim().to_string(),
                owner: None,
            });
        }
    }
    findings
}

pub struct DebtMetric;

impl Metric for DebtMetric {
    fn key(&self) -> &'static str {
        "debt"
    }

    fn run(&self, ctx: &HealthContext) -> Result<MetricResult> {
        let (files, truncated_files) = ctx.content_files(HASH_COMMENT_EXTENSIONS);

        let mut findings: Vec<DebtFinding> = Vec::new();
        let mut total = 0usize;
        let mut by_marker: BTreeMap<String, usize> = BTreeMap::new();

        for candidate in files {
            let content = match std::fs::read(&candidate.abs_path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
                Err(e) => {
                    debug!("Skipping unreadable {}: {}", candidate.rel_path, e);
                    continue;
                }
            };
            let found = scan_debt(&content, &candidate.rel_path);
            if found.is_empty() {
                continue;
            }
            let owner = ctx.cache.get_tags(&candidate.abs_path).owner;
            for mut finding in found {
                total += 1;
                *by_marker.entry(finding.marker.clone()).or_insert(0) += 1;
                if findings.len() < MAX_FINDINGS {
                    finding.owner = owner.clone();
                    findings.push(finding);
                }
            }
        }

        let capped = total > findings.len();
        let score = round2(MAX_SCORE - (total as f64 * 0.1).min(MAX_SCORE));

        let report_path = ctx.report_dir.join(DEBT_REPORT);
        let report = if findings.is_empty() {
            // No stale report from a previous run
            if report_path.exists() {
                std::fs::remove_file(&report_path).ok();
            }
            None
        } else {
            Some(ctx.write_report(DEBT_REPORT, &render_report(&findings, total, &by_marker))?)
        };

        let mut summary = format!("markers={}", total);
        for (marker, count) in &by_marker {
            summary.push_str(&format!(", {}={}", marker, count));
        }
        if capped || truncated_files {
            summary.push_str(", truncated");
        }

        Ok(MetricResult {
            key: self.key().into(),
            score,
            max_score: MAX_SCORE,
            summary,
            details: Some(serde_json::json!({
                "total": total,
                "by_marker": by_marker,
                "findings": findings,
                "report": report.map(|p| ctx.display_path(&p)),
            })),
        })
    }
}

fn render_report(
    findings: &[DebtFinding],
    total: usize,
    by_marker: &BTreeMap<String, usize>,
) -> String {
    let mut md = String::from("# Debt Report\n\n");
    md.push_str(&format!("- Markers found: {}\n", total));
    for (marker, count) in by_marker {
        md.push_str(&format!("  - {}: {}\n", marker, count));
    }
    if total > findings.len() {
        md.push_str(&format!("- Showing first {}\n", findings.len()));
    }
    md.push_str("\n| Marker | Location | Owner | Text |\n");
    md.push_str("|--------|----------|-------|------|\n");
    for f in findings {
        md.push_str(&format!(
            "| {} | `{}:{}` | {} | {} |\n",
            f.marker,
            f.file,
            f.line,
            f.owner.as_deref().unwrap_or("-"),
            f.text.replace('|', "\\|")
        ));
    }
    md
}

/// File up to [`MAX_AUTO_ISSUES`] GitHub issues via `gh`; best-effort
///
/// Returns the number of issues created. A missing `gh` is not an error.
pub fn file_issues(root: &Path, findings: &[DebtFinding]) -> usize {
    let gh_ok = Command::new("gh")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false);
    if !gh_ok {
        warn!("gh CLI not found; skipping issue creation");
        return 0;
    }

    let mut created = 0;
    for finding in findings.iter().take(MAX_AUTO_ISSUES) {
        let title = format!("[debt] {} in {}:{}", finding.marker, finding.file, finding.line);
        let mut body = format!(
            "Found by `repolens health`.\n\n```\n{}\n```\n\nLocation: `{}:{}`\n",
            finding.text, finding.file, finding.line
        );
        if let Some(owner) = &finding.owner {
            body.push_str(&format!("Owner: {}\n", owner));
        }
        let status = Command::new("gh")
            .args(["issue", "create", "--title", &title, "--body", &body])
            .current_dir(root)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();
        match status {
            Ok(out) if out.status.success() => created += 1,
            Ok(out) => warn!(
                "gh issue create failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            ),
            Err(e) => warn!("Failed to run gh: {}", e),
        }
    }
    info!("Created {} debt issues", created);
    created
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::candidate_for;

    #[test]
    fn test_markers_only_in_comments() {
        let src = "x = 'TODO not a comment'\n# TODO: wire retries\ny = 1  # FIXME overflow\n# BUG: off by one\n# todo lowercase\n# XXXL size\n";
        let found = scan_debt(src, "m.py");
        let markers: Vec<&str> = found.iter().map(|f| f.marker.as_str()).collect();
        assert_eq!(markers, vec!["TODO", "FIXME", "BUG"]);
        assert_eq!(found[0].line, 2);
        assert_eq!(found[0].text, "TODO: wire retries");
    }

    #[test]
    fn test_metric_attaches_owner_and_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("a.py"), "# @owner: core\n# TODO: split module\n").unwrap();
        std::fs::write(root.join("b.py"), "print('clean')\n").unwrap();
        let candidates: Vec<_> = ["a.py", "b.py"]
            .iter()
            .map(|f| candidate_for(root, &root.join(f)).unwrap())
            .collect();

        let result = super::super::tests::with_context(&candidates, root, |ctx| {
            DebtMetric.run(ctx).unwrap()
        });

        assert_eq!(result.score, 9.9);
        assert_eq!(result.summary, "markers=1, TODO=1");
        let details = result.details.unwrap();
        assert_eq!(details["findings"][0]["owner"], "core");
        assert!(root.join("health_reports").join(DEBT_REPORT).exists());
    }

    #[test]
    fn test_clean_tree_has_no_report() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("a.py"), "x = 1\n").unwrap();
        let candidates = vec![candidate_for(root, &root.join("a.py")).unwrap()];

        let result = super::super::tests::with_context(&candidates, root, |ctx| {
            DebtMetric.run(ctx).unwrap()
        });

        assert_eq!(result.score, 10.0);
        assert!(result.details.unwrap()["findings"].as_array().unwrap().is_empty());
        assert!(!root.join("health_reports").join(DEBT_REPORT).exists());
    }
}
