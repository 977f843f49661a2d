//! Lightweight style checks for Python sources

use super::{HealthContext, Metric, MetricResult};
use crate::scoring::round2;
use anyhow::Result;
use serde::Serialize;
use tracing::debug;

pub const STYLE_REPORT: &str = "style_report.md";
pub const MAX_LINE_LENGTH: usize = 120;
const MAX_SCORE: f64 = 10.0;
const OFFENDERS_SHOWN: usize = 15;

/// Style counters for one file or a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StyleCounts {
    pub long_lines: usize,
    pub trailing_whitespace: usize,
    pub tab_indents: usize,
    pub missing_final_newline: usize,
}

impl StyleCounts {
    fn add(&mut self, other: &StyleCounts) {
        self.long_lines += other.long_lines;
        self.trailing_whitespace += other.trailing_whitespace;
        self.tab_indents += other.tab_indents;
        self.missing_final_newline += other.missing_final_newline;
    }

    fn total(&self) -> usize {
        self.long_lines + self.trailing_whitespace + self.tab_indents + self.missing_final_newline
    }

    pub fn score(&self) -> f64 {
        let penalty = (self.long_lines as f64 * 0.05).min(3.0)
            + (self.trailing_whitespace as f64 * 0.05).min(3.0)
            + (self.tab_indents as f64 * 0.1).min(2.0)
            + (self.missing_final_newline as f64 * 0.2).min(2.0);
        round2((MAX_SCORE - penalty).max(0.0))
    }
}

pub fn check_style(content: &str) -> StyleCounts {
    let mut counts = StyleCounts::default();
    for line in content.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.chars().count() > MAX_LINE_LENGTH {
            counts.long_lines += 1;
        }
        if line.ends_with(' ') || line.ends_with('\t') {
            counts.trailing_whitespace += 1;
        }
        if line.starts_with('\t') {
            counts.tab_indents += 1;
        }
    }
    if !content.is_empty() && !content.ends_with('\n') {
        counts.missing_final_newline = 1;
    }
    counts
}

pub struct StyleMetric;

impl Metric for StyleMetric {
    fn key(&self) -> &'static str {
        "style"
    }

    fn run(&self, ctx: &HealthContext) -> Result<MetricResult> {
        let (files, truncated) = ctx.content_files(&["py"]);
        let mut totals = StyleCounts::default();
        let mut offenders: Vec<(String, usize)> = Vec::new();

        for candidate in &files {
            let content = match std::fs::read(&candidate.abs_path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
                Err(e) => {
                    debug!("Skipping unreadable {}: {}", candidate.rel_path, e);
                    continue;
                }
            };
            let counts = check_style(&content);
            if counts.total() > 0 {
                offenders.push((candidate.rel_path.clone(), counts.total()));
            }
            totals.add(&counts);
        }
        offenders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        offenders.truncate(OFFENDERS_SHOWN);

        let report = ctx.write_report(STYLE_REPORT, &render_report(files.len(), &totals, &offenders))?;

        let mut summary = format!(
            "long={}, trailing_ws={}, tabs={}, no_eol={}",
            totals.long_lines,
            totals.trailing_whitespace,
            totals.tab_indents,
            totals.missing_final_newline
        );
        if truncated {
            summary.push_str(", truncated");
        }

        Ok(MetricResult {
            key: self.key().into(),
            score: totals.score(),
            max_score: MAX_SCORE,
            summary,
            details: Some(serde_json::json!({
                "files": files.len(),
                "counts": totals,
                "worst_files": offenders,
                "report": ctx.display_path(&report),
            })),
        })
    }
}

fn render_report(files: usize, totals: &StyleCounts, offenders: &[(String, usize)]) -> String {
    let mut md = String::from("# Style Report\n\n");
    md.push_str(&format!("- Files checked: {}\n", files));
    md.push_str(&format!("- Lines over {} chars: {}\n", MAX_LINE_LENGTH, totals.long_lines));
    md.push_str(&format!("- Trailing whitespace: {}\n", totals.trailing_whitespace));
    md.push_str(&format!("- Tab-indented lines: {}\n", totals.tab_indents));
    md.push_str(&format!("- Missing final newline: {}\n\n", totals.missing_final_newline));
    if !offenders.is_empty() {
        md.push_str("| File | Issues |\n|------|--------|\n");
        for (file, count) in offenders {
            md.push_str(&format!("| `{}` | {} |\n", file, count));
        }
    }
    md
}
