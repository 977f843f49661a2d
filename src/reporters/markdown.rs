//! Markdown reporter for GitHub-flavored Markdown output
//!
//! Feature maps render without timestamps so saved artifacts diff cleanly.

use super::meta_line;
use crate::models::FeatureMap;
use crate::scoring::HealthReport;
use chrono::Local;

pub fn render_health(report: &HealthReport) -> String {
    let mut md = String::new();
    md.push_str(&render_health_header(report));
    md.push('\n');

    md.push_str("## Metrics\n\n");
    md.push_str("| Metric | Score | Weight | Points | Summary |\n");
    md.push_str("|--------|-------|--------|--------|---------|\n");
    for m in &report.metrics {
        md.push_str(&format!(
            "| {} | {:.2}/{:.0} | {:.2} | {:.2} | {} |\n",
            m.result.key,
            m.result.score,
            m.result.max_score,
            m.weight,
            m.points,
            escape_cell(&m.result.summary)
        ));
    }

    if !report.failures.is_empty() {
        md.push_str("\n## Failed Metrics\n\n");
        for f in &report.failures {
            md.push_str(&format!("- **{}**: {}\n", f.key, f.error));
        }
    }
    md
}

fn render_health_header(report: &HealthReport) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!(
        "# Repository Health Report\n\n**Grade: {}** | **Score: {:.2}/{:.2}**\n\nRepository: `{}`\n\nGenerated: {}\n",
        report.grade,
        report.total,
        report.max_total,
        report.root.display(),
        timestamp
    )
}

pub fn render_feature_map(map: &FeatureMap) -> String {
    let mut md = String::from("# Feature Map\n\n");
    md.push_str(&format!("Root: `{}`\n\n", map.root));

    md.push_str("## Summary\n\n| Kind | Hits |\n|------|------|\n");
    for (kind, n) in map.by_kind() {
        md.push_str(&format!("| {} | {} |\n", kind, n));
    }
    md.push_str(&format!("\nEdges: {}\n\n", map.edges.len()));

    md.push_str("## Hits\n\n| Kind | Location | Owner | Meta | Text |\n");
    md.push_str("|------|----------|-------|------|------|\n");
    for hit in &map.hits {
        md.push_str(&format!(
            "| {} | `{}` | {} | {} | `{}` |\n",
            hit.kind,
            hit.id(),
            hit.tags.owner.as_deref().unwrap_or("-"),
            escape_cell(&meta_line(&hit.meta)),
            escape_cell(hit.text.trim()).replace('`', "'")
        ));
    }

    if !map.edges.is_empty() {
        md.push_str("\n## Edges\n\n| From | To | Label |\n|------|----|-------|\n");
        for edge in &map.edges {
            md.push_str(&format!("| `{}` | `{}` | {} |\n", edge.src, edge.dst, edge.label));
        }
    }
    md
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::{test_map, test_report};

    #[test]
    fn test_health_markdown_has_rows() {
        let md = render_health(&test_report());
        assert!(md.starts_with("# Repository Health Report"));
        assert!(md.contains("**Grade: B**"));
        assert!(md.contains("| debt | 8.50/10 | 50.00 | 42.50 |"));
        assert!(md.contains("- **style**: Panic: boom"));
    }

    #[test]
    fn test_feature_map_markdown() {
        let md = render_feature_map(&test_map());
        assert!(md.contains("| route | 1 |"));
        assert!(md.contains("| route | `api/routes.py:3` | core | method=GET path=/items |"));
        assert!(md.contains("| `api/routes.py:3` | `api/routes.py:4` | route→tool(file) |"));
        assert!(!md.contains("Generated"));
    }
}
