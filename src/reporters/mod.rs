//! Output reporters for feature maps and health reports
//!
//! Supports multiple output formats:
//! - `text` - Fixed-width terminal tables
//! - `json` - Machine-readable JSON
//! - `html` - Standalone HTML page (feature maps embed their data for filtering)
//! - `markdown` - GitHub-flavored Markdown
//!
//! Feature-map renderings are byte-identical for identical input. Health
//! renderings carry a generation timestamp in Markdown and HTML only.

mod html;
mod json;
mod markdown;
mod text;

use crate::models::FeatureMap;
use crate::scoring::HealthReport;
use anyhow::{anyhow, Result};
use std::str::FromStr;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Html,
    Markdown,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "terminal" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "html" => Ok(OutputFormat::Html),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(anyhow!(
                "Unknown format '{}'. Valid formats: text, json, html, markdown",
                s
            )),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Html => write!(f, "html"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// Render a health report in the given format
pub fn render_health(report: &HealthReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(text::render_health(report)),
        OutputFormat::Json => json::render(report),
        OutputFormat::Html => Ok(html::render_health(report)),
        OutputFormat::Markdown => Ok(markdown::render_health(report)),
    }
}

/// Render a feature map in the given format
pub fn render_feature_map(map: &FeatureMap, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(text::render_feature_map(map, usize::MAX)),
        OutputFormat::Json => json::render(map),
        OutputFormat::Html => html::render_feature_map(map),
        OutputFormat::Markdown => Ok(markdown::render_feature_map(map)),
    }
}

/// Fixed-width preview of the first `limit` hits plus per-kind counts
pub fn feature_map_preview(map: &FeatureMap, limit: usize) -> String {
    text::render_feature_map(map, limit)
}

/// Get the recommended file extension for a format
pub fn file_extension(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Text => "txt",
        OutputFormat::Json => "json",
        OutputFormat::Html => "html",
        OutputFormat::Markdown => "md",
    }
}

/// `key=value` pairs of a hit's metadata, ordered by key
pub(crate) fn meta_line(meta: &std::collections::BTreeMap<String, String>) -> String {
    meta.iter()
        .filter(|(k, _)| k.as_str() != "pattern")
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::metrics::{MetricFailure, MetricResult};
    use crate::models::{Edge, Hit, HitKind, Tags};
    use crate::scoring::WeightedMetric;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    pub(crate) fn test_map() -> FeatureMap {
        let hit = |kind, line, text: &str, meta: &[(&str, &str)]| Hit {
            kind,
            file: "api/routes.py".into(),
            line,
            text: text.into(),
            meta: meta
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            tags: Tags {
                expose: true,
                owner: Some("core".into()),
                maturity: None,
            },
        };
        FeatureMap {
            root: "/repo".into(),
            hits: vec![
                hit(
                    HitKind::Route,
                    3,
                    "@router.get(\"/items\")",
                    &[("method", "GET"), ("path", "/items"), ("pattern", "@router")],
                ),
                hit(HitKind::Tool, 4, "def run(<x>):", &[("entry", "run")]),
            ],
            edges: vec![Edge {
                src: "api/routes.py:3".into(),
                dst: "api/routes.py:4".into(),
                label: crate::graph::ROUTE_TO_TOOL.into(),
            }],
        }
    }

    pub(crate) fn test_report() -> HealthReport {
        HealthReport {
            root: PathBuf::from("/repo"),
            total: 42.5,
            max_total: 50.0,
            grade: "B".into(),
            metrics: vec![WeightedMetric {
                result: MetricResult {
                    key: "debt".into(),
                    score: 8.5,
                    max_score: 10.0,
                    summary: "markers=15, TODO=15".into(),
                    details: None,
                },
                weight: 50.0,
                points: 42.5,
            }],
            failures: vec![MetricFailure {
                key: "style".into(),
                error: "Panic: boom".into(),
            }],
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!(OutputFormat::from_str("text").unwrap(), OutputFormat::Text);
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("html").unwrap(), OutputFormat::Html);
        assert_eq!(
            OutputFormat::from_str("md").unwrap(),
            OutputFormat::Markdown
        );
        assert!(OutputFormat::from_str("sarif").is_err());
    }

    #[test]
    fn test_feature_map_rendering_is_deterministic() {
        for format in [
            OutputFormat::Text,
            OutputFormat::Json,
            OutputFormat::Html,
            OutputFormat::Markdown,
        ] {
            let a = render_feature_map(&test_map(), format).unwrap();
            let b = render_feature_map(&test_map(), format).unwrap();
            assert_eq!(a, b, "{} rendering differs", format);
        }
    }

    #[test]
    fn test_meta_line_hides_pattern() {
        let map = test_map();
        assert_eq!(meta_line(&map.hits[0].meta), "method=GET path=/items");
    }
}
