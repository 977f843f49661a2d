//! Text (terminal) reporter with fixed-width tables

use super::meta_line;
use crate::models::FeatureMap;
use crate::scoring::HealthReport;

const KEY_WIDTH: usize = 12;
const SCORE_WIDTH: usize = 12;
const POINTS_WIDTH: usize = 14;
const KIND_WIDTH: usize = 10;
const LOCATION_WIDTH: usize = 40;

/// Cut `s` to `width` chars, marking the cut with `~`
fn fit(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(width.saturating_sub(1)).collect();
    cut.push('~');
    cut
}

/// Render the health table; rows in registration order
pub fn render_health(report: &HealthReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Repository Health: {}\n", report.root.display()));
    let rule = "-".repeat(KEY_WIDTH + SCORE_WIDTH + POINTS_WIDTH + 3 + 40);
    out.push_str(&format!(
        "{:<kw$} {:>sw$} {:>pw$}  {}\n",
        "METRIC",
        "SCORE",
        "POINTS",
        "SUMMARY",
        kw = KEY_WIDTH,
        sw = SCORE_WIDTH,
        pw = POINTS_WIDTH
    ));
    out.push_str(&format!("{}\n", rule));

    for m in &report.metrics {
        let score = format!("{:.2}/{:.0}", m.result.score, m.result.max_score);
        let points = format!("{:.2}/{:.2}", m.points, m.weight);
        out.push_str(&format!(
            "{:<kw$} {:>sw$} {:>pw$}  {}\n",
            fit(&m.result.key, KEY_WIDTH),
            score,
            points,
            m.result.summary,
            kw = KEY_WIDTH,
            sw = SCORE_WIDTH,
            pw = POINTS_WIDTH
        ));
    }
    for f in &report.failures {
        out.push_str(&format!(
            "{:<kw$} {:>sw$} {:>pw$}  {}\n",
            fit(&f.key, KEY_WIDTH),
            "FAILED",
            "-",
            f.error,
            kw = KEY_WIDTH,
            sw = SCORE_WIDTH,
            pw = POINTS_WIDTH
        ));
    }

    out.push_str(&format!("{}\n", rule));
    out.push_str(&format!(
        "{:<kw$} {:>sw$} {:>pw$}  Grade {}\n",
        "TOTAL",
        "",
        format!("{:.2}/{:.2}", report.total, report.max_total),
        report.grade,
        kw = KEY_WIDTH,
        sw = SCORE_WIDTH,
        pw = POINTS_WIDTH
    ));
    out
}

/// Hit table (first `limit` rows), per-kind counts and edge count
pub fn render_feature_map(map: &FeatureMap, limit: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<kw$} {:<lw$} {}\n",
        "KIND",
        "LOCATION",
        "META",
        kw = KIND_WIDTH,
        lw = LOCATION_WIDTH
    ));
    for hit in map.hits.iter().take(limit) {
        out.push_str(&format!(
            "{:<kw$} {:<lw$} {}\n",
            hit.kind.as_str(),
            fit(&hit.id(), LOCATION_WIDTH),
            meta_line(&hit.meta),
            kw = KIND_WIDTH,
            lw = LOCATION_WIDTH
        ));
    }
    if map.hits.len() > limit {
        out.push_str(&format!("... {} more\n", map.hits.len() - limit));
    }

    out.push('\n');
    let counts: Vec<String> = map
        .by_kind()
        .iter()
        .map(|(kind, n)| format!("{}={}", kind, n))
        .collect();
    out.push_str(&format!("hits={} ({})\n", map.hits.len(), counts.join(", ")));
    out.push_str(&format!("edges={}\n", map.edges.len()));
    out
}
