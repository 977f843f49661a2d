//! HTML reporter with embedded styles
//!
//! The feature-map page embeds the raw map as JSON and filters it
//! client-side; it needs no network access to view.

use crate::models::FeatureMap;
use crate::scoring::HealthReport;
use anyhow::Result;
use chrono::Local;

/// Standalone page listing every hit with a text filter
pub fn render_feature_map(map: &FeatureMap) -> Result<String> {
    // `</script>` inside string data would end the script element early
    let data = serde_json::to_string(map)?.replace("</", "<\\/");

    let mut html = render_head("Feature Map");
    html.push_str("<body>\n<div class=\"container\">\n");
    html.push_str(&format!(
        "<h1>Feature Map</h1>\n<p class=\"muted\">{} &middot; {} hits &middot; {} edges</p>\n",
        html_escape(&map.root),
        map.hits.len(),
        map.edges.len()
    ));
    html.push_str(
        "<input id=\"filter\" type=\"search\" placeholder=\"Filter by kind, file, owner or text\" autofocus>\n",
    );
    html.push_str("<p class=\"muted\" id=\"count\"></p>\n");
    html.push_str(
        "<table>\n<thead><tr><th>Kind</th><th>Location</th><th>Owner</th><th>Meta</th><th>Text</th></tr></thead>\n<tbody id=\"hits\"></tbody>\n</table>\n",
    );
    html.push_str("<h2>Edges</h2>\n<table>\n<thead><tr><th>From</th><th>To</th><th>Label</th></tr></thead>\n<tbody>\n");
    for edge in &map.edges {
        html.push_str(&format!(
            "<tr><td><code>{}</code></td><td><code>{}</code></td><td>{}</td></tr>\n",
            html_escape(&edge.src),
            html_escape(&edge.dst),
            html_escape(&edge.label)
        ));
    }
    html.push_str("</tbody>\n</table>\n</div>\n");
    html.push_str(&format!(
        "<script id=\"feature-map\" type=\"application/json\">{}</script>\n",
        data
    ));
    html.push_str(FILTER_SCRIPT);
    html.push_str("</body>\n</html>\n");
    Ok(html)
}

pub fn render_health(report: &HealthReport) -> String {
    let mut html = render_head("Repository Health");
    html.push_str("<body>\n<div class=\"container\">\n");
    html.push_str(&format!(
        "<h1>Repository Health</h1>\n<p class=\"muted\">{} &middot; generated {}</p>\n",
        html_escape(&report.root.display().to_string()),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    html.push_str(&format!(
        "<div class=\"grade grade-{}\">{}</div>\n<p><strong>{:.2}</strong> / {:.2}</p>\n",
        report.grade.to_lowercase(),
        html_escape(&report.grade),
        report.total,
        report.max_total
    ));

    html.push_str("<table>\n<thead><tr><th>Metric</th><th>Score</th><th>Points</th><th>Summary</th></tr></thead>\n<tbody>\n");
    for m in &report.metrics {
        let pct = if m.result.max_score > 0.0 {
            m.result.score / m.result.max_score * 100.0
        } else {
            0.0
        };
        html.push_str(&format!(
            "<tr><td>{}</td><td><div class=\"bar\"><div class=\"{}\" style=\"width:{:.0}%\"></div></div>{:.2}/{:.0}</td><td>{:.2}/{:.2}</td><td>{}</td></tr>\n",
            html_escape(&m.result.key),
            bar_class(pct),
            pct,
            m.result.score,
            m.result.max_score,
            m.points,
            m.weight,
            html_escape(&m.result.summary)
        ));
    }
    for f in &report.failures {
        html.push_str(&format!(
            "<tr class=\"failed\"><td>{}</td><td>failed</td><td>-</td><td>{}</td></tr>\n",
            html_escape(&f.key),
            html_escape(&f.error)
        ));
    }
    html.push_str("</tbody>\n</table>\n</div>\n</body>\n</html>\n");
    html
}

fn render_head(title: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n<title>{}</title>\n<style>{}</style>\n</head>\n",
        html_escape(title),
        CSS
    )
}

fn bar_class(percent: f64) -> &'static str {
    if percent >= 80.0 {
        "bar-good"
    } else if percent >= 60.0 {
        "bar-moderate"
    } else {
        "bar-poor"
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const CSS: &str = r#"
body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", sans-serif; background: #f8fafc; color: #1e293b; margin: 0; }
.container { max-width: 1200px; margin: 0 auto; padding: 24px; }
.muted { color: #64748b; }
table { width: 100%; border-collapse: collapse; background: white; margin: 12px 0; }
th, td { text-align: left; padding: 6px 10px; border-bottom: 1px solid #e2e8f0; font-size: 14px; vertical-align: top; }
th { background: #f1f5f9; }
code { font-size: 13px; }
#filter { width: 100%; padding: 8px; font-size: 15px; border: 1px solid #cbd5e1; border-radius: 4px; }
.grade { font-size: 48px; font-weight: bold; }
.grade-a, .grade-b { color: #16a34a; }
.grade-c { color: #ca8a04; }
.grade-d, .grade-f { color: #dc2626; }
.bar { width: 120px; height: 8px; background: #e2e8f0; border-radius: 4px; display: inline-block; margin-right: 8px; }
.bar > div { height: 8px; border-radius: 4px; }
.bar-good { background: #22c55e; }
.bar-moderate { background: #eab308; }
.bar-poor { background: #ef4444; }
tr.failed td { color: #dc2626; }
"#;

const FILTER_SCRIPT: &str = r#"<script>
(function () {
  var map = JSON.parse(document.getElementById('feature-map').textContent);
  var body = document.getElementById('hits');
  var count = document.getElementById('count');
  function esc(s) {
    return String(s).replace(/[&<>"']/g, function (c) {
      return {'&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;'}[c];
    });
  }
  function meta(m) {
    return Object.keys(m).filter(function (k) { return k !== 'pattern'; })
      .map(function (k) { return k + '=' + m[k]; }).join(' ');
  }
  function render() {
    var q = document.getElementById('filter').value.toLowerCase();
    var rows = [];
    map.hits.forEach(function (h) {
      var owner = h.tags.owner || '-';
      var hay = [h.kind, h.file, owner, h.text, meta(h.meta)].join(' ').toLowerCase();
      if (q && hay.indexOf(q) < 0) { return; }
      rows.push('<tr><td>' + esc(h.kind) + '</td><td><code>' + esc(h.file + ':' + h.line) +
        '</code></td><td>' + esc(owner) + '</td><td>' + esc(meta(h.meta)) +
        '</td><td><code>' + esc(h.text.trim()) + '</code></td></tr>');
    });
    body.innerHTML = rows.join('');
    count.textContent = rows.length + ' of ' + map.hits.length + ' hits';
  }
  document.getElementById('filter').addEventListener('input', render);
  render();
})();
</script>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::{test_map, test_report};

    #[test]
    fn test_feature_map_embeds_json() {
        let html = render_feature_map(&test_map()).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<script id=\"feature-map\" type=\"application/json\">{\"root\":\"/repo\""));
        assert!(html.contains("<input id=\"filter\""));
        assert!(html.contains("route→tool(file)"));
    }

    #[test]
    fn test_script_close_is_escaped() {
        let mut map = test_map();
        map.hits[0].text = "x = '</script><b>'".into();
        let html = render_feature_map(&map).unwrap();
        assert_eq!(html.matches("</script>").count(), 2);
    }

    #[test]
    fn test_health_html_escapes() {
        let mut report = test_report();
        report.metrics[0].result.summary = "a<b".into();
        let html = render_health(&report);
        assert!(html.contains("a&lt;b"));
        assert!(html.contains("grade-b"));
    }
}
