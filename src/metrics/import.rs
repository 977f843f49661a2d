//! Import hygiene and cycle analyzer

use super::{HealthContext, Metric, MetricResult};
use crate::imports::{ImportAnalyzer, ImportStats, MAX_SCORE_IMPORT};
use anyhow::Result;
use std::time::Duration;

pub const CYCLE_REPORT: &str = "import_cycles.md";
const EXTERNAL_SHOWN: usize = 20;

pub struct ImportMetric;

impl Metric for ImportMetric {
    fn key(&self) -> &'static str {
        "import"
    }

    fn run(&self, ctx: &HealthContext) -> Result<MetricResult> {
        let cfg = &ctx.config.imports;
        let analyzer = ImportAnalyzer::new(
            cfg.internal_prefixes.clone(),
            cfg.max_files,
            Duration::from_secs(cfg.max_seconds),
        );
        let stats = analyzer.analyze(ctx.candidates);
        let report = ctx.write_report(CYCLE_REPORT, &render_report(&stats))?;

        let external: Vec<&String> = stats.external_modules.iter().take(EXTERNAL_SHOWN).collect();
        Ok(MetricResult {
            key: self.key().into(),
            score: stats.score(),
            max_score: MAX_SCORE_IMPORT,
            summary: stats.summary(),
            details: Some(serde_json::json!({
                "files": stats.files,
                "external": external,
                "cycles": stats.cycles,
                "truncated": stats.truncated,
                "cycle_report": ctx.display_path(&report),
            })),
        })
    }
}

fn render_report(stats: &ImportStats) -> String {
    let mut md = String::from("# Import Cycles\n\n");
    md.push_str(&format!("- Files scanned: {}\n", stats.files));
    md.push_str(&format!("- Cycles: {}\n", stats.cycle_count()));
    if stats.truncated {
        md.push_str("- Scan budget reached; results are partial\n");
    }
    md.push('\n');

    if stats.cycles.is_empty() {
        md.push_str("No import cycles among internal modules.\n");
    }
    for (i, cycle) in stats.cycles.iter().enumerate() {
        md.push_str(&format!("## Cycle {} ({} modules)\n\n", i + 1, cycle.len()));
        for member in cycle {
            md.push_str(&format!("- `{}`\n", member));
        }
        md.push('\n');
    }

    if !stats.external_modules.is_empty() {
        md.push_str("\n## External modules\n\n");
        for module in &stats.external_modules {
            md.push_str(&format!("- {}\n", module));
        }
    }
    md
}
