//! Health command - run the metric registry and report

use super::spinner;
use anyhow::{Context, Result};
use console::style;
use repolens::metrics::{file_issues, DebtFinding};
use repolens::pipeline::{run_health, HealthOptions, Workspace, HEALTH_JSON};
use repolens::reporters::{render_health, OutputFormat};
use repolens::scoring::HealthReport;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

pub struct HealthArgs {
    pub focus: String,
    pub auto_issue: bool,
    pub out: Option<PathBuf>,
    pub format: String,
    pub profile: Option<String>,
    pub max_files: Option<usize>,
    pub max_seconds: Option<u64>,
}

pub fn run(path: &Path, cache_dir: Option<&Path>, args: HealthArgs) -> Result<()> {
    let format = OutputFormat::from_str(&args.format)?;
    let ws = Workspace::open(path, cache_dir)?;

    let progress = spinner("Running health metrics...");
    let opts = HealthOptions {
        focus: args.focus,
        profile: args.profile,
        max_files: args.max_files,
        max_seconds: args.max_seconds,
    };
    let report = run_health(&ws, &opts);
    progress.finish_and_clear();

    let json_path = args
        .out
        .unwrap_or_else(|| ws.config.report_dir(&ws.root).join(HEALTH_JSON));
    if let Some(parent) = json_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&json_path, render_health(&report, OutputFormat::Json)?)
        .with_context(|| format!("Failed to write {}", json_path.display()))?;

    print!("{}", render_health(&report, format)?);
    if format == OutputFormat::Text {
        println!(
            "\n{} {}",
            style("Grade").bold(),
            grade_style(&report.grade)
        );
        println!("{}", style(format!("report: {}", json_path.display())).dim());
    }

    if args.auto_issue {
        let findings = debt_findings(&report);
        if findings.is_empty() {
            println!("No debt markers to file.");
        } else {
            let created = file_issues(&ws.root, &findings);
            println!("Filed {} debt issue(s).", created);
        }
    }
    Ok(())
}

fn grade_style(grade: &str) -> console::StyledObject<&str> {
    match grade {
        "A" | "B" => style(grade).green().bold(),
        "C" => style(grade).yellow().bold(),
        _ => style(grade).red().bold(),
    }
}

/// Debt findings carried in the debt metric's details, if it ran
fn debt_findings(report: &HealthReport) -> Vec<DebtFinding> {
    let Some(details) = report
        .metrics
        .iter()
        .find(|m| m.result.key == "debt")
        .and_then(|m| m.result.details.as_ref())
    else {
        return Vec::new();
    };
    match serde_json::from_value(details["findings"].clone()) {
        Ok(findings) => findings,
        Err(e) => {
            debug!("Unreadable debt findings: {}", e);
            Vec::new()
        }
    }
}
