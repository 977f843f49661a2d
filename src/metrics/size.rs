//! Repository size and binary-externalization analyzer
//!
//! Walks the tree (honoring .gitignore) up to the configured file cap,
//! classifies heavy artifacts by glob and writes a guide for moving them
//! out of git.

use super::{HealthContext, Metric, MetricResult};
use crate::config::SizeConfig;
use crate::discovery::{relative_path, GlobList};
use crate::scoring::round2;
use anyhow::Result;
use ignore::WalkBuilder;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

pub const GUIDE_FILE: &str = "model_externalization_guide.md";
const MAX_SCORE: f64 = 10.0;
const LARGEST_SHOWN: usize = 8;
const GUIDE_LIST_LIMIT: usize = 30;
/// Each whitelisted file softens the penalty by 1%, up to 50%
const WHITELIST_DISCOUNT: f64 = 0.01;
/// Each blacklisted file hardens the penalty by 10%, up to 2x
const BLACKLIST_MULTIPLIER: f64 = 1.10;

const EXCLUDE_DIR_HINTS: &[&str] = &[
    "venv",
    ".git",
    "__pycache__",
    "node_modules",
    "dist",
    "build",
    ".mypy_cache",
    ".pytest_cache",
];

const SIZE_EXTENSIONS: &[&str] = &[
    "py", "yaml", "yml", "json", "md", "txt", "ini", "toml", "bin", "pt", "onnx", "ckpt", "zip",
    "tar", "gz",
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct SizeStats {
    pub total_bytes: u64,
    pub py_bytes: u64,
    pub file_count: usize,
    /// (path, bytes), largest first
    pub large_files: Vec<(String, u64)>,
    pub binaries: Vec<String>,
    pub models: Vec<String>,
    pub samples: Vec<String>,
    pub whitelist_hits: usize,
    pub blacklist_hits: usize,
    pub truncated: bool,
}

impl SizeStats {
    pub fn score(&self, cfg: &SizeConfig) -> f64 {
        let penalty_large = (self.large_files.len() as f64 - cfg.large_allow as f64).max(0.0);

        let cap = (cfg.total_soft_cap_mb * 1024 * 1024) as f64;
        let penalty_total = if cap > 0.0 && self.total_bytes as f64 > cap {
            ((self.total_bytes as f64 - cap) / cap * 2.0).min(3.0)
        } else {
            0.0
        };

        let penalty_class = (self.binaries.len() as f64 * 0.2).min(2.0)
            + (self.models.len() as f64 * 0.3).min(3.0)
            + (self.samples.len() as f64 * 0.1).min(1.5);

        let mut penalty = penalty_large + penalty_total + penalty_class;
        penalty *= 1.0 - (self.whitelist_hits as f64 * WHITELIST_DISCOUNT).min(0.5);
        penalty *= 1.0 + (self.blacklist_hits as f64 * (BLACKLIST_MULTIPLIER - 1.0)).min(1.0);

        round2((MAX_SCORE - penalty.min(MAX_SCORE)).max(0.0))
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "files={}, py={}KB, large={}, bin={}, mdl={}, samp={}",
            self.file_count,
            self.py_bytes / 1024,
            self.large_files.len(),
            self.binaries.len(),
            self.models.len(),
            self.samples.len()
        );
        if self.truncated {
            summary.push_str(", truncated");
        }
        summary
    }
}

/// Whether `dir` (possibly multi-segment) appears as a path-segment run in `rel`
fn path_has_dir(rel: &str, dir: &str) -> bool {
    let parts: Vec<&str> = rel.split('/').collect();
    let dparts: Vec<&str> = dir.trim_matches('/').split('/').collect();
    if dparts.is_empty() || dparts.len() > parts.len() {
        return false;
    }
    parts.windows(dparts.len()).any(|w| w == dparts.as_slice())
}

fn excluded_dir(name: &str) -> bool {
    EXCLUDE_DIR_HINTS.iter().any(|hint| name.contains(hint))
}

pub fn analyze_size(root: &Path, cfg: &SizeConfig, max_files: usize) -> Result<SizeStats> {
    let binaries = GlobList::new(&cfg.binary_globs)?;
    let models = GlobList::new(&cfg.model_globs)?;
    let samples = GlobList::new(&cfg.sample_globs)?;
    let threshold = cfg.large_threshold_kb * 1024;

    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(true)
        .git_ignore(true)
        .git_global(false)
        .git_exclude(true)
        .require_git(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir && entry.depth() > 0 && excluded_dir(&entry.file_name().to_string_lossy()))
        });

    let mut stats = SizeStats::default();
    for entry in builder.build().flatten() {
        let path = entry.path();
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if !SIZE_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }
        if stats.file_count >= max_files {
            stats.truncated = true;
            break;
        }
        let Some(rel) = relative_path(root, path) else {
            continue;
        };
        let bytes = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                debug!("Cannot stat {}: {}", rel, e);
                0
            }
        };

        stats.file_count += 1;
        stats.total_bytes += bytes;
        if ext == "py" {
            stats.py_bytes += bytes;
        }
        if bytes >= threshold {
            stats.large_files.push((rel.clone(), bytes));
        }
        if binaries.is_match(&rel) {
            stats.binaries.push(rel.clone());
        }
        if models.is_match(&rel) {
            stats.models.push(rel.clone());
        }
        if samples.is_match(&rel) {
            stats.samples.push(rel.clone());
        }
        if cfg.whitelist_dirs.iter().any(|d| path_has_dir(&rel, d)) {
            stats.whitelist_hits += 1;
        }
        if cfg.blacklist_dirs.iter().any(|d| path_has_dir(&rel, d)) {
            stats.blacklist_hits += 1;
        }
    }

    stats
        .large_files
        .sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    Ok(stats)
}

pub struct SizeMetric;

impl Metric for SizeMetric {
    fn key(&self) -> &'static str {
        "size"
    }

    fn run(&self, ctx: &HealthContext) -> Result<MetricResult> {
        let cfg = &ctx.config.size;
        let stats = analyze_size(ctx.root, cfg, ctx.config.health.max_files)?;
        let guide = ctx.write_report(GUIDE_FILE, &render_guide(&stats))?;

        let largest: Vec<String> = stats
            .large_files
            .iter()
            .take(LARGEST_SHOWN)
            .map(|(p, b)| format!("{}:{}KB", p, b / 1024))
            .collect();

        Ok(MetricResult {
            key: self.key().into(),
            score: stats.score(cfg),
            max_score: MAX_SCORE,
            summary: stats.summary(),
            details: Some(serde_json::json!({
                "largest": largest,
                "total_kb": stats.total_bytes / 1024,
                "guide": ctx.display_path(&guide),
            })),
        })
    }
}

fn render_guide(stats: &SizeStats) -> String {
    let mut md = String::from("# Model Artifact Externalization Guide (Git LFS / CI Artifacts)\n\n");
    md.push_str(
        "Large binaries, model weights and checkpoints slow down clones and bloat history.\n\
         Keep them out of the repository with Git LFS or CI artifacts.\n\n",
    );

    md.push_str("## 1) Git LFS (recommended)\n\n```bash\n");
    md.push_str("git lfs install\n");
    md.push_str("git lfs track \"*.pt\" \"*.onnx\" \"*.ckpt\" \"*.bin\" \"*.zip\" \"*.tar\" \"*.gz\"\n");
    md.push_str("git lfs track \"models/**\" \"checkpoints/**\"\n");
    md.push_str("git add .gitattributes models checkpoints\n");
    md.push_str("git commit -m \"chore(lfs): track model/checkpoint artifacts\"\n```\n\n");
    md.push_str("To migrate existing history (optional):\n\n```bash\n");
    md.push_str("git lfs migrate import --include=\"*.pt,*.onnx,*.ckpt,*.bin,*.zip,*.tar,*.gz,models/**,checkpoints/**\"\n```\n\n");

    md.push_str("## 2) GitHub Actions artifacts\n\n```yaml\n");
    md.push_str(
        "name: Artifacts\non: [push, workflow_dispatch]\njobs:\n  pack:\n    runs-on: ubuntu-latest\n    steps:\n      - uses: actions/checkout@v4\n      - uses: actions/upload-artifact@v4\n        with:\n          name: models-${{ github.sha }}\n          path: |\n            models/**\n            checkpoints/**\n          if-no-files-found: ignore\n",
    );
    md.push_str("```\n\n");

    md.push_str("## 3) Detected in this repository\n\n");
    for (label, items) in [
        ("Models", &stats.models),
        ("Binaries", &stats.binaries),
        ("Samples", &stats.samples),
    ] {
        md.push_str(&format!("**{}: {}**\n\n", label, items.len()));
        if items.is_empty() {
            md.push_str(" - (none)\n");
        }
        for item in items.iter().take(GUIDE_LIST_LIMIT) {
            md.push_str(&format!(" - {}\n", item));
        }
        md.push('\n');
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_path_has_dir_segments() {
        assert!(path_has_dir("models/v1/w.pt", "models"));
        assert!(path_has_dir("a/data/raw/x.bin", "data/raw"));
        assert!(!path_has_dir("mymodels/w.pt", "models"));
        assert!(!path_has_dir("w.pt", "models/v1"));
    }

    #[test]
    fn test_score_penalties() {
        let cfg = SizeConfig::default();
        let clean = SizeStats::default();
        assert_eq!(clean.score(&cfg), 10.0);

        let heavy = SizeStats {
            large_files: (0..8).map(|i| (format!("f{}", i), 1)).collect(),
            binaries: vec!["a.bin".into(); 3],
            ..Default::default()
        };
        // (8 - 5) + 3 * 0.2
        assert_eq!(heavy.score(&cfg), 6.4);

        let blacklisted = SizeStats {
            blacklist_hits: 50,
            ..heavy.clone()
        };
        // penalty doubled
        assert_eq!(blacklisted.score(&cfg), 2.8);

        let whitelisted = SizeStats {
            whitelist_hits: 500,
            ..heavy
        };
        // penalty halved
        assert_eq!(whitelisted.score(&cfg), 8.2);
    }

    #[test]
    fn test_walk_classifies_and_skips_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("models")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("models/w.pt"), vec![0u8; 2048]).unwrap();
        fs::write(root.join("app.py"), "print(1)\n").unwrap();
        fs::write(root.join("blob.bin"), vec![0u8; 300 * 1024]).unwrap();
        fs::write(root.join("node_modules/pkg/x.json"), "{}").unwrap();
        fs::write(root.join("image.png"), "png").unwrap();

        let stats = analyze_size(root, &SizeConfig::default(), 2000).unwrap();
        assert_eq!(stats.file_count, 3);
        assert_eq!(stats.models, vec!["models/w.pt"]);
        assert_eq!(stats.binaries, vec!["blob.bin"]);
        assert_eq!(stats.large_files.len(), 1);
        assert_eq!(stats.whitelist_hits, 1);
        assert!(stats.summary().starts_with("files=3, py=0KB, large=1, bin=1, mdl=1"));
    }

    #[test]
    fn test_walk_cap_truncates() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..4 {
            fs::write(dir.path().join(format!("f{}.py", i)), "").unwrap();
        }
        let stats = analyze_size(dir.path(), &SizeConfig::default(), 2).unwrap();
        assert_eq!(stats.file_count, 2);
        assert!(stats.truncated);
    }
}
