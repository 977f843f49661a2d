//! Metric analyzers and their registry
//!
//! Each analyzer implements [`Metric`] and is registered with a weight in a
//! [`MetricRegistry`] built explicitly at startup. Running the registry never
//! fails as a whole: an analyzer that errors or panics becomes a
//! [`MetricFailure`] while the rest still report.
//!
//! Analyzers share the enumerated candidate set through [`HealthContext`]
//! and write a human-readable artifact into the report directory.

mod complexity;
mod debt;
mod import;
mod size;
mod style;

pub use complexity::{analyze_source, ComplexityMetric, FunctionStats};
pub use debt::{file_issues, scan_debt, DebtFinding, DebtMetric, DEBT_REPORT};
pub use import::{ImportMetric, CYCLE_REPORT};
pub use size::{SizeMetric, SizeStats, GUIDE_FILE};
pub use style::{StyleMetric, STYLE_REPORT};

use crate::cache::TagCache;
use crate::config::ProjectConfig;
use crate::models::CandidateFile;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Points shared by all selected metrics
pub const HEALTH_CAP: f64 = 100.0;

/// Default weights, in registration order
pub const DEFAULT_WEIGHTS: &[(&str, f64)] = &[
    ("complexity", 25.0),
    ("debt", 15.0),
    ("size", 20.0),
    ("import", 25.0),
    ("style", 15.0),
];

/// Keys of the `basic` focus preset
pub const BASIC_FOCUS: &[&str] = &["size", "import", "debt"];

/// Outcome of one analyzer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricResult {
    pub key: String,
    pub score: f64,
    pub max_score: f64,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl MetricResult {
    /// Clamp the score into `0..=max_score`
    fn clamped(mut self) -> Self {
        if !self.score.is_finite() {
            self.score = 0.0;
        }
        self.score = self.score.clamp(0.0, self.max_score.max(0.0));
        self
    }
}

/// An analyzer that failed or panicked
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricFailure {
    pub key: String,
    pub error: String,
}

/// Inputs shared by all analyzers of one run
pub struct HealthContext<'a> {
    pub root: &'a Path,
    pub candidates: &'a [CandidateFile],
    pub cache: &'a TagCache,
    pub config: &'a ProjectConfig,
    pub report_dir: PathBuf,
}

impl HealthContext<'_> {
    /// Candidates passing the per-file size cap, up to the file cap
    ///
    /// Returns the selected files and whether the file cap cut the list.
    pub fn content_files<'c>(&'c self, extensions: &[&str]) -> (Vec<&'c CandidateFile>, bool) {
        let max_bytes = self.config.health.max_file_kb * 1024;
        let mut selected = Vec::new();
        let mut truncated = false;
        for candidate in self.candidates {
            let ext = candidate.rel_path.rsplit('.').next().unwrap_or("");
            if !extensions.contains(&ext) {
                continue;
            }
            if candidate.size > max_bytes {
                debug!("Skipping large file {} ({} bytes)", candidate.rel_path, candidate.size);
                continue;
            }
            if selected.len() >= self.config.health.max_files {
                truncated = true;
                break;
            }
            selected.push(candidate);
        }
        (selected, truncated)
    }

    /// Write an artifact into the report directory
    pub fn write_report(&self, name: &str, content: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.report_dir)
            .with_context(|| format!("Failed to create {}", self.report_dir.display()))?;
        let path = self.report_dir.join(name);
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Report path as shown to users, relative to the repo when possible
    pub fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

/// A scored health check
pub trait Metric: Send + Sync {
    fn key(&self) -> &'static str;

    fn run(&self, ctx: &HealthContext) -> Result<MetricResult>;
}

/// A registered analyzer and its weight
pub struct MetricSpec {
    pub key: String,
    pub weight: f64,
    pub analyzer: Box<dyn Metric>,
}

/// Results and failures of one registry run, in registration order
#[derive(Debug, Default)]
pub struct HealthRun {
    pub results: Vec<MetricResult>,
    pub failures: Vec<MetricFailure>,
}

/// Ordered analyzer registry
#[derive(Default)]
pub struct MetricRegistry {
    specs: Vec<MetricSpec>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All built-in analyzers, weights overridden by `[health] weights`
    pub fn builtin(config: &ProjectConfig) -> Self {
        let mut registry = Self::new();
        for (key, default_weight) in DEFAULT_WEIGHTS {
            let weight = config
                .health
                .weights
                .get(*key)
                .copied()
                .unwrap_or(*default_weight);
            let analyzer: Box<dyn Metric> = match *key {
                "complexity" => Box::new(ComplexityMetric),
                "debt" => Box::new(DebtMetric),
                "size" => Box::new(SizeMetric),
                "import" => Box::new(ImportMetric),
                _ => Box::new(StyleMetric),
            };
            registry.register(weight, analyzer);
        }
        for key in config.health.weights.keys() {
            if !DEFAULT_WEIGHTS.iter().any(|(k, _)| k == key) {
                warn!("Ignoring weight for unknown metric '{}'", key);
            }
        }
        registry
    }

    /// Register an analyzer; a second registration of a key replaces the first
    pub fn register(&mut self, weight: f64, analyzer: Box<dyn Metric>) {
        let key = analyzer.key().to_string();
        let spec = MetricSpec {
            key: key.clone(),
            weight: weight.max(0.0),
            analyzer,
        };
        match self.specs.iter_mut().find(|s| s.key == key) {
            Some(existing) => *existing = spec,
            None => self.specs.push(spec),
        }
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.key.as_str()).collect()
    }

    pub fn weights(&self) -> BTreeMap<String, f64> {
        self.specs.iter().map(|s| (s.key.clone(), s.weight)).collect()
    }

    /// Keep only the focused metrics and rescale their weights to [`HEALTH_CAP`]
    ///
    /// An empty focus selects everything; `basic` is a preset. Unknown keys
    /// are warned about and ignored.
    pub fn focus(mut self, focus: &str) -> Self {
        let focus = focus.trim();
        let wanted: Vec<String> = if focus.is_empty() || focus == "all" {
            self.specs.iter().map(|s| s.key.clone()).collect()
        } else if focus == "basic" {
            BASIC_FOCUS.iter().map(|s| s.to_string()).collect()
        } else {
            focus
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };

        for key in &wanted {
            if !self.specs.iter().any(|s| &s.key == key) {
                warn!("Unknown metric '{}' in focus, ignoring", key);
            }
        }
        self.specs.retain(|s| wanted.contains(&s.key));

        let total: f64 = self.specs.iter().map(|s| s.weight).sum();
        if total > 0.0 {
            for spec in &mut self.specs {
                spec.weight = spec.weight / total * HEALTH_CAP;
            }
        }
        self
    }

    /// Run every analyzer; failures and panics are collected, never raised
    pub fn run_all(&self, ctx: &HealthContext) -> HealthRun {
        let mut run = HealthRun::default();

        for spec in &self.specs {
            let start = Instant::now();
            debug!("Running metric: {}", spec.key);

            let outcome =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| spec.analyzer.run(ctx)));

            match outcome {
                Ok(Ok(result)) => {
                    info!(
                        "Metric {} scored {:.2}/{} in {}ms",
                        spec.key,
                        result.score,
                        result.max_score,
                        start.elapsed().as_millis()
                    );
                    run.results.push(result.clamped());
                }
                Ok(Err(e)) => {
                    warn!("Metric {} failed: {:#}", spec.key, e);
                    run.failures.push(MetricFailure {
                        key: spec.key.clone(),
                        error: format!("{:#}", e),
                    });
                }
                Err(panic_info) => {
                    let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    error!("Metric {} panicked: {}", spec.key, panic_msg);
                    run.failures.push(MetricFailure {
                        key: spec.key.clone(),
                        error: format!("Panic: {}", panic_msg),
                    });
                }
            }
        }

        run
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    struct Fixed(&'static str, f64);

    impl Metric for Fixed {
        fn key(&self) -> &'static str {
            self.0
        }

        fn run(&self, _ctx: &HealthContext) -> Result<MetricResult> {
            Ok(MetricResult {
                key: self.0.into(),
                score: self.1,
                max_score: 10.0,
                summary: String::new(),
                details: None,
            })
        }
    }

    struct Failing;

    impl Metric for Failing {
        fn key(&self) -> &'static str {
            "failing"
        }

        fn run(&self, _ctx: &HealthContext) -> Result<MetricResult> {
            anyhow::bail!("disk on fire")
        }
    }

    struct Panicking;

    impl Metric for Panicking {
        fn key(&self) -> &'static str {
            "panicking"
        }

        fn run(&self, _ctx: &HealthContext) -> Result<MetricResult> {
            panic!("analyzer bug")
        }
    }

    /// Run `f` with a context over an empty candidate set in a temp dir
    pub(crate) fn with_context<R>(
        candidates: &[CandidateFile],
        root: &Path,
        f: impl FnOnce(&HealthContext) -> R,
    ) -> R {
        let config = ProjectConfig::default();
        let cache = TagCache::open(root, &root.join(".cache").join("tags.bin"));
        let ctx = HealthContext {
            root,
            candidates,
            cache: &cache,
            config: &config,
            report_dir: root.join("health_reports"),
        };
        f(&ctx)
    }

    #[test]
    fn test_failures_do_not_stop_other_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = MetricRegistry::new();
        registry.register(10.0, Box::new(Fixed("a", 7.0)));
        registry.register(10.0, Box::new(Failing));
        registry.register(10.0, Box::new(Panicking));
        registry.register(10.0, Box::new(Fixed("b", 3.0)));

        let run = with_context(&[], dir.path(), |ctx| registry.run_all(ctx));

        let keys: Vec<&str> = run.results.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(run.failures.len(), 2);
        assert!(run.failures[0].error.contains("disk on fire"));
        assert!(run.failures[1].error.starts_with("Panic:"));
    }

    #[test]
    fn test_scores_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = MetricRegistry::new();
        registry.register(10.0, Box::new(Fixed("high", 42.0)));
        registry.register(10.0, Box::new(Fixed("low", -3.0)));

        let run = with_context(&[], dir.path(), |ctx| registry.run_all(ctx));
        assert_eq!(run.results[0].score, 10.0);
        assert_eq!(run.results[1].score, 0.0);
    }

    #[test]
    fn test_focus_basic_rescales_weights() {
        let registry = MetricRegistry::builtin(&ProjectConfig::default()).focus("basic");
        assert_eq!(registry.keys(), vec!["debt", "size", "import"]);
        let total: f64 = registry.weights().values().sum();
        assert!((total - HEALTH_CAP).abs() < 1e-9);
        // 25 of 60 points
        assert!((registry.weights()["import"] - 25.0 / 60.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_focus_empty_keeps_all_and_unknown_ignored() {
        let all = MetricRegistry::builtin(&ProjectConfig::default()).focus("");
        assert_eq!(all.len(), 5);

        let some = MetricRegistry::builtin(&ProjectConfig::default()).focus("style, bogus");
        assert_eq!(some.keys(), vec!["style"]);
        assert_eq!(some.weights()["style"], HEALTH_CAP);
    }

    #[test]
    fn test_register_replaces_existing_key() {
        let mut registry = MetricRegistry::new();
        registry.register(5.0, Box::new(Fixed("a", 1.0)));
        registry.register(9.0, Box::new(Fixed("a", 2.0)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.weights()["a"], 9.0);
    }
}
