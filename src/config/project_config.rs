//! Project-level configuration support
//!
//! Loads per-project configuration from `repolens.toml` in the repository
//! root. Every section and field is optional.
//!
//! # Configuration Format
//!
//! ```toml
//! # repolens.toml
//!
//! [discovery]
//! manifest = ["main.py", "api/routers/*.py"]
//! hot_directories = { api = ["**/*.py"], tests = ["test_*.py"] }
//! profiles_path = "profiles.yaml"
//!
//! [scan]
//! workers = 4
//! external_threshold = 50
//!
//! [imports]
//! internal_prefixes = ["app", "tools"]
//! max_files = 300
//! max_seconds = 20
//!
//! [health]
//! weights = { complexity = 25, debt = 15, size = 20, import = 25, style = 15 }
//! report_dir = "health_reports"
//!
//! [complexity]
//! max_function_lines = 80
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CONFIG_FILE_NAME: &str = "repolens.toml";

/// Candidate enumeration overrides
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Replaces the built-in manifest of core entrypoints
    pub manifest: Option<Vec<String>>,
    /// Replaces the built-in hot-directory table
    pub hot_directories: Option<BTreeMap<String, Vec<String>>>,
    pub profiles_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Worker threads for the in-process scanner (0 = min(4, cores))
    pub workers: usize,
    /// Candidate count at or above which `auto` prefers the external search tool
    pub external_threshold: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            external_threshold: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportsConfig {
    /// Module prefixes considered internal for cycle detection
    /// (empty = every module that maps to a scanned file)
    pub internal_prefixes: Vec<String>,
    pub max_files: usize,
    pub max_seconds: u64,
}

impl Default for ImportsConfig {
    fn default() -> Self {
        Self {
            internal_prefixes: Vec::new(),
            max_files: 300,
            max_seconds: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub weights: BTreeMap<String, f64>,
    pub report_dir: PathBuf,
    /// Files above this size are skipped by full-content analyzers
    pub max_file_kb: u64,
    /// Upper bound on files scanned by any single analyzer
    pub max_files: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            weights: BTreeMap::new(),
            report_dir: PathBuf::from("health_reports"),
            max_file_kb: 200,
            max_files: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SizeConfig {
    pub large_threshold_kb: u64,
    pub large_allow: usize,
    pub total_soft_cap_mb: u64,
    pub binary_globs: Vec<String>,
    pub model_globs: Vec<String>,
    pub sample_globs: Vec<String>,
    pub whitelist_dirs: Vec<String>,
    pub blacklist_dirs: Vec<String>,
}

impl Default for SizeConfig {
    fn default() -> Self {
        Self {
            large_threshold_kb: 200,
            large_allow: 5,
            total_soft_cap_mb: 10,
            binary_globs: vec![
                "**/*.bin".into(),
                "**/*.zip".into(),
                "**/*.tar".into(),
                "**/*.gz".into(),
            ],
            model_globs: vec![
                "**/*.pt".into(),
                "**/*.onnx".into(),
                "**/*.ckpt".into(),
                "models/**".into(),
                "checkpoints/**".into(),
            ],
            sample_globs: vec!["samples/**".into(), "**/fixtures/**".into()],
            whitelist_dirs: vec!["models".into(), "checkpoints".into()],
            blacklist_dirs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComplexityConfig {
    pub max_function_lines: usize,
    pub max_nesting: usize,
    pub max_cyclomatic: u32,
}

impl Default for ComplexityConfig {
    fn default() -> Self {
        Self {
            max_function_lines: 80,
            max_nesting: 4,
            max_cyclomatic: 10,
        }
    }
}

/// Complete project configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub discovery: DiscoveryConfig,
    pub scan: ScanConfig,
    pub imports: ImportsConfig,
    pub health: HealthConfig,
    pub size: SizeConfig,
    pub complexity: ComplexityConfig,
}

impl ProjectConfig {
    /// Worker count for the in-process scanner
    pub fn effective_workers(&self, cli_workers: Option<usize>) -> usize {
        let requested = cli_workers.unwrap_or(self.scan.workers);
        if requested > 0 {
            return requested;
        }
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        cores.min(4)
    }

    /// Path of the profiles document, relative paths resolved against the repo
    pub fn profiles_path(&self, repo_path: &Path) -> PathBuf {
        let configured = self
            .discovery
            .profiles_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("profiles.yaml"));
        if configured.is_absolute() {
            configured
        } else {
            repo_path.join(configured)
        }
    }

    /// Directory that receives analyzer report artifacts
    pub fn report_dir(&self, repo_path: &Path) -> PathBuf {
        if self.health.report_dir.is_absolute() {
            self.health.report_dir.clone()
        } else {
            repo_path.join(&self.health.report_dir)
        }
    }
}

/// Load project configuration, falling back to defaults on any problem
pub fn load_project_config(repo_path: &Path) -> ProjectConfig {
    let toml_path = repo_path.join(CONFIG_FILE_NAME);
    if !toml_path.exists() {
        debug!("No {} found, using defaults", CONFIG_FILE_NAME);
        return ProjectConfig::default();
    }

    match load_toml_config(&toml_path) {
        Ok(config) => {
            debug!("Loaded project config from {}", toml_path.display());
            config
        }
        Err(e) => {
            warn!("Failed to load {}: {}", toml_path.display(), e);
            ProjectConfig::default()
        }
    }
}

fn load_toml_config(path: &Path) -> anyhow::Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ProjectConfig = toml::from_str(&content)?;
    Ok(config)
}
