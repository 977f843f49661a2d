//! Analysis pipelines
//!
//! Orchestrates the two runs the CLI exposes:
//! 1. Feature map: enumerate candidates, extract hits, link edges
//! 2. Health: enumerate candidates, run the metric registry, aggregate
//!
//! Missing or broken policy/profile documents degrade to warnings and
//! permissive defaults; only I/O on the repository root itself is fatal.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use crate::cache::{cache_dir_under, get_tag_store_path, TagCache, TAG_STORE_FILE};
use crate::config::{load_policy, load_profile, load_project_config, Policy, Profile, ProjectConfig};
use crate::discovery::{Enumerator, Manifest};
use crate::extract::{EngineChoice, Extractor};
use crate::graph::link_edges;
use crate::metrics::{HealthContext, MetricRegistry};
use crate::models::{CandidateFile, FeatureMap};
use crate::reporters::{render_feature_map, OutputFormat};
use crate::scoring::{aggregate, HealthReport};

pub const FEATURE_MAP_STEM: &str = "feature_map";
pub const DEFAULT_ARTIFACT_DIR: &str = "artifacts";
pub const HEALTH_JSON: &str = "health.json";

/// One repository opened for analysis: root, project config and tag cache
pub struct Workspace {
    pub root: PathBuf,
    pub config: ProjectConfig,
    pub cache: TagCache,
}

impl Workspace {
    /// Open `root`; `cache_base` overrides the per-user cache directory
    pub fn open(root: &Path, cache_base: Option<&Path>) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("Path does not exist: {}", root.display()))?;
        anyhow::ensure!(root.is_dir(), "Not a directory: {}", root.display());

        let store_path = match cache_base {
            Some(base) => cache_dir_under(base, &root).join(TAG_STORE_FILE),
            None => get_tag_store_path(&root),
        };
        Ok(Self::with_store(root, &store_path))
    }

    /// Open with an explicit tag-store location
    pub fn with_store(root: PathBuf, store_path: &Path) -> Self {
        let config = load_project_config(&root);
        let cache = TagCache::open(&root, store_path);
        Self {
            root,
            config,
            cache,
        }
    }

    /// Load a policy document; problems become a warning and no policy
    pub fn policy(&self, path: Option<&Path>) -> Option<Policy> {
        let path = path?;
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        match load_policy(&path) {
            Ok(policy) => {
                info!("Loaded policy from {}", path.display());
                Some(policy)
            }
            Err(e) => {
                warn!("{}; continuing without a policy", e);
                None
            }
        }
    }

    /// Load a named profile; problems become a warning and the manifest
    pub fn profile(&self, name: Option<&str>) -> Option<Profile> {
        let name = name?;
        let path = self.config.profiles_path(&self.root);
        match load_profile(&path, name) {
            Ok(profile) => {
                info!("Using profile '{}'", profile.name);
                Some(profile)
            }
            Err(e) => {
                warn!("{}; falling back to the built-in manifest", e);
                None
            }
        }
    }

    /// Candidate files for this run
    ///
    /// Invalid globs in the profile or policy are warned about and that
    /// document's filtering is skipped.
    pub fn candidates(&self, profile: Option<&Profile>, policy: Option<&Policy>) -> Vec<CandidateFile> {
        let manifest = Manifest::from_config(&self.config.discovery);
        let enumerator = Enumerator::new(&self.root, &manifest)
            .with_profile(profile)
            .with_policy(policy);
        match enumerator.enumerate() {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("{}; enumerating without profile and policy filters", e);
                Enumerator::new(&self.root, &manifest)
                    .enumerate()
                    .unwrap_or_default()
            }
        }
    }

    /// Persist the tag cache; failures only cost the next run a rebuild
    pub fn flush_cache(&self) {
        if let Err(e) = self.cache.flush() {
            warn!("Failed to save tag cache: {:#}", e);
        }
    }
}

/// Options of a feature-map run
#[derive(Debug, Clone, Default)]
pub struct MapOptions {
    pub policy: Option<PathBuf>,
    pub profile: Option<String>,
    pub engine: EngineChoice,
    pub workers: Option<usize>,
}

/// Build the feature map of `ws` and flush the tag cache
pub fn build_feature_map(ws: &Workspace, opts: &MapOptions) -> Result<FeatureMap> {
    let start = Instant::now();
    let policy = ws.policy(opts.policy.as_deref());
    let profile = ws.profile(opts.profile.as_deref());

    let candidates = ws.candidates(profile.as_ref(), policy.as_ref());
    let hits = Extractor::new(&ws.root, &ws.cache)
        .workers(ws.config.effective_workers(opts.workers))
        .engine(opts.engine)
        .external_threshold(ws.config.scan.external_threshold)
        .tag_defaults(profile.as_ref().map(|p| &p.tag_defaults))
        .policy(policy.as_ref())
        .extract(&candidates)?;
    let edges = link_edges(&hits, policy.as_ref());

    ws.flush_cache();
    let stats = ws.cache.stats();
    info!(
        "Feature map: {} candidates, {} hits, {} edges, cache hit rate {} in {}ms",
        candidates.len(),
        hits.len(),
        edges.len(),
        stats.hit_rate,
        start.elapsed().as_millis()
    );

    Ok(FeatureMap {
        root: ws.root.to_string_lossy().to_string(),
        hits,
        edges,
    })
}

/// Write `feature_map.json` and `.md` (and `.html` when asked) into `out_dir`
pub fn save_feature_map(map: &FeatureMap, out_dir: &Path, html: bool) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut formats = vec![OutputFormat::Json, OutputFormat::Markdown];
    if html {
        formats.push(OutputFormat::Html);
    }

    let mut written = Vec::new();
    for format in formats {
        let path = out_dir.join(format!(
            "{}.{}",
            FEATURE_MAP_STEM,
            crate::reporters::file_extension(format)
        ));
        let content = render_feature_map(map, format)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// Options of a health run
#[derive(Debug, Clone, Default)]
pub struct HealthOptions {
    /// Comma list of metric keys, `basic`, or empty for all
    pub focus: String,
    pub profile: Option<String>,
    pub max_files: Option<usize>,
    pub max_seconds: Option<u64>,
}

/// Run the selected metrics over `ws` and aggregate them
pub fn run_health(ws: &Workspace, opts: &HealthOptions) -> HealthReport {
    let start = Instant::now();
    let mut config = ws.config.clone();
    if let Some(max_files) = opts.max_files {
        config.health.max_files = max_files;
        config.imports.max_files = max_files.min(config.imports.max_files);
    }
    if let Some(max_seconds) = opts.max_seconds {
        config.imports.max_seconds = max_seconds;
    }

    let profile = ws.profile(opts.profile.as_deref());
    let candidates = ws.candidates(profile.as_ref(), None);

    let registry = MetricRegistry::builtin(&config).focus(&opts.focus);
    let weights = registry.weights();
    let ctx = HealthContext {
        root: &ws.root,
        candidates: &candidates,
        cache: &ws.cache,
        config: &config,
        report_dir: config.report_dir(&ws.root),
    };
    let run = registry.run_all(&ctx);
    ws.flush_cache();

    info!(
        "Health run over {} candidates finished in {}ms",
        candidates.len(),
        start.elapsed().as_millis()
    );
    aggregate(ws.root.clone(), run, &weights)
}
