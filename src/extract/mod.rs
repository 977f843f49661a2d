//! Pattern Extraction Engine
//!
//! Classifies source lines into feature kinds. A single raw scan pass runs
//! every pattern over every candidate line; kind buckets are then derived
//! from the raw matches by discriminator patterns.
//!
//! Two interchangeable engines produce the raw matches:
//! - [`InProcessScanner`] reads files on a bounded rayon pool
//! - [`RipgrepScanner`] delegates to `rg`, restricted to the candidate set
//!
//! Both yield the same raw hits for the same input; raw hits are sorted
//! before bucketing so downstream output never depends on the engine or on
//! worker scheduling.

mod enrich;
mod in_process;
pub mod patterns;
mod ripgrep;

pub use enrich::enrich;
pub use in_process::InProcessScanner;
pub use patterns::PatternTable;
pub use ripgrep::{rg_available, RipgrepScanner};

use crate::cache::TagCache;
use crate::config::Policy;
use crate::models::{CandidateFile, Hit, Tags};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

/// One (file, line, pattern) match before kind bucketing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHit {
    pub file: String,
    pub line: u32,
    pub text: String,
    /// Index into [`PatternTable::patterns`]
    pub pattern: usize,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("ripgrep (rg) is not available on PATH")]
    ToolMissing,

    #[error("failed to spawn ripgrep: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("ripgrep exited with {code:?}: {stderr}")]
    ToolFailed { code: Option<i32>, stderr: String },

    #[error("failed to build scan worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// A raw-match producer over a candidate set
pub trait ScanEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn scan(
        &self,
        root: &Path,
        candidates: &[CandidateFile],
        table: &PatternTable,
    ) -> Result<Vec<RawHit>, ScanError>;
}

/// Requested scan strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineChoice {
    #[default]
    Auto,
    InProcess,
    External,
}

impl FromStr for EngineChoice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(EngineChoice::Auto),
            "in-process" | "inprocess" | "python" => Ok(EngineChoice::InProcess),
            "external" | "rg" | "ripgrep" => Ok(EngineChoice::External),
            _ => Err(anyhow::anyhow!(
                "Unknown engine '{}'. Valid engines: auto, in-process, external",
                s
            )),
        }
    }
}

impl std::fmt::Display for EngineChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineChoice::Auto => write!(f, "auto"),
            EngineChoice::InProcess => write!(f, "in-process"),
            EngineChoice::External => write!(f, "external"),
        }
    }
}

impl EngineChoice {
    /// Whether the external engine should run for this candidate set
    pub fn wants_external(self, candidate_count: usize, threshold: usize, rg: bool) -> bool {
        match self {
            EngineChoice::Auto => rg && candidate_count >= threshold,
            EngineChoice::InProcess => false,
            EngineChoice::External => true,
        }
    }
}

/// Builder-style extraction driver
pub struct Extractor<'a> {
    root: &'a Path,
    cache: &'a TagCache,
    workers: usize,
    engine: EngineChoice,
    external_threshold: usize,
    tag_defaults: Option<&'a Tags>,
    policy: Option<&'a Policy>,
}

impl<'a> Extractor<'a> {
    pub fn new(root: &'a Path, cache: &'a TagCache) -> Self {
        Self {
            root,
            cache,
            workers: 1,
            engine: EngineChoice::Auto,
            external_threshold: 50,
            tag_defaults: None,
            policy: None,
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn engine(mut self, engine: EngineChoice) -> Self {
        self.engine = engine;
        self
    }

    pub fn external_threshold(mut self, threshold: usize) -> Self {
        self.external_threshold = threshold;
        self
    }

    pub fn tag_defaults(mut self, defaults: Option<&'a Tags>) -> Self {
        self.tag_defaults = defaults;
        self
    }

    pub fn policy(mut self, policy: Option<&'a Policy>) -> Self {
        self.policy = policy;
        self
    }

    /// Produce the sorted, policy-filtered hit list for `candidates`
    pub fn extract(&self, candidates: &[CandidateFile]) -> anyhow::Result<Vec<Hit>> {
        let table = PatternTable::builtin();
        let mut raw = self.scan_raw(candidates, table)?;
        raw.sort_by(|a, b| {
            (a.file.as_str(), a.line, a.pattern).cmp(&(b.file.as_str(), b.line, b.pattern))
        });
        raw.dedup();
        debug!("{} raw matches", raw.len());

        let tags = self.lookup_tags(candidates)?;
        let empty = Tags::default();

        let mut hits = Vec::new();
        let mut dropped = 0usize;
        for raw_hit in &raw {
            let file_tags = tags.get(raw_hit.file.as_str()).unwrap_or(&empty);
            let mut snapshot = match self.tag_defaults {
                Some(defaults) => file_tags.clone().with_defaults(defaults),
                None => file_tags.clone(),
            };

            let kinds = table.kinds_for(&raw_hit.text);
            if let Some(policy) = self.policy {
                if !policy.allows_tags(&snapshot) {
                    dropped += kinds.len();
                    continue;
                }
                // Display only; checked after the owner requirement
                if snapshot.owner.is_none() {
                    snapshot.owner = policy.default_owner.clone();
                }
            }

            for kind in kinds {
                let mut meta = BTreeMap::new();
                meta.insert(
                    "pattern".to_string(),
                    table.patterns[raw_hit.pattern].source.to_string(),
                );
                enrich(kind, &raw_hit.text, &mut meta);
                hits.push(Hit {
                    kind,
                    file: raw_hit.file.clone(),
                    line: raw_hit.line,
                    text: raw_hit.text.clone(),
                    meta,
                    tags: snapshot.clone(),
                });
            }
        }

        if dropped > 0 {
            info!("Policy dropped {} hits", dropped);
        }
        hits.sort_by(|a, b| (a.file.as_str(), a.line).cmp(&(b.file.as_str(), b.line)));
        Ok(hits)
    }

    fn scan_raw(
        &self,
        candidates: &[CandidateFile],
        table: &PatternTable,
    ) -> anyhow::Result<Vec<RawHit>> {
        let in_process = InProcessScanner::new(self.workers);
        let use_external =
            self.engine
                .wants_external(candidates.len(), self.external_threshold, rg_available());

        if use_external {
            let external = RipgrepScanner;
            info!("Scanning {} files with {}", candidates.len(), external.name());
            match external.scan(self.root, candidates, table) {
                Ok(raw) => return Ok(raw),
                Err(e) => warn!("External scan failed, falling back to in-process: {}", e),
            }
        }

        info!(
            "Scanning {} files with {} ({} workers)",
            candidates.len(),
            in_process.name(),
            self.workers
        );
        Ok(in_process.scan(self.root, candidates, table)?)
    }

    /// Tags for every candidate; files without hits are cached too
    fn lookup_tags<'b>(
        &self,
        candidates: &'b [CandidateFile],
    ) -> anyhow::Result<FxHashMap<&'b str, Tags>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()?;
        let cache = self.cache;
        let pairs: Vec<(&'b str, Tags)> = pool.install(|| {
            candidates
                .par_iter()
                .map(|c| (c.rel_path.as_str(), cache.get_tags(&c.abs_path)))
                .collect()
        });
        Ok(pairs.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::candidate_for;
    use crate::models::HitKind;
    use std::fs;

    fn fixture() -> (tempfile::TempDir, Vec<CandidateFile>) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("server.py"),
            "# @expose\nfrom fastapi import APIRouter\nrouter = APIRouter(prefix=\"/v1\")\n\n@router.get(\"/ping\")\ndef handle(request):\n    return 'pong'\n",
        )
        .unwrap();
        fs::write(
            root.join("cli.py"),
            "import argparse\n\nif __name__ == \"__main__\":\n    parser = argparse.ArgumentParser()\n",
        )
        .unwrap();
        let candidates = ["cli.py", "server.py"]
            .iter()
            .map(|rel| candidate_for(root, &root.join(rel)).unwrap())
            .collect();
        (dir, candidates)
    }

    /// Base fixture plus a NUL-bearing file and a file with invalid UTF-8
    fn fixture_with_raw_bytes() -> (tempfile::TempDir, Vec<CandidateFile>) {
        let (dir, mut candidates) = fixture();
        let root = dir.path();
        fs::write(root.join("blob.py"), b"\x00\x01\n@router.get(\"/bin\")\n").unwrap();
        fs::write(
            root.join("latin.py"),
            b"@router.get(\xff)\r\n@router.post(\"/caf\xe9\")\r\n",
        )
        .unwrap();
        for rel in ["blob.py", "latin.py"] {
            candidates.push(candidate_for(root, &root.join(rel)).unwrap());
        }
        (dir, candidates)
    }

    #[test]
    fn test_in_process_scans_raw_bytes() {
        let (dir, candidates) = fixture_with_raw_bytes();
        let hits = InProcessScanner::new(2)
            .scan(dir.path(), &candidates, PatternTable::builtin())
            .unwrap();

        let blob: Vec<_> = hits.iter().filter(|h| h.file == "blob.py").collect();
        assert_eq!(blob.len(), 1);
        assert_eq!(blob[0].line, 2);

        let latin: Vec<_> = hits.iter().filter(|h| h.file == "latin.py").collect();
        assert_eq!(latin.len(), 1);
        assert_eq!(latin[0].line, 2);
        assert_eq!(latin[0].text, "@router.post(\"/caf\u{fffd}\")");
    }

    #[test]
    fn test_extract_buckets_and_meta() {
        let (dir, candidates) = fixture();
        let cache = TagCache::open(dir.path(), &dir.path().join("cache.bin"));
        let hits = Extractor::new(dir.path(), &cache)
            .engine(EngineChoice::InProcess)
            .extract(&candidates)
            .unwrap();

        let route = hits
            .iter()
            .find(|h| h.kind == HitKind::Route && h.meta.contains_key("method"))
            .expect("route hit");
        assert_eq!(route.meta["method"], "GET");
        assert_eq!(route.meta["path"], "/ping");
        assert!(route.tags.expose);

        let cli: Vec<_> = hits.iter().filter(|h| h.kind == HitKind::Cli).collect();
        // the bare `import argparse` line matches no raw pattern
        assert_eq!(cli.len(), 2);
        assert!(cli
            .iter()
            .all(|h| h.meta.get("cli").map_or(true, |v| v == "argparse")));
        assert!(cli.iter().any(|h| !h.meta.contains_key("cli")));
    }

    #[test]
    fn test_hits_sorted_by_file_and_line() {
        let (dir, candidates) = fixture();
        let cache = TagCache::open(dir.path(), &dir.path().join("cache.bin"));
        let hits = Extractor::new(dir.path(), &cache)
            .workers(4)
            .engine(EngineChoice::InProcess)
            .extract(&candidates)
            .unwrap();
        let keys: Vec<(String, u32)> = hits.iter().map(|h| (h.file.clone(), h.line)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_policy_drops_unexposed_but_caches_tags() {
        let (dir, candidates) = fixture();
        let cache = TagCache::open(dir.path(), &dir.path().join("cache.bin"));
        let mut policy = Policy::default();
        policy.tags.require_expose = true;

        let hits = Extractor::new(dir.path(), &cache)
            .engine(EngineChoice::InProcess)
            .policy(Some(&policy))
            .extract(&candidates)
            .unwrap();

        assert!(hits.iter().all(|h| h.file == "server.py"));
        assert!(cache.contains(&dir.path().join("cli.py")));
    }

    #[test]
    fn test_tag_defaults_fill_snapshot_only() {
        let (dir, candidates) = fixture();
        let cache = TagCache::open(dir.path(), &dir.path().join("cache.bin"));
        let defaults = Tags {
            expose: false,
            owner: Some("platform".into()),
            maturity: None,
        };
        let hits = Extractor::new(dir.path(), &cache)
            .engine(EngineChoice::InProcess)
            .tag_defaults(Some(&defaults))
            .extract(&candidates)
            .unwrap();

        assert!(hits.iter().all(|h| h.tags.owner.as_deref() == Some("platform")));
        assert!(cache.get_tags(&dir.path().join("cli.py")).owner.is_none());
    }

    #[test]
    fn test_policy_default_owner_fills_missing_owner() {
        let (dir, candidates) = fixture();
        let cache = TagCache::open(dir.path(), &dir.path().join("cache.bin"));
        let policy = Policy {
            default_owner: Some("platform".into()),
            ..Policy::default()
        };
        let hits = Extractor::new(dir.path(), &cache)
            .engine(EngineChoice::InProcess)
            .policy(Some(&policy))
            .extract(&candidates)
            .unwrap();

        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.tags.owner.as_deref() == Some("platform")));
        assert!(cache.get_tags(&dir.path().join("server.py")).owner.is_none());
    }

    #[test]
    fn test_engines_agree_when_rg_present() {
        if !rg_available() {
            return;
        }
        let (dir, candidates) = fixture_with_raw_bytes();
        let table = PatternTable::builtin();
        let mut a = InProcessScanner::new(2)
            .scan(dir.path(), &candidates, table)
            .unwrap();
        let mut b = RipgrepScanner.scan(dir.path(), &candidates, table).unwrap();
        let key = |h: &RawHit| (h.file.clone(), h.line, h.pattern);
        a.sort_by_key(key);
        b.sort_by_key(key);
        assert_eq!(a, b);
    }

    #[test]
    fn test_engine_choice_parse_and_auto_threshold() {
        assert_eq!("in-process".parse::<EngineChoice>().unwrap(), EngineChoice::InProcess);
        assert_eq!("RG".parse::<EngineChoice>().unwrap(), EngineChoice::External);
        assert!("grep".parse::<EngineChoice>().is_err());

        assert!(!EngineChoice::Auto.wants_external(10, 50, true));
        assert!(EngineChoice::Auto.wants_external(50, 50, true));
        assert!(!EngineChoice::Auto.wants_external(500, 50, false));
    }
}
