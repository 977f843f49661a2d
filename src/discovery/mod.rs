//! Candidate enumeration
//!
//! Resolves the set of files to scan from a profile (allow/deny globs), a
//! policy (allow/deny globs) and the built-in manifest. Directory wildcards
//! (`dir/**`) are routed through the hot-directory table so a run touches
//! only known hot paths instead of walking the whole tree.

mod manifest;

pub use manifest::{has_scan_extension, Manifest, CORE_MANIFEST, HOT_DIRECTORIES, SCAN_EXTENSIONS};

use crate::config::{ConfigError, Policy, Profile};
use crate::models::CandidateFile;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info};

/// A compiled list of shell-style globs matched against relative paths
#[derive(Debug, Clone)]
pub struct GlobList {
    set: GlobSet,
    len: usize,
}

impl GlobList {
    pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(false)
                .build()
                .map_err(|e| ConfigError::InvalidGlob {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|e| ConfigError::InvalidGlob {
            pattern: patterns.join(", "),
            message: e.to_string(),
        })?;
        Ok(Self {
            set,
            len: patterns.len(),
        })
    }

    pub fn empty() -> Self {
        Self {
            set: GlobSet::empty(),
            len: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_match(&self, rel_path: &str) -> bool {
        self.set.is_match(rel_path)
    }
}

/// Modification time of a file in nanoseconds since the Unix epoch
pub fn mtime_ns(meta: &Metadata) -> u128 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

/// `/`-separated path of `path` relative to `root`
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    Some(parts.join("/"))
}

/// Build a `CandidateFile` for an absolute path under `root`
pub fn candidate_for(root: &Path, abs_path: &Path) -> Option<CandidateFile> {
    let meta = std::fs::metadata(abs_path).ok()?;
    if !meta.is_file() {
        return None;
    }
    Some(CandidateFile {
        abs_path: abs_path.to_path_buf(),
        rel_path: relative_path(root, abs_path)?,
        size: meta.len(),
        mtime_ns: mtime_ns(&meta),
    })
}

/// Candidate enumerator for one repository root
pub struct Enumerator<'a> {
    root: PathBuf,
    manifest: &'a Manifest,
    profile: Option<&'a Profile>,
    policy: Option<&'a Policy>,
}

impl<'a> Enumerator<'a> {
    pub fn new(root: &Path, manifest: &'a Manifest) -> Self {
        Self {
            root: root.to_path_buf(),
            manifest,
            profile: None,
            policy: None,
        }
    }

    pub fn with_profile(mut self, profile: Option<&'a Profile>) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_policy(mut self, policy: Option<&'a Policy>) -> Self {
        self.policy = policy;
        self
    }

    /// Produce the deduplicated, order-stable candidate list
    pub fn enumerate(&self) -> Result<Vec<CandidateFile>, ConfigError> {
        let expanded = match self.profile {
            Some(profile) if !profile.allow.is_empty() => {
                debug!("Expanding profile '{}' allow patterns", profile.name);
                self.expand_profile(profile)
            }
            _ => {
                debug!("Expanding built-in manifest and hot directories");
                self.expand_manifest()
            }
        };

        let profile_deny = match self.profile {
            Some(p) => GlobList::new(&p.deny)?,
            None => GlobList::empty(),
        };
        let (policy_allow, policy_deny) = match self.policy {
            Some(p) => (p.allow_globs()?, p.deny_globs()?),
            None => (GlobList::empty(), GlobList::empty()),
        };

        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut candidates = Vec::new();
        for path in expanded {
            if !seen.insert(path.clone()) {
                continue;
            }
            let Some(candidate) = candidate_for(&self.root, &path) else {
                continue;
            };
            let rel = candidate.rel_path.as_str();
            if profile_deny.is_match(rel) || policy_deny.is_match(rel) {
                continue;
            }
            if !policy_allow.is_empty() && !policy_allow.is_match(rel) {
                continue;
            }
            candidates.push(candidate);
        }

        info!("Resolved {} candidate files", candidates.len());
        Ok(candidates)
    }

    fn expand_profile(&self, profile: &Profile) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for pattern in &profile.allow {
            if let Some(dir) = pattern.strip_suffix("/**") {
                match self.manifest.hot_patterns(dir) {
                    Some(hot) => {
                        for sub in hot {
                            files.extend(self.expand_pattern(&format!("{}/{}", dir, sub)));
                        }
                    }
                    // Unknown directories get a shallow listing only
                    None => files.extend(self.expand_pattern(&format!("{}/*", dir))),
                }
            } else {
                files.extend(self.expand_pattern(pattern));
            }
        }
        files
    }

    fn expand_manifest(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in &self.manifest.entries {
            files.extend(self.expand_pattern(entry));
        }
        for (dir, patterns) in &self.manifest.hot_directories {
            if !self.root.join(dir).is_dir() {
                continue;
            }
            for pattern in patterns {
                files.extend(self.expand_pattern(&format!("{}/{}", dir, pattern)));
            }
        }
        files
    }

    /// Expand one manifest pattern; a pattern resolving to nothing is dropped
    fn expand_pattern(&self, pattern: &str) -> Vec<PathBuf> {
        let is_glob = pattern.contains(['*', '?', '[']);
        if !is_glob {
            let path = self.root.join(pattern);
            if path.is_file() && has_scan_extension(&path) {
                return vec![path];
            }
            return Vec::new();
        }

        let full = format!(
            "{}/{}",
            glob::Pattern::escape(&self.root.to_string_lossy()),
            pattern
        );
        let paths = match glob::glob(&full) {
            Ok(paths) => paths,
            Err(e) => {
                debug!("Skipping invalid manifest pattern '{}': {}", pattern, e);
                return Vec::new();
            }
        };
        paths
            .filter_map(|entry| entry.ok())
            .filter(|p| p.is_file() && has_scan_extension(p))
            .collect()
    }
}
