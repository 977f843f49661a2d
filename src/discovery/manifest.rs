//! Built-in manifest and hot-directory table
//!
//! These replace a full recursive walk: only the listed entrypoints and the
//! known-interesting sub-patterns of each top-level directory are expanded.
//! Both can be overridden from `repolens.toml`.

use crate::config::DiscoveryConfig;
use std::collections::BTreeMap;

/// Extensions eligible for feature scanning (lowercase, no dot)
pub const SCAN_EXTENSIONS: &[&str] = &["py", "pyi", "md", "markdown", "yaml", "yml", "toml"];

/// Core entrypoints expanded when no profile is selected
pub const CORE_MANIFEST: &[&str] = &[
    "main.py",
    "app.py",
    "cli.py",
    "manage.py",
    "server.py",
    "README.md",
    "pyproject.toml",
    "api/server.py",
    "api/routers/*.py",
    "app/main.py",
    "app/routers/*.py",
    "src/*/main.py",
    "src/*/cli.py",
    "scripts/*.py",
    "streamlit_ui/components/*.py",
];

/// Known-interesting sub-patterns per top-level directory
pub const HOT_DIRECTORIES: &[(&str, &[&str])] = &[
    ("api", &["**/*.py"]),
    ("app", &["**/*.py"]),
    ("src", &["**/*.py"]),
    ("tools", &["*.py"]),
    ("streamlit_ui", &["*.py"]),
    ("tests", &["test_*.py"]),
    ("docs", &["*.md"]),
];

/// Resolved manifest and hot-directory table for one run
#[derive(Debug, Clone)]
pub struct Manifest {
    pub entries: Vec<String>,
    pub hot_directories: BTreeMap<String, Vec<String>>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            entries: CORE_MANIFEST.iter().map(|s| s.to_string()).collect(),
            hot_directories: HOT_DIRECTORIES
                .iter()
                .map(|(dir, patterns)| {
                    (
                        dir.to_string(),
                        patterns.iter().map(|p| p.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }
}

impl Manifest {
    /// Built-in table with any project overrides applied
    pub fn from_config(config: &DiscoveryConfig) -> Self {
        let mut manifest = Self::default();
        if let Some(entries) = &config.manifest {
            manifest.entries = entries.clone();
        }
        if let Some(hot) = &config.hot_directories {
            manifest.hot_directories = hot.clone();
        }
        manifest
    }

    pub fn hot_patterns(&self, dir: &str) -> Option<&[String]> {
        self.hot_directories.get(dir).map(|v| v.as_slice())
    }
}

pub fn has_scan_extension(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SCAN_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}
