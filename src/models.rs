//! Core data models for repolens
//!
//! These are the value types that flow through the discovery, extraction,
//! linking and reporting stages. Everything here is immutable once built;
//! only the tag cache owns mutable state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A file selected for scanning by the candidate enumerator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub abs_path: PathBuf,
    /// Repository-relative path, always `/`-separated
    pub rel_path: String,
    pub size: u64,
    /// Modification time in nanoseconds since the Unix epoch
    pub mtime_ns: u128,
}

/// Lifecycle stage declared by a `# @maturity:` annotation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Maturity {
    Stable,
    Beta,
    Experimental,
    Deprecated,
}

impl Maturity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Maturity::Stable => "stable",
            Maturity::Beta => "beta",
            Maturity::Experimental => "experimental",
            Maturity::Deprecated => "deprecated",
        }
    }
}

impl fmt::Display for Maturity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Maturity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stable" => Ok(Maturity::Stable),
            "beta" => Ok(Maturity::Beta),
            "experimental" => Ok(Maturity::Experimental),
            "deprecated" => Ok(Maturity::Deprecated),
            other => Err(format!(
                "unknown maturity '{}' (expected stable, beta, experimental, deprecated)",
                other
            )),
        }
    }
}

/// Header annotations of a single file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tags {
    #[serde(default)]
    pub expose: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maturity: Option<Maturity>,
}

impl Tags {
    pub fn is_empty(&self) -> bool {
        !self.expose && self.owner.is_none() && self.maturity.is_none()
    }

    /// Fill fields this file does not declare from profile defaults
    pub fn with_defaults(mut self, defaults: &Tags) -> Tags {
        if !self.expose && defaults.expose {
            self.expose = true;
        }
        if self.owner.is_none() {
            self.owner = defaults.owner.clone();
        }
        if self.maturity.is_none() {
            self.maturity = defaults.maturity;
        }
        self
    }
}

/// Feature category of a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitKind {
    Route,
    Cli,
    Tool,
    Adapter,
    Streamlit,
    Test,
    Doc,
}

impl HitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HitKind::Route => "route",
            HitKind::Cli => "cli",
            HitKind::Tool => "tool",
            HitKind::Adapter => "adapter",
            HitKind::Streamlit => "streamlit",
            HitKind::Test => "test",
            HitKind::Doc => "doc",
        }
    }
}

impl fmt::Display for HitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One located occurrence of a classified code feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hit {
    pub kind: HitKind,
    pub file: String,
    pub line: u32,
    pub text: String,
    pub meta: BTreeMap<String, String>,
    pub tags: Tags,
}

impl Hit {
    /// Stable identifier used as an edge endpoint
    pub fn id(&self) -> String {
        format!("{}:{}", self.file, self.line)
    }
}

/// Inferred relationship between two hits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub src: String,
    pub dst: String,
    pub label: String,
}

/// Output aggregate of one feature-map run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureMap {
    pub root: String,
    pub hits: Vec<Hit>,
    pub edges: Vec<Edge>,
}

impl FeatureMap {
    /// Count of hits per kind, ordered by kind
    pub fn by_kind(&self) -> BTreeMap<HitKind, usize> {
        let mut counts = BTreeMap::new();
        for hit in &self.hits {
            *counts.entry(hit.kind).or_insert(0) += 1;
        }
        counts
    }
}
