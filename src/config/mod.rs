//! Configuration module for repolens
//!
//! This module handles:
//! - Project-level configuration (`repolens.toml`)
//! - Policy documents gating which files and tags are reported
//! - Named file-selection profiles (`profiles.yaml`)

mod policy;
mod profile;
mod project_config;

pub use policy::{load_policy, MaturityRule, Policy, TagRequirements};
pub use profile::{load_profile, Profile, ProfilesDocument};
pub use project_config::{
    load_project_config, ComplexityConfig, DiscoveryConfig, HealthConfig, ImportsConfig,
    ProjectConfig, ScanConfig, SizeConfig,
};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading configuration documents
///
/// Callers in the pipeline turn these into warnings and continue with
/// permissive defaults.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("unknown profile '{name}' (available: {available})")]
    UnknownProfile { name: String, available: String },

    #[error("invalid glob '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },
}

fn read_document(path: &std::path::Path) -> Result<String, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}
