//! Policy documents
//!
//! ```yaml
//! version: 1
//! default_owner: platform
//! allowlist: ["api/**", "tools/*.py"]
//! denylist: ["**/legacy/**"]
//! tags:
//!   require_expose: true
//!   require_owner: false
//! maturity:
//!   allowed: [stable, beta]
//! ```

use super::{read_document, ConfigError};
use crate::discovery::GlobList;
use crate::models::{Maturity, Tags};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;
use std::path::Path;

fn default_version() -> u32 {
    1
}

fn default_allowlist() -> Vec<String> {
    vec!["**".to_string()]
}

fn default_allowed_maturity() -> Vec<Maturity> {
    vec![Maturity::Stable, Maturity::Beta]
}

/// Tag requirements a file must meet for its hits to be reported
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagRequirements {
    #[serde(default)]
    pub require_expose: bool,
    #[serde(default)]
    pub require_owner: bool,
}

/// Maturity names match case-insensitively, as in file headers
fn deserialize_maturity_list<'de, D>(deserializer: D) -> Result<Vec<Maturity>, D::Error>
where
    D: Deserializer<'de>,
{
    let names = Vec::<String>::deserialize(deserializer)?;
    names
        .iter()
        .map(|name| name.parse::<Maturity>().map_err(serde::de::Error::custom))
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaturityRule {
    #[serde(
        default = "default_allowed_maturity",
        deserialize_with = "deserialize_maturity_list"
    )]
    pub allowed: Vec<Maturity>,
}

impl Default for MaturityRule {
    fn default() -> Self {
        Self {
            allowed: default_allowed_maturity(),
        }
    }
}

/// Rule set gating which files and tags are eligible for a report
#[derive(Debug, Clone, Deserialize)]
pub struct Policy {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub default_owner: Option<String>,
    #[serde(default = "default_allowlist")]
    pub allowlist: Vec<String>,
    #[serde(default)]
    pub denylist: Vec<String>,
    #[serde(default)]
    pub tags: TagRequirements,
    #[serde(default)]
    pub maturity: MaturityRule,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            version: default_version(),
            default_owner: None,
            allowlist: default_allowlist(),
            denylist: Vec::new(),
            tags: TagRequirements::default(),
            maturity: MaturityRule::default(),
        }
    }
}

impl Policy {
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        // An empty document is a valid, fully-defaulted policy
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn allow_globs(&self) -> Result<GlobList, ConfigError> {
        GlobList::new(&self.allowlist)
    }

    pub fn deny_globs(&self) -> Result<GlobList, ConfigError> {
        GlobList::new(&self.denylist)
    }

    /// Whether a file's tags satisfy this policy
    ///
    /// Owner requirements are met only by an explicit owner tag;
    /// `default_owner` does not count. Files without a maturity tag are
    /// treated as stable.
    pub fn allows_tags(&self, tags: &Tags) -> bool {
        if self.tags.require_expose && !tags.expose {
            return false;
        }
        if self.tags.require_owner && tags.owner.is_none() {
            return false;
        }
        let allowed: BTreeSet<Maturity> = self.maturity.allowed.iter().copied().collect();
        let maturity = tags.maturity.unwrap_or(Maturity::Stable);
        allowed.is_empty() || allowed.contains(&maturity)
    }
}

/// Load a policy document from disk
pub fn load_policy(path: &Path) -> Result<Policy, ConfigError> {
    let content = read_document(path)?;
    Policy::from_yaml(&content, path)
}
