//! Named file-selection profiles
//!
//! ```yaml
//! profiles:
//!   minimal:
//!     allow: ["api/**", "tools/feature_map.py"]
//!     deny: ["**/test_*.py"]
//!     tag_defaults:
//!       owner: platform
//!       maturity: beta
//! ```

use super::{read_document, ConfigError};
use crate::models::Tags;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

fn default_allow() -> Vec<String> {
    vec!["**".to_string()]
}

/// A reusable allow/deny file-selection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    #[serde(skip)]
    pub name: String,
    #[serde(default = "default_allow")]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
    #[serde(default)]
    pub tag_defaults: Tags,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilesDocument {
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl ProfilesDocument {
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn get(&self, name: &str) -> Result<Profile, ConfigError> {
        match self.profiles.get(name) {
            Some(profile) => {
                let mut profile = profile.clone();
                profile.name = name.to_string();
                Ok(profile)
            }
            None => Err(ConfigError::UnknownProfile {
                name: name.to_string(),
                available: self
                    .profiles
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

/// Load the named profile from a profiles document
pub fn load_profile(path: &Path, name: &str) -> Result<Profile, ConfigError> {
    let content = read_document(path)?;
    ProfilesDocument::from_yaml(&content, path)?.get(name)
}
