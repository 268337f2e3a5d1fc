//! Umbrella and sub-package descriptor files
//!
//! Both descriptors are `package.json` documents. They are read, updated
//! incrementally, and written back on every run, so unknown fields are
//! preserved through a serde flatten map.

use crate::core::error::PublishError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

/// Repository provenance, either a bare URL or the detailed object form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Repository {
    Url(String),
    Detailed {
        #[serde(rename = "type")]
        kind: String,
        url: String,
    },
}

impl Repository {
    /// Create the detailed git form
    pub fn git(url: impl Into<String>) -> Self {
        Self::Detailed {
            kind: "git".to_string(),
            url: url.into(),
        }
    }

    /// The repository URL regardless of form
    pub fn url(&self) -> &str {
        match self {
            Self::Url(url) => url,
            Self::Detailed { url, .. } => url,
        }
    }
}

/// Descriptor of the top-level umbrella package
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UmbrellaManifest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<Repository>,

    /// Logical binary identifiers exposed by the umbrella package
    #[serde(rename = "binaryNames", default, skip_serializing_if = "Vec::is_empty")]
    pub binary_names: Vec<String>,

    /// Extra file names required alongside any binary
    #[serde(
        rename = "additionalFiles",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub additional_files: Vec<String>,

    /// Command name → launcher script
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bin: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,

    /// Sub-package name → exact published version
    #[serde(
        rename = "optionalDependencies",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub optional_dependencies: BTreeMap<String, String>,

    /// Homepage of the original binary's project, for humans
    #[serde(rename = "urlSource", skip_serializing_if = "Option::is_none")]
    pub url_source: Option<String>,

    /// Source repository of the original binary, for humans
    #[serde(rename = "gitSource", skip_serializing_if = "Option::is_none")]
    pub git_source: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Descriptor of one platform/architecture sub-package
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SubPackageManifest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<Repository>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,

    /// Platforms this sub-package installs on (Node-style names)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub os: Vec<String>,

    /// Architectures this sub-package installs on (Node-style names)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cpu: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Read a descriptor file
pub async fn load<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, PublishError> {
    let content = fs::read_to_string(path).await?;
    serde_json::from_str(&content).map_err(|e| PublishError::Manifest {
        message: format!("{}: {}", path.display(), e),
    })
}

/// Write a descriptor file, pretty-printed
pub async fn save<T: Serialize>(path: &Path, manifest: &T) -> Result<(), PublishError> {
    let json = serde_json::to_string_pretty(manifest).map_err(|e| PublishError::Manifest {
        message: format!("{}: {}", path.display(), e),
    })?;
    fs::write(path, json).await?;
    Ok(())
}

/// Deduplicate a name list, keeping first-seen order
pub fn unique(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
