//! Configuration for shim-publisher
//!
//! Configuration is loaded from multiple sources with priority
//! (high to low):
//! 1. CLI arguments (applied by the orchestrators)
//! 2. Environment variables
//! 3. Project config (./.shim-publisher.yaml)
//! 4. Global config (~/.shim-publisher.yaml)
//! 5. Default values

use crate::core::error::PublishError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Configuration file name
const CONFIG_FILENAME: &str = ".shim-publisher.yaml";

/// Publisher configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PublisherConfig {
    /// Workspace folder for intermediate files (default: OS temp dir)
    #[serde(skip_serializing_if = "Option::is_none", rename = "workspaceFolder")]
    pub workspace_folder: Option<PathBuf>,

    /// GitHub user name override (default: `git config --global user.name`)
    #[serde(skip_serializing_if = "Option::is_none", rename = "userName")]
    pub user_name: Option<String>,

    /// Suppress publishing and pushing by default
    #[serde(skip_serializing_if = "Option::is_none", rename = "dontPublish")]
    pub dont_publish: Option<bool>,
}

impl PublisherConfig {
    /// Load configuration, merging sources in priority order
    pub async fn load(
        project_path: &Path,
        env: &HashMap<String, String>,
    ) -> Result<Self, PublishError> {
        let mut merged = Self::default();

        if let Some(home) = env.get("HOME").map(PathBuf::from) {
            if let Some(global) = Self::load_file(&home.join(CONFIG_FILENAME)).await? {
                merged = merged.merge(global);
            }
        }

        if let Some(project) = Self::load_file(&project_path.join(CONFIG_FILENAME)).await? {
            merged = merged.merge(project);
        }

        merged = merged.merge(Self::from_env(env));

        Ok(merged)
    }

    /// Load one YAML config file; absent file is not an error
    async fn load_file(path: &Path) -> Result<Option<Self>, PublishError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).await?;
        let config = serde_yaml::from_str(&content).map_err(|e| PublishError::Configuration {
            message: format!("設定ファイル {} を解析できません: {}", path.display(), e),
        })?;

        Ok(Some(config))
    }

    /// Build a config layer from environment variables
    fn from_env(env: &HashMap<String, String>) -> Self {
        Self {
            workspace_folder: env.get("SHIM_PUBLISHER_WORKSPACE").map(PathBuf::from),
            user_name: env.get("SHIM_PUBLISHER_USER").cloned(),
            dont_publish: env
                .get("SHIM_PUBLISHER_NO_PUBLISH")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true")),
        }
    }

    /// Overlay `higher` onto self; set fields in `higher` win
    fn merge(self, higher: Self) -> Self {
        Self {
            workspace_folder: higher.workspace_folder.or(self.workspace_folder),
            user_name: higher.user_name.or(self.user_name),
            dont_publish: higher.dont_publish.or(self.dont_publish),
        }
    }
}
