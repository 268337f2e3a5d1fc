//! npm registry operations
//!
//! Publishing goes through the `npm` CLI so the operator's existing login
//! and registry configuration apply unchanged. Read-only registry lookups
//! go straight to the registry HTTP API.

use crate::core::error::PublishError;
use crate::git::command::CommandRunner;
use semver::Version;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

const REGISTRY_BASE_URL: &str = "https://registry.npmjs.org";

/// Registry document for one package, reduced to the fields we read
#[derive(Debug, Clone, Deserialize)]
pub struct NpmRegistryInfo {
    #[serde(default)]
    pub versions: BTreeMap<String, serde_json::Value>,
}

impl NpmRegistryInfo {
    pub fn has_version(&self, version: &str) -> bool {
        // Exact key hit first; fall back to SemVer equality so keys
        // carrying build metadata still match
        if self.versions.contains_key(version) {
            return true;
        }
        match Version::parse(version) {
            Ok(wanted) => self
                .versions
                .keys()
                .filter_map(|v| Version::parse(v).ok())
                .any(|v| v.cmp_precedence(&wanted) == std::cmp::Ordering::Equal),
            Err(_) => false,
        }
    }
}

/// npm CLI plus registry API client
pub struct NpmClient<'a> {
    runner: &'a dyn CommandRunner,
    http: reqwest::Client,
}

impl<'a> NpmClient<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            http: reqwest::Client::new(),
        }
    }

    /// `npm install --save <package>@latest` inside `dir`
    ///
    /// Used to pin the freshly published sub-package version into the
    /// umbrella package's optional dependencies.
    pub async fn install_latest(&self, dir: &Path, package: &str) -> Result<(), PublishError> {
        let spec = format!("{}@latest", package);
        self.runner
            .stream("npm", &["install", "--save", &spec], Some(dir))
            .await?;
        Ok(())
    }

    /// `npm publish` inside `dir`
    pub async fn publish(&self, dir: &Path) -> Result<(), PublishError> {
        self.runner.stream("npm", &["publish"], Some(dir)).await?;
        Ok(())
    }

    /// Fetch the registry document for `package`
    ///
    /// A package that has never been published yields `None` rather than
    /// an error; first-time publishes are a normal path.
    pub async fn fetch_registry_info(
        &self,
        package: &str,
    ) -> Result<Option<NpmRegistryInfo>, PublishError> {
        let url = format!("{}/{}", REGISTRY_BASE_URL, package);
        let response = self.http.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let info = response.error_for_status()?.json::<NpmRegistryInfo>().await?;
        Ok(Some(info))
    }

    /// Check that `version` of `package` is visible in the registry
    ///
    /// Registry propagation lags the publish, so a miss is reported to the
    /// caller instead of failing the run.
    pub async fn verify_published(&self, package: &str, version: &str) -> Result<bool, PublishError> {
        match self.fetch_registry_info(package).await {
            Ok(Some(info)) => Ok(info.has_version(version)),
            Ok(None) => Ok(false),
            Err(_) => Ok(false),
        }
    }
}
