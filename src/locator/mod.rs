//! Binary and auxiliary file resolution
//!
//! Operators name files loosely (a bare name, a relative path, or a name
//! without its platform executable suffix). The locator tries a fixed
//! candidate list in order and reports every tried path when nothing
//! matches, so the error is actionable.

use crate::core::environment::SystemEnvironment;
use crate::core::error::PublishError;
use std::path::{Path, PathBuf};

/// Resolves operator-supplied file names against the binary directory
pub struct FileLocator {
    binary_dir: PathBuf,
    env: SystemEnvironment,
}

impl FileLocator {
    pub fn new(binary_dir: impl Into<PathBuf>, env: SystemEnvironment) -> Self {
        Self {
            binary_dir: binary_dir.into(),
            env,
        }
    }

    /// Candidate paths for `name_or_path`, in resolution order
    ///
    /// 1. the name taken literally (absolute or relative to the cwd)
    /// 2. the name inside the binary directory
    /// 3. the name inside the binary directory with the platform's
    ///    executable suffix appended
    pub fn candidates(&self, name_or_path: &str) -> Vec<PathBuf> {
        let mut list = vec![
            PathBuf::from(name_or_path),
            self.binary_dir.join(name_or_path),
        ];
        if !self.env.exe_suffix.is_empty() {
            list.push(
                self.binary_dir
                    .join(format!("{}{}", name_or_path, self.env.exe_suffix)),
            );
        }
        list
    }

    /// Resolve `name_or_path` to the first existing candidate
    pub fn locate(&self, name_or_path: &str) -> Result<PathBuf, PublishError> {
        let candidates = self.candidates(name_or_path);
        for candidate in &candidates {
            if candidate.exists() {
                return Ok(candidate.clone());
            }
        }
        Err(PublishError::NotFound {
            name: name_or_path.to_string(),
            candidates: candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
        })
    }

    /// The staged file name a resolved path should carry inside a
    /// sub-package
    pub fn staged_name(&self, resolved: &Path) -> String {
        resolved
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Locate an executable on PATH
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}
