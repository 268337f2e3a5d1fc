//! Dotted 3-component version handling
//!
//! Redistributed binaries rarely follow strict SemVer, so parsing here is
//! total: anything that is not a non-negative integer degrades to zero, and
//! extra components are discarded. Bumping advances exactly one component.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    /// First run of dot-separated digit groups in arbitrary `--version` output.
    static ref VERSION_PATTERN: Regex = Regex::new(r"([0-9]+\.)*[0-9]+").unwrap();
}

/// Which component of a version to advance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionComponent {
    Major,
    Minor,
    #[default]
    Patch,
}

impl VersionComponent {
    /// Component index: 0 for major, 1 for minor, 2 for patch
    pub fn index(self) -> usize {
        match self {
            Self::Major => 0,
            Self::Minor => 1,
            Self::Patch => 2,
        }
    }
}

/// A dotted 3-component version (major.minor.patch)
///
/// Bumping a component does NOT reset the less-significant components:
/// `1.2.3` bumped at major becomes `2.2.3`, not `2.0.0`. Published package
/// version sequences depend on this, so it is preserved as observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryVersion(pub [u32; 3]);

impl BinaryVersion {
    /// Parse up to the first three dot-separated components.
    ///
    /// Total function: a component that fails to parse as a non-negative
    /// integer is treated as zero, missing components are zero, extra
    /// components are discarded.
    pub fn parse(text: &str) -> Self {
        let mut parts = [0u32; 3];
        for (i, component) in text.trim().split('.').take(3).enumerate() {
            parts[i] = component.parse().unwrap_or(0);
        }
        Self(parts)
    }

    /// Return a new version with exactly `component` incremented
    pub fn bump(&self, component: VersionComponent) -> Self {
        let mut parts = self.0;
        parts[component.index()] += 1;
        Self(parts)
    }
}

impl fmt::Display for BinaryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0[0], self.0[1], self.0[2])
    }
}

/// Extract the first run of dot-separated digit groups from `--version` output
///
/// Returns `None` when the output contains no digits at all.
pub fn extract_version(output: &str) -> Option<String> {
    VERSION_PATTERN
        .find(output)
        .map(|m| m.as_str().to_string())
}
