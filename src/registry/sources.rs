//! Sources Registry codec
//!
//! The umbrella repository carries a generated `sources.js` whose
//! machine-editable region is a JSON object between two fixed sentinel
//! lines. Independently-published sub-packages register themselves by
//! splicing their entry into that object; everything outside the sentinels
//! is preserved byte-for-byte.

use crate::core::error::PublishError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Start marker of the machine-editable region (exact literal)
pub const SOURCES_START_TAG: &str = "// AUTO_GENERATED_SOURCES_START";

/// End marker of the machine-editable region (exact literal)
pub const SOURCES_END_TAG: &str = "// AUTO_GENERATED_SOURCES_END";

/// File name of the registry artifact inside the umbrella repository
pub const SOURCES_FILE: &str = "sources.js";

/// One registered sub-package
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceEntry {
    /// System attributes that must all match the runtime environment
    #[serde(rename = "systemInfo")]
    pub system_info: BTreeMap<String, String>,

    /// Exact registry name of the sub-package
    #[serde(rename = "packageName")]
    pub package_name: String,

    /// Logical binary name → staged file name inside the sub-package
    pub binaries: BTreeMap<String, String>,
}

/// Mapping from sub-package name to its descriptor
///
/// BTreeMap iteration order is the documented tie-break when several
/// entries match the current system.
pub type SourcesRegistry = BTreeMap<String, SourceEntry>;

/// Parse the registry object embedded between the sentinel markers
///
/// Fails with `CorruptRegistry` when either sentinel is absent, and with
/// `InvalidRegistryJson` when the enclosed text is not a valid JSON object.
pub fn decode(file_text: &str) -> Result<SourcesRegistry, PublishError> {
    let (start, end) = region(file_text)?;
    serde_json::from_str(&file_text[start..end])
        .map_err(|source| PublishError::InvalidRegistryJson { source })
}

/// Replace the embedded registry object, preserving all surrounding text
///
/// The serialized mapping is pretty-printed and framed by a newline on
/// each side. Round trip: `decode(&encode(t, &m)?)? == m`.
pub fn encode(file_text: &str, registry: &SourcesRegistry) -> Result<String, PublishError> {
    let (start, end) = region(file_text)?;
    let json = serde_json::to_string_pretty(registry)
        .map_err(|source| PublishError::InvalidRegistryJson { source })?;

    Ok(format!(
        "{}\n{}\n{}",
        &file_text[..start],
        json,
        &file_text[end..]
    ))
}

/// Byte range strictly between the sentinels
fn region(file_text: &str) -> Result<(usize, usize), PublishError> {
    let start = file_text
        .find(SOURCES_START_TAG)
        .ok_or_else(|| PublishError::CorruptRegistry {
            marker: SOURCES_START_TAG.to_string(),
        })?
        + SOURCES_START_TAG.len();

    let end = file_text
        .find(SOURCES_END_TAG)
        .ok_or_else(|| PublishError::CorruptRegistry {
            marker: SOURCES_END_TAG.to_string(),
        })?;

    // An end sentinel before the start sentinel is as corrupt as a missing one
    if end < start {
        return Err(PublishError::CorruptRegistry {
            marker: SOURCES_END_TAG.to_string(),
        });
    }

    Ok((start, end))
}
