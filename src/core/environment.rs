//! Explicit system-environment context
//!
//! The registry entries written by this tool are matched against the current
//! system by a JavaScript runtime shim, so platform and architecture use
//! Node-style names (`win32`/`darwin`/`linux`, `x64`/`arm64`/`ia32`). The
//! context is threaded explicitly into every component that needs it, so
//! tests can substitute a fake environment deterministically.

use std::collections::BTreeMap;

/// Snapshot of the system attributes a sub-package can be matched against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemEnvironment {
    /// Node-style platform name (win32, darwin, linux, ...)
    pub platform: String,

    /// Node-style architecture name (x64, arm64, ia32, ...)
    pub arch: String,

    /// Executable suffix for this platform (".exe" or "")
    pub exe_suffix: String,
}

impl SystemEnvironment {
    /// Capture the current process environment
    pub fn current() -> Self {
        Self {
            platform: node_platform(std::env::consts::OS).to_string(),
            arch: node_arch(std::env::consts::ARCH).to_string(),
            exe_suffix: if cfg!(windows) { ".exe" } else { "" }.to_string(),
        }
    }

    /// Look up a system attribute by registry key name
    pub fn attribute(&self, key: &str) -> Option<&str> {
        match key {
            "platform" => Some(&self.platform),
            "arch" => Some(&self.arch),
            _ => None,
        }
    }

    /// Check whether every listed attribute matches this environment exactly
    ///
    /// A key this environment does not expose never matches.
    pub fn matches(&self, system_info: &BTreeMap<String, String>) -> bool {
        system_info
            .iter()
            .all(|(key, expected)| self.attribute(key) == Some(expected.as_str()))
    }

    /// The systemInfo mapping recorded for sub-packages built on this system
    pub fn system_info(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("platform".to_string(), self.platform.clone()),
            ("arch".to_string(), self.arch.clone()),
        ])
    }
}

fn node_platform(os: &str) -> &str {
    match os {
        "windows" => "win32",
        "macos" => "darwin",
        other => other,
    }
}

fn node_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        "x86" => "ia32",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux_x64() -> SystemEnvironment {
        SystemEnvironment {
            platform: "linux".to_string(),
            arch: "x64".to_string(),
            exe_suffix: String::new(),
        }
    }

    #[test]
    fn test_node_platform_names() {
        assert_eq!(node_platform("windows"), "win32");
        assert_eq!(node_platform("macos"), "darwin");
        assert_eq!(node_platform("linux"), "linux");
    }

    #[test]
    fn test_node_arch_names() {
        assert_eq!(node_arch("x86_64"), "x64");
        assert_eq!(node_arch("aarch64"), "arm64");
        assert_eq!(node_arch("x86"), "ia32");
    }

    #[test]
    fn test_matches_all_attributes() {
        let env = linux_x64();
        let info = BTreeMap::from([
            ("platform".to_string(), "linux".to_string()),
            ("arch".to_string(), "x64".to_string()),
        ]);
        assert!(env.matches(&info));
    }

    #[test]
    fn test_mismatched_attribute() {
        let env = linux_x64();
        let info = BTreeMap::from([
            ("platform".to_string(), "win32".to_string()),
            ("arch".to_string(), "x64".to_string()),
        ]);
        assert!(!env.matches(&info));
    }

    #[test]
    fn test_unknown_key_never_matches() {
        let env = linux_x64();
        let info = BTreeMap::from([("libc".to_string(), "musl".to_string())]);
        assert!(!env.matches(&info));
    }

    #[test]
    fn test_empty_system_info_matches_everything() {
        let env = linux_x64();
        assert!(env.matches(&BTreeMap::new()));
    }

    #[test]
    fn test_system_info_round_trip() {
        let env = linux_x64();
        assert!(env.matches(&env.system_info()));
    }
}
