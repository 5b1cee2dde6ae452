//! Target platforms and interpreter versions.
//!
//! A run targets every combination of the platform tags implied by the
//! selected operating systems and the selected interpreter versions.
//!
//! ```text
//! os_list = [Windows, macOS]       python_versions = [3.11, 3.12]
//!
//!   win_amd64          x 3.11 (cp311)
//!   win_amd64          x 3.12 (cp312)
//!   macosx_10_9_x86_64 x 3.11 (cp311)
//!   macosx_10_9_x86_64 x 3.12 (cp312)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Known operating system names and the platform tags they imply.
pub const OS_PLATFORMS: &[(&str, &[&str])] = &[
    ("Windows", &["win_amd64"]),
    ("Linux", &["manylinux2014_x86_64", "manylinux2010_x86_64"]),
    ("Linux(manylinux2010_x86_64)", &["manylinux2010_x86_64"]),
    ("macOS", &["macosx_10_9_x86_64"]),
];

/// Platform tags for an OS name.
///
/// Names missing from [`OS_PLATFORMS`] are taken as a literal platform tag,
/// so `manylinux_2_28_aarch64` can be targeted directly.
pub fn platforms_for_os(os: &str) -> Vec<String> {
    OS_PLATFORMS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(os))
        .map(|(_, tags)| tags.iter().map(|t| t.to_string()).collect())
        .unwrap_or_else(|| vec![os.to_string()])
}

/// Interpreter version with the dots removed (`3.11` -> `311`).
pub fn compact_version(python_version: &str) -> String {
    python_version.replace('.', "")
}

/// CPython ABI tag for an interpreter version (`3.11` -> `cp311`).
pub fn abi_for_version(python_version: &str) -> String {
    format!("cp{}", compact_version(python_version))
}

/// One target combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Platform tag, e.g. `win_amd64`.
    pub platform: String,
    /// Interpreter version, e.g. `3.11`.
    pub python_version: String,
    /// ABI tag, e.g. `cp311`.
    pub abi: String,
}

impl Target {
    /// Build a target, deriving the ABI from the interpreter version.
    pub fn new(platform: impl Into<String>, python_version: impl Into<String>) -> Self {
        let python_version = python_version.into();
        Self {
            platform: platform.into(),
            abi: abi_for_version(&python_version),
            python_version,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/py{}/{}", self.platform, self.python_version, self.abi)
    }
}

/// All target combinations for the selected OS names and interpreter versions.
pub fn expand_targets(os_list: &[String], python_versions: &[String]) -> Vec<Target> {
    let mut targets = Vec::new();
    for os in os_list {
        for platform in platforms_for_os(os) {
            for version in python_versions {
                let target = Target::new(platform.clone(), version.clone());
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }
    }
    targets
}

/// The tag sets an artifact is matched against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSet {
    /// Accepted platform tags.
    pub platforms: Vec<String>,
    /// Accepted ABI tags.
    pub abis: Vec<String>,
    /// Accepted interpreter versions, dots removed.
    pub versions: Vec<String>,
}

impl TargetSet {
    /// Tag sets implied by OS names and interpreter versions.
    pub fn from_selection(os_list: &[String], python_versions: &[String]) -> Self {
        Self {
            platforms: os_list.iter().flat_map(|os| platforms_for_os(os)).collect(),
            abis: python_versions.iter().map(|v| abi_for_version(v)).collect(),
            versions: python_versions.iter().map(|v| compact_version(v)).collect(),
        }
    }
}

impl From<&Target> for TargetSet {
    fn from(target: &Target) -> Self {
        Self {
            platforms: vec![target.platform.clone()],
            abis: vec![target.abi.clone()],
            versions: vec![compact_version(&target.python_version)],
        }
    }
}
