//! Artifact filename parsing and compatibility matching.
//!
//! Distribution files encode their compatibility in the filename:
//!
//! ```text
//! wheel:  {name}-{version}[-{build}]-{python}-{abi}-{platform}.whl
//!         numpy-1.26.4-cp311-cp311-win_amd64.whl
//!         requests-2.31.0-py3-none-any.whl
//!
//! sdist:  {name}-{version}.tar.gz
//!         python-dateutil-2.8.2.tar.gz
//! ```
//!
//! The wheel platform tag `any` and ABI tag `none` mean "fits every target",
//! as do all three tags of an sdist. Filenames of neither shape parse to an
//! artifact whose fields are all unknown, which never matches anything.

use crate::requirement::Requirement;
use crate::target::{Target, TargetSet};
use crate::version::Version;
use log::{debug, trace};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Name and version placeholder for unparseable filenames.
pub const UNKNOWN: &str = "unknown";

/// Interpreter tags that fit any Python 3 target.
const GENERIC_INTERPRETER_TAGS: &[&str] = &["py3", "any", "none"];

fn wheel_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<name>[^-]+)-(?P<version>[^-]+)(?:-(?P<build>\d[^-]*))?-(?P<python>[^-]+)-(?P<abi>[^-]+)-(?P<platform>[^-]+)\.whl$",
        )
        .expect("wheel filename regex")
    })
}

fn sdist_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<name>.+)-(?P<version>[^-]+)\.tar\.gz$").expect("sdist filename regex")
    })
}

/// Distribution form of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Prebuilt wheel (`.whl`).
    Binary,
    /// Source distribution (`.tar.gz`).
    Source,
    /// Not a recognised distribution file.
    Unknown,
}

/// One compatibility tag from a filename.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Fits every configuration.
    Universal,
    /// Could not be determined; fits nothing.
    Unknown,
    /// A concrete tag, possibly compressed (`manylinux_2_17_x86_64.manylinux2014_x86_64`).
    Value(String),
}

impl Tag {
    fn from_field(value: &str, universal: &str) -> Self {
        if value == universal {
            Tag::Universal
        } else {
            Tag::Value(value.to_string())
        }
    }

    /// Check the tag against accepted values. Compressed tags match when any
    /// of their dot-separated members does.
    fn accepts(&self, accepted: &[String]) -> bool {
        match self {
            Tag::Universal => true,
            Tag::Unknown => false,
            Tag::Value(v) => v.split('.').any(|part| accepted.iter().any(|a| a == part)),
        }
    }
}

/// Facts derived from an artifact filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactInfo {
    /// Distribution name as it appears in the filename.
    pub name: String,
    /// Version as it appears in the filename.
    pub version: String,
    /// Python tag (`cp311`, `py3`, `py2.py3`).
    pub interpreter_tag: Tag,
    /// ABI tag (`cp311`, `abi3`, `none`).
    pub abi_tag: Tag,
    /// Platform tag (`win_amd64`, `any`).
    pub platform_tag: Tag,
    /// Wheel, sdist or unknown.
    pub kind: ArtifactKind,
}

impl ArtifactInfo {
    /// Parse a filename. Never fails; unrecognised names give an unknown artifact.
    pub fn from_filename(filename: &str) -> Self {
        if let Some(caps) = wheel_regex().captures(filename) {
            return Self {
                name: caps["name"].to_string(),
                version: caps["version"].to_string(),
                interpreter_tag: Tag::Value(caps["python"].to_string()),
                abi_tag: Tag::from_field(&caps["abi"], "none"),
                platform_tag: Tag::from_field(&caps["platform"], "any"),
                kind: ArtifactKind::Binary,
            };
        }

        if let Some(caps) = sdist_regex().captures(filename) {
            return Self {
                name: caps["name"].to_string(),
                version: caps["version"].to_string(),
                interpreter_tag: Tag::Universal,
                abi_tag: Tag::Universal,
                platform_tag: Tag::Universal,
                kind: ArtifactKind::Source,
            };
        }

        trace!("unrecognised artifact filename: {}", filename);
        Self {
            name: UNKNOWN.to_string(),
            version: UNKNOWN.to_string(),
            interpreter_tag: Tag::Unknown,
            abi_tag: Tag::Unknown,
            platform_tag: Tag::Unknown,
            kind: ArtifactKind::Unknown,
        }
    }

    /// Normalised version, `None` for unknown artifacts.
    pub fn parsed_version(&self) -> Option<Version> {
        match self.kind {
            ArtifactKind::Unknown => None,
            _ => Some(Version::normalize(&self.version)),
        }
    }

    /// True when the filename names the given package.
    pub fn is_named(&self, package: &str) -> bool {
        self.kind != ArtifactKind::Unknown && normalize_name(&self.name) == normalize_name(package)
    }
}

/// Fold a distribution name for comparison: lowercase, runs of `-_.` become `-`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_sep = false;
    for ch in name.chars() {
        if matches!(ch, '-' | '_' | '.') {
            if !in_sep {
                out.push('-');
            }
            in_sep = true;
        } else {
            out.push(ch.to_ascii_lowercase());
            in_sep = false;
        }
    }
    out
}

fn interpreter_accepts(tag: &Tag, versions: &[String]) -> bool {
    match tag {
        Tag::Universal => true,
        Tag::Unknown => false,
        Tag::Value(v) => {
            v.split('.').any(|part| GENERIC_INTERPRETER_TAGS.contains(&part))
                || versions.iter().any(|ver| v.contains(ver.as_str()))
        }
    }
}

/// Check an artifact's tags against the accepted platform, ABI and
/// interpreter sets. All three checks must pass.
pub fn is_match(targets: &TargetSet, info: &ArtifactInfo) -> bool {
    info.platform_tag.accepts(&targets.platforms)
        && info.abi_tag.accepts(&targets.abis)
        && interpreter_accepts(&info.interpreter_tag, &targets.versions)
}

/// Check whether `dest_dir` already holds an artifact that fulfils the
/// requirement for the target.
///
/// Requirements without a strict constraint are fulfilled by any
/// same-named artifact that fits the target.
pub fn already_satisfied(dest_dir: &Path, requirement: &Requirement, target: &Target) -> bool {
    let entries = match std::fs::read_dir(dest_dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("cannot list {}: {}", dest_dir.display(), e);
            return false;
        }
    };
    let targets = TargetSet::from(target);

    for entry in entries.flatten() {
        let filename = entry.file_name().to_string_lossy().to_string();
        let info = ArtifactInfo::from_filename(&filename);
        if !info.is_named(&requirement.name) || !is_match(&targets, &info) {
            continue;
        }
        if !requirement.is_strict() {
            trace!("{} satisfies {} (no strict constraint)", filename, requirement);
            return true;
        }
        let Some(version) = info.parsed_version() else {
            continue;
        };
        match requirement.accepts(&version) {
            Ok(true) => {
                trace!("{} satisfies {}", filename, requirement);
                return true;
            }
            Ok(false) => {}
            Err(e) => debug!("{}: {}", filename, e),
        }
    }
    false
}
