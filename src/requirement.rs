//! Requirement parsing.
//!
//! A requirement line is a package name with an optional version constraint:
//!
//! | Line               | name      | operator | version   | loose       |
//! |--------------------|-----------|----------|-----------|-------------|
//! | `foo`              | foo       | -        | -         | -           |
//! | `foo>=1.2.3`       | foo       | `>=`     | (1,2,3)   | -           |
//! | `foo == 1.2.3`     | foo       | `==`     | (1,2,3)   | -           |
//! | `foo (>=1.2.3)`    | foo       | `>=`     | (1,2,3)   | -           |
//! | `foo[socks]<4,>=2` | foo       | -        | -         | `<4,>=2`    |
//! | `foo>=1.2`         | foo       | -        | -         | `>=1.2`     |
//! | `in valid name!`   | rejected  |          |           |             |
//!
//! Only the strict `operator major.minor.patch` form is checked against local
//! artifacts. Any other constraint is kept as a *loose* constraint: it is
//! passed to the external tool verbatim but otherwise treated as "any
//! version".
//!
//! Two requirements are the same requirement when name, operator and version
//! are identical as parsed. Spelling variants (`Foo` vs `foo`) are distinct,
//! and the loose constraint does not take part in identity.

use crate::error::{RequirementError, VersionError};
use crate::version::{compare, Operator, Version};
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::OnceLock;

/// Characters that may open a constraint after the package name.
const CONSTRAINT_START: &[char] = &['<', '>', '=', '!', '~', '('];

fn line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<name>[A-Za-z0-9_-]+(?:\.[A-Za-z0-9_-]+)*)(?:\[[^\]]*\])?\s*(?P<rest>.*)$")
            .expect("requirement regex")
    })
}

fn strict_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<op>[<>=!]+)\s*(?P<version>\d+\.\d+\.\d+)$").expect("constraint regex")
    })
}

/// A package name with an optional version constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    /// Package name as written.
    pub name: String,
    /// Operator of a strict constraint.
    pub operator: Option<Operator>,
    /// Version of a strict constraint. Present whenever `operator` is.
    pub version: Option<Version>,
    /// Constraint text that is not in strict form.
    pub loose: Option<String>,
}

impl Requirement {
    /// Unconstrained requirement for `name`.
    pub fn any(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operator: None,
            version: None,
            loose: None,
        }
    }

    /// Requirement with a strict constraint.
    pub fn pinned(name: impl Into<String>, operator: Operator, version: Version) -> Self {
        Self {
            name: name.into(),
            operator: Some(operator),
            version: Some(version),
            loose: None,
        }
    }

    /// Parse a single requirement line. Returns `None` for lines that do
    /// not look like a requirement.
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = line_regex().captures(raw.trim())?;
        let name = caps.name("name")?.as_str();
        let rest = caps.name("rest").map_or("", |m| m.as_str()).trim();

        if rest.is_empty() {
            return Some(Self::any(name));
        }
        if !rest.starts_with(CONSTRAINT_START) {
            return None;
        }

        let inner = rest
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .map_or(rest, str::trim);

        if let Some(strict) = strict_regex().captures(inner) {
            let op = Operator::from_symbol(&strict["op"]);
            let version = Version::normalize(&strict["version"]);
            return Some(Self::pinned(name, op, version));
        }

        Some(Self {
            loose: Some(inner.to_string()),
            ..Self::any(name)
        })
    }

    /// True for the `operator major.minor.patch` form.
    pub fn is_strict(&self) -> bool {
        self.operator.is_some() && self.version.is_some()
    }

    /// Check whether a candidate version satisfies this requirement.
    ///
    /// Loose and absent constraints accept any version.
    pub fn accepts(&self, candidate: &Version) -> Result<bool, VersionError> {
        compare(candidate, self.version.as_ref(), self.operator.as_ref())
    }

    /// Requirement text for a package tool command line.
    pub fn spec(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for Requirement {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.operator == other.operator && self.version == other.version
    }
}

impl Eq for Requirement {}

impl Hash for Requirement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.operator.hash(state);
        self.version.hash(state);
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.operator, &self.version, &self.loose) {
            (Some(op), Some(version), _) => write!(f, "{}{}{}", self.name, op, version),
            (_, _, Some(loose)) => write!(f, "{}{}", self.name, loose),
            _ => f.write_str(&self.name),
        }
    }
}

/// Requirements read from a list file.
#[derive(Debug, Clone, Default)]
pub struct RequirementList {
    /// Parsed requirements in file order.
    pub requirements: Vec<Requirement>,
    /// Number of malformed lines that were skipped.
    pub skipped: usize,
}

/// Parse requirement lines, skipping blanks, `#` comments and malformed lines.
pub fn parse_requirement_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> RequirementList {
    let mut list = RequirementList::default();
    for (idx, line) in lines.into_iter().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match Requirement::parse(line) {
            Some(req) => {
                debug!("requirement line {}: {}", idx + 1, req);
                list.requirements.push(req);
            }
            None => {
                warn!("skipping malformed requirement on line {}: '{}'", idx + 1, line);
                list.skipped += 1;
            }
        }
    }
    list
}

/// Read a newline-delimited requirement list.
pub fn parse_requirements_file(path: &Path) -> Result<RequirementList, RequirementError> {
    let content = std::fs::read_to_string(path).map_err(|source| RequirementError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_requirement_lines(content.lines()))
}
