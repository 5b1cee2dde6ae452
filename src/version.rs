//! Version normalisation and comparison.
//!
//! Versions are compared as fixed 3-component tuples:
//!
//! | Input     | Normalised       |
//! |-----------|------------------|
//! | `2`       | `(2, 0, 0)`      |
//! | `2.1`     | `(2, 1, 0)`      |
//! | `2.1.3`   | `(2, 1, 3)`      |
//! | `2.1.3.4` | `(2, 1, 3)`      |
//! | `1.0rc1`  | `(1, "0rc1", 0)` |
//!
//! Numeric components compare numerically and text components compare
//! lexicographically. A numeric and a text component at the same position
//! have no order: equality operators treat them as unequal, ordering
//! operators return [`VersionError::Incomparable`].

use crate::error::VersionError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One dotted component of a version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    /// Purely numeric component.
    Num(u64),
    /// Anything else, kept verbatim.
    Text(String),
}

impl Component {
    fn parse(raw: &str) -> Self {
        match raw.parse::<u64>() {
            Ok(n) => Component::Num(n),
            Err(_) => Component::Text(raw.to_string()),
        }
    }

    /// Order two components, `None` when one is numeric and the other text.
    fn partial_order(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Component::Num(a), Component::Num(b)) => Some(a.cmp(b)),
            (Component::Text(a), Component::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Num(n) => write!(f, "{}", n),
            Component::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Normalised `major.minor.patch` version tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    /// Exactly three components.
    pub parts: [Component; 3],
}

impl Version {
    /// Normalise a dotted version string.
    ///
    /// Splits on `.`, pads with `0` up to three components and drops any
    /// component past the third.
    pub fn normalize(version: &str) -> Self {
        let mut raw: Vec<&str> = version.trim().split('.').collect();
        while raw.len() < 3 {
            raw.push("0");
        }
        Self {
            parts: [
                Component::parse(raw[0]),
                Component::parse(raw[1]),
                Component::parse(raw[2]),
            ],
        }
    }

    /// Build a numeric version directly.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            parts: [
                Component::Num(major),
                Component::Num(minor),
                Component::Num(patch),
            ],
        }
    }

    /// True when every component is numeric.
    pub fn is_numeric(&self) -> bool {
        self.parts.iter().all(|p| matches!(p, Component::Num(_)))
    }

    /// Tuple comparison. `Err(position)` when the first differing position
    /// mixes a numeric and a text component.
    fn order(&self, other: &Self) -> Result<Ordering, usize> {
        for (i, (a, b)) in self.parts.iter().zip(other.parts.iter()).enumerate() {
            if a == b {
                continue;
            }
            return a.partial_order(b).ok_or(i);
        }
        Ok(Ordering::Equal)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.parts[0], self.parts[1], self.parts[2])
    }
}

/// Comparison operator of a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// Any other run of `<>=!` characters, kept as written.
    Other(String),
}

impl Operator {
    /// Map an operator run to an operator. Never fails: unknown runs
    /// become [`Operator::Other`].
    pub fn from_symbol(symbol: &str) -> Self {
        match symbol {
            "==" => Operator::Eq,
            "!=" => Operator::Ne,
            ">=" => Operator::Ge,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            "<" => Operator::Lt,
            other => Operator::Other(other.to_string()),
        }
    }

    /// Symbol as written in a requirement.
    pub fn as_str(&self) -> &str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Other(s) => s,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check `v1 <op> v2`.
///
/// A missing `v2` or `op` means no constraint and is always satisfied.
/// Unrecognised operators are never satisfied.
pub fn compare(
    v1: &Version,
    v2: Option<&Version>,
    op: Option<&Operator>,
) -> Result<bool, VersionError> {
    let (Some(v2), Some(op)) = (v2, op) else {
        return Ok(true);
    };

    let ordering = v1.order(v2);
    let incomparable = |position| VersionError::Incomparable {
        left: v1.to_string(),
        right: v2.to_string(),
        position,
    };

    Ok(match op {
        Operator::Eq => matches!(ordering, Ok(Ordering::Equal)),
        Operator::Ne => !matches!(ordering, Ok(Ordering::Equal)),
        Operator::Gt => ordering.map_err(incomparable)? == Ordering::Greater,
        Operator::Ge => ordering.map_err(incomparable)? != Ordering::Less,
        Operator::Lt => ordering.map_err(incomparable)? == Ordering::Less,
        Operator::Le => ordering.map_err(incomparable)? != Ordering::Greater,
        Operator::Other(_) => false,
    })
}
