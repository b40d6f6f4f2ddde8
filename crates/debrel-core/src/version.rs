//! Semantic versions and bump arithmetic.
//!
//! Release versions are strict semver strings. The rendered form doubles as
//! the git tag name, so no `v` prefix is accepted or produced.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::{BuildMetadata, Version};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A version string that does not follow the semver grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{input}' is not a semantic version: {reason}")]
pub struct VersionParseError {
    /// The rejected input.
    pub input: String,
    /// Parser diagnostic.
    pub reason: String,
}

/// A bump whose incremented component would leave the `u64` range.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot make a {level} bump of {version}: component is already at its maximum")]
pub struct BumpOverflow {
    /// The version being bumped.
    pub version: String,
    /// The component that overflowed.
    pub level: BumpLevel,
}

/// An immutable semantic version.
///
/// Ordering and equality follow semver precedence: build metadata is
/// carried and rendered but never compared.
#[derive(Debug, Clone)]
pub struct SemanticVersion(Version);

impl SemanticVersion {
    /// Derive the next version for a bump.
    ///
    /// The bumped component becomes `level_override` when given, else its
    /// current value plus one. Less significant components are zeroed and
    /// build metadata is cleared. Pre-release identifiers are left alone.
    pub fn bump(
        &self,
        level: BumpLevel,
        level_override: Option<u64>,
    ) -> Result<Self, BumpOverflow> {
        let mut next = self.0.clone();
        let component = match level {
            BumpLevel::Major => &mut next.major,
            BumpLevel::Minor => &mut next.minor,
            BumpLevel::Patch => &mut next.patch,
        };
        *component = match level_override {
            Some(value) => value,
            None => component.checked_add(1).ok_or_else(|| BumpOverflow {
                version: self.to_string(),
                level,
            })?,
        };
        match level {
            BumpLevel::Major => {
                next.minor = 0;
                next.patch = 0;
            }
            BumpLevel::Minor => next.patch = 0,
            BumpLevel::Patch => {}
        }
        next.build = BuildMetadata::EMPTY;
        Ok(Self(next))
    }
}

impl FromStr for SemanticVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s.trim()).map(Self).map_err(|e| VersionParseError {
            input: s.to_string(),
            reason: e.to_string(),
        })
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp_precedence(&other.0)
    }
}

impl From<Version> for SemanticVersion {
    fn from(version: Version) -> Self {
        Self(version)
    }
}

impl Serialize for SemanticVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemanticVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Which component a bump release increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BumpLevel {
    /// `X.0.0`
    Major,
    /// `x.Y.0`
    Minor,
    /// `x.y.Z`
    Patch,
}

impl fmt::Display for BumpLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
            Self::Patch => write!(f, "patch"),
        }
    }
}
