//! Core package identity types.
//!
//! A package is identified by its name plus an ordered, dotted numeric
//! version. [`PackageVersion`] wraps [`semver::Version`] so ordering follows
//! semantic-version rules while still accepting the shorter `1` and `1.2`
//! spellings that content authors tend to write.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::naming::liberal_id;

/// Maximum number of dotted components a version may have.
const MAX_COMPONENTS: usize = 3;

/// Error returned when a version string is not a dotted numeric version.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid package version '{input}': {reason}")]
pub struct VersionParseError {
    /// The rejected input.
    pub input: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

/// An ordered package version.
///
/// Accepts one to three decimal components (`2`, `2.1`, `2.1.7`). Missing
/// components are treated as zero for comparison, so `1.0` and `1.0.0` are
/// the same version. The number of components written is remembered only for
/// display.
///
/// # Example
///
/// ```
/// use swole::package::PackageVersion;
///
/// let short: PackageVersion = "1.2".parse().unwrap();
/// let long: PackageVersion = "1.2.0".parse().unwrap();
///
/// assert_eq!(short, long);
/// assert_eq!(short.to_string(), "1.2");
/// assert!(short < "1.10".parse::<PackageVersion>().unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct PackageVersion {
    version: Version,
    components: u8,
}

impl PackageVersion {
    /// Create a three-component version.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            version: Version::new(major, minor, patch),
            components: 3,
        }
    }

    /// Parse a dotted numeric version string.
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        let reject = |reason| VersionParseError {
            input: input.to_string(),
            reason,
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(reject("version is empty"));
        }

        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() > MAX_COMPONENTS {
            return Err(reject("at most three components are allowed"));
        }

        let mut numbers = [0u64; MAX_COMPONENTS];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(reject("components must be decimal numbers"));
            }
            *slot = part
                .parse::<u64>()
                .map_err(|_| reject("component is out of range"))?;
        }

        Ok(Self {
            version: Version::new(numbers[0], numbers[1], numbers[2]),
            components: parts.len() as u8,
        })
    }

    /// The underlying semantic version.
    pub fn as_semver(&self) -> &Version {
        &self.version
    }

    pub fn major(&self) -> u64 {
        self.version.major
    }

    pub fn minor(&self) -> u64 {
        self.version.minor
    }

    pub fn patch(&self) -> u64 {
        self.version.patch
    }
}

impl Default for PackageVersion {
    fn default() -> Self {
        Self {
            version: Version::new(1, 0, 0),
            components: 2,
        }
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for PackageVersion {}

impl Hash for PackageVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.version.hash(state);
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version.cmp(&other.version)
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.components {
            1 => write!(f, "{}", self.version.major),
            2 => write!(f, "{}.{}", self.version.major, self.version.minor),
            _ => write!(
                f,
                "{}.{}.{}",
                self.version.major, self.version.minor, self.version.patch
            ),
        }
    }
}

impl FromStr for PackageVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Version> for PackageVersion {
    fn from(version: Version) -> Self {
        Self {
            version,
            components: 3,
        }
    }
}

impl Serialize for PackageVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackageVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Core package identity.
///
/// Two identifiers are equal when their names are equal and their versions
/// compare equal. Identifiers order by name first, then by version.
///
/// # Example
///
/// ```
/// use swole::package::{PackageIdentifier, PackageVersion};
///
/// let id = PackageIdentifier::new("castle-kit", PackageVersion::new(2, 0, 1));
/// assert_eq!(id.to_string(), "castle-kit-2.0.1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageIdentifier {
    /// Package name as declared in the manifest.
    pub name: String,

    /// Parsed package version.
    pub version: PackageVersion,
}

impl PackageIdentifier {
    /// Create a new identifier.
    pub fn new(name: impl Into<String>, version: PackageVersion) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Create an identifier from a name and an unparsed version string.
    pub fn parse(name: impl Into<String>, version: &str) -> Result<Self, VersionParseError> {
        Ok(Self::new(name, PackageVersion::parse(version)?))
    }

    /// Case and punctuation insensitive form of the name.
    pub fn liberal_id(&self) -> String {
        liberal_id(&self.name)
    }
}

impl fmt::Display for PackageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}
