//! Descriptive package metadata.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{PackageIdentifier, PackageVersion};

/// Shortest accepted package name.
pub const MIN_NAME_LENGTH: usize = 3;

/// Longest accepted package name.
pub const MAX_NAME_LENGTH: usize = 64;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\- ]*$").expect("name pattern is a valid regex")
    })
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[0-9]+(\.[0-9]+){0,2}$").expect("version pattern is a valid regex")
    })
}

/// Metadata a curator declares for a package.
///
/// The version is kept as the string the author wrote so an invalid value
/// survives a load/save cycle. Use [`PackageInfo::identifier`] to get the
/// parsed identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    /// Where the package was originally published, if anywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub curator: String,

    #[serde(default)]
    pub description: String,
}

impl PackageInfo {
    /// Create metadata with a name and version and empty descriptive fields.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    pub fn with_curator(mut self, curator: impl Into<String>) -> Self {
        self.curator = curator.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Whether the name satisfies the name grammar.
    pub fn is_valid_name(&self) -> bool {
        let length = self.name.chars().count();
        (MIN_NAME_LENGTH..=MAX_NAME_LENGTH).contains(&length) && name_pattern().is_match(&self.name)
    }

    /// Whether the version is a dotted numeric version.
    pub fn is_valid_version(&self) -> bool {
        version_pattern().is_match(&self.version) && PackageVersion::parse(&self.version).is_ok()
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_name() && self.is_valid_version()
    }

    /// Parsed identity, or `None` when the version does not parse.
    pub fn identifier(&self) -> Option<PackageIdentifier> {
        PackageVersion::parse(&self.version)
            .ok()
            .map(|version| PackageIdentifier::new(self.name.clone(), version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["abc", "My Pack", "castle-kit_v2.1", "9lives"] {
            assert!(PackageInfo::new(name, "1").is_valid_name(), "{name}");
        }
    }

    #[test]
    fn test_invalid_names() {
        let too_long = "a".repeat(MAX_NAME_LENGTH + 1);
        for name in ["", "ab", " leading", "-dash", "semi;colon", "slash/name", too_long.as_str()] {
            assert!(!PackageInfo::new(name, "1").is_valid_name(), "{name}");
        }
    }

    #[test]
    fn test_version_validity() {
        assert!(PackageInfo::new("abc", "1").is_valid_version());
        assert!(PackageInfo::new("abc", "1.2.3").is_valid_version());
        assert!(!PackageInfo::new("abc", "1.2.3.4").is_valid_version());
        assert!(!PackageInfo::new("abc", " 1.2").is_valid_version());
        assert!(!PackageInfo::new("abc", "").is_valid_version());
    }

    #[test]
    fn test_identifier() {
        let info = PackageInfo::new("mypack", "1.1");
        let id = info.identifier().unwrap();
        assert_eq!(id.name, "mypack");
        assert_eq!(id.version, PackageVersion::new(1, 1, 0));

        assert!(PackageInfo::new("mypack", "latest").identifier().is_none());
    }

    #[test]
    fn test_value_equality() {
        let a = PackageInfo::new("mypack", "1").with_curator("jo");
        let b = PackageInfo::new("mypack", "1").with_curator("jo");
        let c = b.clone().with_url("https://example.com/mypack");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_serde_camel_case_and_defaults() {
        let info: PackageInfo = serde_json::from_str(r#"{"name":"mypack","version":"2"}"#).unwrap();
        assert_eq!(info.curator, "");
        assert!(info.url.is_none());

        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("url"));
    }
}
