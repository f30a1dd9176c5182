//! The persisted package descriptor.

use serde::{Deserialize, Serialize};

use super::{PackageIdentifier, PackageInfo};

/// Metadata plus the ordered set of packages this package depends on.
///
/// Equality compares the info exactly and the dependencies as a set, so two
/// manifests listing the same dependencies in different orders are equal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageManifest {
    pub info: PackageInfo,

    #[serde(default)]
    pub dependencies: Vec<PackageIdentifier>,
}

impl PackageManifest {
    pub fn new(info: PackageInfo) -> Self {
        Self {
            info,
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<PackageIdentifier>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Decode a manifest from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Encode the manifest as pretty-printed JSON.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    /// Parsed identity of the package, if its version parses.
    pub fn identifier(&self) -> Option<PackageIdentifier> {
        self.info.identifier()
    }

    pub fn contains_dependency(&self, id: &PackageIdentifier) -> bool {
        self.dependencies.contains(id)
    }
}

impl PartialEq for PackageManifest {
    fn eq(&self, other: &Self) -> bool {
        self.info == other.info
            && self
                .dependencies
                .iter()
                .all(|dep| other.dependencies.contains(dep))
            && other
                .dependencies
                .iter()
                .all(|dep| self.dependencies.contains(dep))
    }
}

impl Eq for PackageManifest {}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(name: &str, version: &str) -> PackageIdentifier {
        PackageIdentifier::parse(name, version).unwrap()
    }

    #[test]
    fn test_round_trip_bytes() {
        let manifest = PackageManifest::new(PackageInfo::new("mypack", "1.0").with_curator("jo"))
            .with_dependencies(vec![dep("base", "2"), dep("trees", "1.1")]);

        let bytes = manifest.to_bytes().unwrap();
        let decoded = PackageManifest::from_bytes(&bytes).unwrap();

        assert_eq!(decoded, manifest);
        assert_eq!(decoded.dependencies[0], dep("base", "2"));
    }

    #[test]
    fn test_equality_ignores_dependency_order() {
        let a = PackageManifest::new(PackageInfo::new("mypack", "1"))
            .with_dependencies(vec![dep("a-pack", "1"), dep("b-pack", "1")]);
        let b = PackageManifest::new(PackageInfo::new("mypack", "1"))
            .with_dependencies(vec![dep("b-pack", "1"), dep("a-pack", "1")]);
        let c = PackageManifest::new(PackageInfo::new("mypack", "1"))
            .with_dependencies(vec![dep("a-pack", "1")]);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_dependencies_default_to_empty() {
        let decoded =
            PackageManifest::from_bytes(br#"{"info":{"name":"mypack","version":"1"}}"#).unwrap();
        assert!(decoded.dependencies.is_empty());
        assert_eq!(decoded.identifier(), Some(dep("mypack", "1")));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(PackageManifest::from_bytes(b"not json").is_err());
        assert!(PackageManifest::from_bytes(br#"{"dependencies":[]}"#).is_err());
    }
}
