//! Creations: assemblies of parts that may live in other packages.

use std::any::Any;

use serde::{Deserialize, Serialize};

use super::{Content, ContentCore, ContentInfo, ContentKind};
use crate::package::PackageIdentifier;

/// One placed part of a creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationPart {
    /// Name of the referenced content item.
    pub name: String,

    pub kind: ContentKind,

    /// Package the part comes from, or `None` for the owning package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageIdentifier>,

    #[serde(default)]
    pub position: [f32; 3],

    #[serde(default = "identity_rotation")]
    pub rotation: [f32; 4],

    #[serde(default = "unit_scale")]
    pub scale: [f32; 3],
}

fn identity_rotation() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

fn unit_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

impl CreationPart {
    pub fn new(name: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            package: None,
            position: [0.0; 3],
            rotation: identity_rotation(),
            scale: unit_scale(),
        }
    }

    pub fn from_package(mut self, package: PackageIdentifier) -> Self {
        self.package = Some(package);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationContent {
    #[serde(flatten)]
    core: ContentCore,

    #[serde(default)]
    pub parts: Vec<CreationPart>,
}

impl CreationContent {
    pub fn new(info: ContentInfo, parts: Vec<CreationPart>) -> Self {
        Self {
            core: ContentCore::new(info),
            parts,
        }
    }
}

impl Content for CreationContent {
    fn core(&self) -> &ContentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ContentCore {
        &mut self.core
    }

    fn kind(&self) -> ContentKind {
        ContentKind::Creation
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn extract_dependencies(&self) -> Vec<PackageIdentifier> {
        let mut dependencies: Vec<PackageIdentifier> = Vec::new();
        for package in self.parts.iter().filter_map(|part| part.package.as_ref()) {
            if !dependencies.contains(package) {
                dependencies.push(package.clone());
            }
        }
        dependencies
    }
}
