//! The closed set of content kinds and their reserved file extensions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a content item. Each kind owns one reserved file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentKind {
    #[default]
    Data,
    Script,
    Creation,
    Animation,
    Experience,
    Image,
    Avatar,
    PoseRig,
    Actor,
    Mesh,
    Material,
    Model,
}

impl ContentKind {
    /// Every kind, in extension-table order.
    pub const ALL: [ContentKind; 12] = [
        ContentKind::Data,
        ContentKind::Script,
        ContentKind::Creation,
        ContentKind::Animation,
        ContentKind::Experience,
        ContentKind::Image,
        ContentKind::Avatar,
        ContentKind::PoseRig,
        ContentKind::Actor,
        ContentKind::Mesh,
        ContentKind::Material,
        ContentKind::Model,
    ];

    /// Default file extension, without the leading dot.
    pub fn default_extension(self) -> &'static str {
        match self {
            ContentKind::Data => "swlson",
            ContentKind::Script => "swlua",
            ContentKind::Creation => "swcreation",
            ContentKind::Animation => "swanim",
            ContentKind::Experience => "swexp",
            ContentKind::Image => "swimg",
            ContentKind::Avatar => "swavatar",
            ContentKind::PoseRig => "swrig",
            ContentKind::Actor => "swactor",
            ContentKind::Mesh => "swmesh",
            ContentKind::Material => "swmat",
            ContentKind::Model => "swmodel",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ContentKind::Data => "data",
            ContentKind::Script => "script",
            ContentKind::Creation => "creation",
            ContentKind::Animation => "animation",
            ContentKind::Experience => "experience",
            ContentKind::Image => "image",
            ContentKind::Avatar => "avatar",
            ContentKind::PoseRig => "pose-rig",
            ContentKind::Actor => "actor",
            ContentKind::Mesh => "mesh",
            ContentKind::Material => "material",
            ContentKind::Model => "model",
        }
    }

    /// Parse a kind from its name (as produced by [`ContentKind::name`]).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    /// Whether an item of this kind satisfies a kind filter.
    ///
    /// `None` accepts every kind.
    pub fn is_assignable_to(self, requested: Option<ContentKind>) -> bool {
        requested.map_or(true, |kind| kind == self)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
