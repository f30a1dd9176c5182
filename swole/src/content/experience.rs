//! Experiences: playable scenes that require other packages.

use std::any::Any;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Content, ContentCore, ContentInfo, ContentKind};
use crate::package::PackageIdentifier;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceContent {
    #[serde(flatten)]
    core: ContentCore,

    /// Packages that must be loaded before the experience can run.
    #[serde(default)]
    pub required_packages: Vec<PackageIdentifier>,

    /// Name of the script that starts the experience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_script: Option<String>,

    #[serde(default)]
    pub settings: Value,
}

impl ExperienceContent {
    pub fn new(info: ContentInfo, required_packages: Vec<PackageIdentifier>) -> Self {
        Self {
            core: ContentCore::new(info),
            required_packages,
            entry_script: None,
            settings: Value::Null,
        }
    }

    pub fn with_entry_script(mut self, script: impl Into<String>) -> Self {
        self.entry_script = Some(script.into());
        self
    }
}

impl Content for ExperienceContent {
    fn core(&self) -> &ContentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ContentCore {
        &mut self.core
    }

    fn kind(&self) -> ContentKind {
        ContentKind::Experience
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn extract_dependencies(&self) -> Vec<PackageIdentifier> {
        self.required_packages.clone()
    }
}
