//! Script source content.

use std::any::Any;

use serde::{Deserialize, Serialize};

use super::{Content, ContentCore, ContentInfo, ContentKind};

/// Script source handed to the host's script runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptContent {
    #[serde(flatten)]
    core: ContentCore,

    #[serde(default)]
    pub source: String,
}

impl ScriptContent {
    pub fn new(info: ContentInfo, source: impl Into<String>) -> Self {
        Self {
            core: ContentCore::new(info),
            source: source.into(),
        }
    }
}

impl Content for ScriptContent {
    fn core(&self) -> &ContentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ContentCore {
        &mut self.core
    }

    fn kind(&self) -> ContentKind {
        ContentKind::Script
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
