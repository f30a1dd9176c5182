//! Free-form structured data content.

use std::any::Any;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Content, ContentCore, ContentInfo, ContentKind};

/// Arbitrary JSON data owned by a package.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataContent {
    #[serde(flatten)]
    core: ContentCore,

    #[serde(default)]
    pub data: Value,
}

impl DataContent {
    pub fn new(info: ContentInfo, data: Value) -> Self {
        Self {
            core: ContentCore::new(info),
            data,
        }
    }
}

impl Content for DataContent {
    fn core(&self) -> &ContentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ContentCore {
        &mut self.core
    }

    fn kind(&self) -> ContentKind {
        ContentKind::Data
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
