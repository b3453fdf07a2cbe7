use std::path::PathBuf;

use serde::Serialize;

/// A file loaded while resolving a document, for build/watch invalidation.
///
/// Serializes as `{"type": "dependency", "file": ..., "from": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "dependency")]
pub struct Dependency {
    /// Absolute path of the loaded file.
    pub file: PathBuf,
    /// Identifier of the document whose `<extends>` triggered the load.
    pub from: String,
}

impl Dependency {
    pub fn new(file: impl Into<PathBuf>, from: impl Into<String>) -> Self {
        Dependency {
            file: file.into(),
            from: from.into(),
        }
    }
}
