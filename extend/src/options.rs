use std::path::PathBuf;

use serde::Deserialize;

/// Resolution settings. Every field has a default, so a partial TOML table is enough.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtendOptions {
    /// Base directory that every `src` resolves against.
    pub root: PathBuf,
    /// Tag of the extends marker.
    pub tag_name: String,
    /// Tag of blocks that hold default content in a layout.
    pub slot_tag_name: String,
    /// Tag of override blocks inside an extends marker.
    pub fill_tag_name: String,
    /// Fail on overrides the layout does not define. When off they are skipped.
    pub strict: bool,
    /// Longest layout chain accepted before giving up.
    pub max_depth: usize,
}

impl Default for ExtendOptions {
    fn default() -> Self {
        ExtendOptions {
            root: PathBuf::from("."),
            tag_name: "extends".to_string(),
            slot_tag_name: "block".to_string(),
            fill_tag_name: "block".to_string(),
            strict: true,
            max_depth: 64,
        }
    }
}

impl ExtendOptions {
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Absolute path of `src` under the configured root.
    pub fn resolve_src(&self, src: &str) -> PathBuf {
        let joined = self.root.join(src);
        std::path::absolute(&joined).unwrap_or(joined)
    }
}
