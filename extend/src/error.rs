use std::path::PathBuf;

use markup::ParseError;
use thiserror::Error;

use crate::PLUGIN_NAME;

/// Failures while resolving `<extends>`/`<block>` markers. None of them are recoverable:
/// the whole rewrite is abandoned.
#[derive(Debug, Error)]
pub enum ExtendError {
    #[error("[{plugin}] <{tag}> has no \"src\"", plugin = PLUGIN_NAME)]
    MissingExtendsSrc { tag: String },

    #[error("[{plugin}] <{tag}> has no \"name\"", plugin = PLUGIN_NAME)]
    MissingBlockName { tag: String },

    #[error("[{plugin}] Unexpected block \"{name}\"", plugin = PLUGIN_NAME)]
    UnexpectedBlock { name: String },

    #[error(
        "[{plugin}] layout chain is deeper than {limit} levels at '{}'",
        .path.display(),
        plugin = PLUGIN_NAME
    )]
    ChainTooDeep { limit: usize, path: PathBuf },

    /// Loader failures surface as they are.
    #[error(transparent)]
    Load(#[from] LoadError),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse errors in '{}': {}", .path.display(), join_messages(.errors))]
    Parse {
        path: PathBuf,
        /// Text that failed to parse, kept so callers can render diagnostics.
        text: String,
        errors: Vec<ParseError>,
    },
}

impl LoadError {
    pub fn path(&self) -> &PathBuf {
        match self {
            LoadError::Io { path, .. } => path,
            LoadError::Parse { path, .. } => path,
        }
    }
}

fn join_messages(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
