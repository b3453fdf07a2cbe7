use std::collections::HashMap;
use std::path::{Path, PathBuf};

use markup::{Node, Parser, markdown};

use crate::error::LoadError;

/// Reads layouts by absolute path and parses them with the host grammar.
pub trait Loader {
    fn load(&self, path: &Path) -> Result<String, LoadError>;

    /// Parse loaded text. Markdown files are rendered to markup first.
    fn parse(&self, path: &Path, text: String) -> Result<Vec<Node>, LoadError> {
        let text = if markdown::is_markdown_path(path) {
            markdown::render(&text)
        } else {
            text
        };
        match Parser::new(text.as_str(), 0).parse() {
            Ok(document) => Ok(document.nodes),
            Err(errors) => Err(LoadError::Parse {
                path: path.to_path_buf(),
                text,
                errors,
            }),
        }
    }
}

impl<L: Loader + ?Sized> Loader for &L {
    fn load(&self, path: &Path) -> Result<String, LoadError> {
        (**self).load(path)
    }

    fn parse(&self, path: &Path, text: String) -> Result<Vec<Node>, LoadError> {
        (**self).parse(path, text)
    }
}

/// Loads layouts from the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

impl Loader for FsLoader {
    fn load(&self, path: &Path) -> Result<String, LoadError> {
        std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Serves layouts from memory, keyed by absolute path.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<PathBuf, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `text` under `path`, made absolute against the working directory.
    pub fn with_file(mut self, path: impl AsRef<Path>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, text: impl Into<String>) {
        let path = path.as_ref();
        let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        self.files.insert(key, text.into());
    }
}

impl Loader for MemoryLoader {
    fn load(&self, path: &Path) -> Result<String, LoadError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| LoadError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
    }
}
