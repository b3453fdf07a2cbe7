pub mod dependency;
pub mod error;
pub mod index;
pub mod loader;
pub mod merge;
pub mod options;
pub mod resolver;
pub mod template;

pub use dependency::Dependency;
pub use error::{ExtendError, LoadError};
pub use index::BlockIndex;
pub use loader::{FsLoader, Loader, MemoryLoader};
pub use merge::merge;
pub use options::ExtendOptions;
pub use resolver::{Resolved, Resolver, rewrite, rewrite_document};

/// Prefix of every validation error message.
pub const PLUGIN_NAME: &str = "markup-extend";
