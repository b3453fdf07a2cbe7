pub mod error;
mod structural;

pub use error::ParseError;

use crate::node::Document;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: impl Into<String>, file_id: usize) -> Self {
        Parser {
            source: source.into(),
            file_id,
        }
    }

    /// Parse the source markup into a Document tree.
    pub fn parse(&self) -> Result<Document, Vec<ParseError>> {
        let nodes = structural::parse_nodes(&self.source, self.file_id)?;
        Ok(Document { nodes })
    }
}
