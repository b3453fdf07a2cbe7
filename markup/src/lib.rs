pub mod markdown;
pub mod node;
pub mod parser;

pub use node::{Attribute, Document, Element, Node};
pub use parser::{ParseError, Parser};
