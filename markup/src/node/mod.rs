use std::fmt;
use std::ops::Range;

/// Elements that never have content or an end tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose content is raw text, never parsed as markup.
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

pub fn is_raw_text_element(name: &str) -> bool {
    RAW_TEXT_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

/// A Document is the top-level sequence of markup nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub nodes: Vec<Node>,
}

impl From<Vec<Node>> for Document {
    fn from(nodes: Vec<Node>) -> Self {
        Document { nodes }
    }
}

/// A single node in the markup tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Raw text, kept exactly as written (entities are not decoded).
    Text(String),
    /// `<!-- ... -->`, without the delimiters.
    Comment(String),
    /// `<!DOCTYPE ...>` or any other `<!...>` declaration, without the delimiters.
    Doctype(String),
    Element(Element),
}

impl Node {
    pub fn text(s: impl Into<String>) -> Self {
        Node::Text(s.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }
}

/// A tagged node with attributes and ordered child content.
#[derive(Debug, Clone)]
pub struct Element {
    /// Tag name as written in the source.
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub content: Vec<Node>,
    /// Written as `<name/>` in the source.
    pub self_closing: bool,
    /// Byte span of the element in its source, for diagnostics.
    pub span: Range<usize>,
}

/// Spans are source bookkeeping and do not take part in tree equality.
impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.attributes == other.attributes
            && self.content == other.content
            && self.self_closing == other.self_closing
    }
}

impl Element {
    /// Case-insensitive tag comparison.
    pub fn is(&self, tag: &str) -> bool {
        self.name.eq_ignore_ascii_case(tag)
    }

    /// Value of the first attribute with this name. Boolean attributes yield `Some("")`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_deref().unwrap_or(""))
    }

    pub fn is_void(&self) -> bool {
        is_void_element(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    /// `None` for boolean attributes written without `=`.
    pub value: Option<String>,
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Text(text) => write!(f, "{}", text),
            Node::Comment(text) => write!(f, "<!--{}-->", text),
            Node::Doctype(text) => write!(f, "<!{}>", text),
            Node::Element(element) => write!(f, "{}", element),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        for attribute in &self.attributes {
            write!(f, " {}", attribute)?;
        }
        if self.self_closing && self.content.is_empty() {
            return write!(f, "/>");
        }
        write!(f, ">")?;
        if self.is_void() && self.content.is_empty() {
            return Ok(());
        }
        for node in &self.content {
            write!(f, "{}", node)?;
        }
        write!(f, "</{}>", self.name)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            None => write!(f, "{}", self.name),
            Some(value) if value.contains('"') && !value.contains('\'') => {
                write!(f, "{}='{}'", self.name, value)
            }
            Some(value) => write!(f, "{}=\"{}\"", self.name, value.replace('"', "&quot;")),
        }
    }
}
