use std::ops::Range;

use crate::node::{Attribute, Element, Node, is_raw_text_element, is_void_element};
use crate::parser::error::ParseError;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse markup source text into a list of top-level nodes.
pub fn parse_nodes(source: &str, file_id: usize) -> Result<Vec<Node>, Vec<ParseError>> {
    let mut state = ParseState::new(source, file_id);
    state.process();
    state.finalize()
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

struct ParseState<'a> {
    source: &'a str,
    file_id: usize,
    /// Current byte offset.
    pos: usize,
    /// Start of the text run not yet emitted as a Text node.
    text_start: usize,
    /// Stack of elements being built. Innermost = current parent.
    element_stack: Vec<ElementBuilder>,
    /// Completed top-level nodes.
    top_nodes: Vec<Node>,
    errors: Vec<ParseError>,
}

struct ElementBuilder {
    name: String,
    attributes: Vec<Attribute>,
    content: Vec<Node>,
    span_start: usize,
}

impl ElementBuilder {
    fn into_element(self, span_end: usize) -> Element {
        Element {
            name: self.name,
            attributes: self.attributes,
            content: self.content,
            self_closing: false,
            span: self.span_start..span_end,
        }
    }
}

/// A start tag after its attributes have been read.
struct StartTag {
    name: String,
    attributes: Vec<Attribute>,
    self_closing: bool,
    end: usize,
}

impl<'a> ParseState<'a> {
    fn new(source: &'a str, file_id: usize) -> Self {
        ParseState {
            source,
            file_id,
            pos: 0,
            text_start: 0,
            element_stack: Vec::new(),
            top_nodes: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn process(&mut self) {
        let len = self.source.len();

        while self.pos < len {
            let Some(offset) = self.source[self.pos..].find('<') else {
                self.pos = len;
                break;
            };
            let lt = self.pos + offset;
            let rest = &self.source[lt..];
            let next = rest.as_bytes().get(1).copied();

            if rest.starts_with("<!--") {
                self.flush_text(lt);
                self.parse_comment(lt);
            } else if next == Some(b'!') {
                self.flush_text(lt);
                self.parse_declaration(lt);
            } else if next == Some(b'/')
                && rest.as_bytes().get(2).is_some_and(|b| b.is_ascii_alphabetic())
            {
                self.flush_text(lt);
                self.parse_end_tag(lt);
            } else if next.is_some_and(|b| b.is_ascii_alphabetic()) {
                self.flush_text(lt);
                self.parse_element(lt);
            } else {
                // A literal `<` that does not open a tag stays in the text run.
                self.pos = lt + 1;
            }
        }
    }

    fn parse_comment(&mut self, lt: usize) {
        let body_start = lt + 4;
        match self.source[body_start..].find("-->") {
            Some(end) => {
                let body = self.source[body_start..body_start + end].to_string();
                self.push_node(Node::Comment(body));
                self.pos = body_start + end + 3;
            }
            None => {
                self.errors.push(
                    ParseError::error("unterminated comment", lt..self.source.len(), self.file_id)
                        .with_note("comments must be closed with `-->`"),
                );
                self.pos = self.source.len();
            }
        }
        self.text_start = self.pos;
    }

    fn parse_declaration(&mut self, lt: usize) {
        let body_start = lt + 2;
        match self.source[body_start..].find('>') {
            Some(end) => {
                let body = self.source[body_start..body_start + end].to_string();
                self.push_node(Node::Doctype(body));
                self.pos = body_start + end + 1;
            }
            None => {
                self.errors.push(ParseError::error(
                    "unterminated declaration",
                    lt..self.source.len(),
                    self.file_id,
                ));
                self.pos = self.source.len();
            }
        }
        self.text_start = self.pos;
    }

    fn parse_end_tag(&mut self, lt: usize) {
        let name_start = lt + 2;
        let name_end = scan_name(self.source, name_start);
        let name = self.source[name_start..name_end].to_string();

        let Some(gt) = self.source[name_end..].find('>') else {
            self.errors.push(ParseError::error(
                format!("unterminated closing tag `</{}`", name),
                lt..self.source.len(),
                self.file_id,
            ));
            self.pos = self.source.len();
            self.text_start = self.pos;
            return;
        };
        let end = name_end + gt + 1;
        self.pos = end;
        self.text_start = end;
        self.close_element(&name, lt..end);
    }

    fn parse_element(&mut self, lt: usize) {
        let Some(tag) = self.parse_start_tag(lt) else {
            self.pos = self.source.len();
            self.text_start = self.pos;
            return;
        };
        self.pos = tag.end;
        self.text_start = tag.end;

        if tag.self_closing || is_void_element(&tag.name) {
            self.push_node(Node::Element(Element {
                name: tag.name,
                attributes: tag.attributes,
                content: Vec::new(),
                self_closing: tag.self_closing,
                span: lt..tag.end,
            }));
            return;
        }

        if is_raw_text_element(&tag.name) {
            self.parse_raw_text(lt, tag);
            return;
        }

        self.element_stack.push(ElementBuilder {
            name: tag.name,
            attributes: tag.attributes,
            content: Vec::new(),
            span_start: lt,
        });
    }

    /// Read `<name attr=value ...>` starting at `lt`. Returns None after recording an error.
    fn parse_start_tag(&mut self, lt: usize) -> Option<StartTag> {
        let bytes = self.source.as_bytes();
        let name_start = lt + 1;
        let mut i = scan_name(self.source, name_start);
        let name = self.source[name_start..i].to_string();
        let mut attributes = Vec::new();

        loop {
            i = skip_whitespace(bytes, i);
            let Some(&c) = bytes.get(i) else {
                self.errors.push(
                    ParseError::error(
                        format!("unterminated tag `<{}`", name),
                        lt..self.source.len(),
                        self.file_id,
                    )
                    .with_note("expected `>` before end of input"),
                );
                return None;
            };

            match c {
                b'>' => {
                    return Some(StartTag {
                        name,
                        attributes,
                        self_closing: false,
                        end: i + 1,
                    });
                }
                b'/' if bytes.get(i + 1) == Some(&b'>') => {
                    return Some(StartTag {
                        name,
                        attributes,
                        self_closing: true,
                        end: i + 2,
                    });
                }
                b'/' => {
                    i += 1;
                }
                _ => {
                    let attr_start = i;
                    while i < bytes.len()
                        && !bytes[i].is_ascii_whitespace()
                        && !matches!(bytes[i], b'=' | b'>' | b'/')
                    {
                        i += 1;
                    }
                    if i == attr_start {
                        // Stray `=`; skip it so the scan always advances.
                        i += 1;
                        continue;
                    }
                    let attr_name = self.source[attr_start..i].to_string();

                    let after_name = skip_whitespace(bytes, i);
                    if bytes.get(after_name) != Some(&b'=') {
                        attributes.push(Attribute {
                            name: attr_name,
                            value: None,
                        });
                        continue;
                    }

                    i = skip_whitespace(bytes, after_name + 1);
                    let (value, next) = self.read_attribute_value(i)?;
                    attributes.push(Attribute {
                        name: attr_name,
                        value: Some(value),
                    });
                    i = next;
                }
            }
        }
    }

    fn read_attribute_value(&mut self, start: usize) -> Option<(String, usize)> {
        let bytes = self.source.as_bytes();
        match bytes.get(start) {
            Some(&quote) if quote == b'"' || quote == b'\'' => {
                let body = start + 1;
                match self.source[body..].find(quote as char) {
                    Some(end) => Some((
                        self.source[body..body + end].to_string(),
                        body + end + 1,
                    )),
                    None => {
                        self.errors.push(ParseError::error(
                            "unterminated quoted attribute value",
                            start..self.source.len(),
                            self.file_id,
                        ));
                        None
                    }
                }
            }
            _ => {
                let mut end = start;
                while end < bytes.len() && !bytes[end].is_ascii_whitespace() && bytes[end] != b'>'
                {
                    end += 1;
                }
                Some((self.source[start..end].to_string(), end))
            }
        }
    }

    /// Content of `<script>`/`<style>` is kept as a single text node up to the matching end tag.
    fn parse_raw_text(&mut self, lt: usize, tag: StartTag) {
        let body_start = tag.end;
        let closing = format!("</{}", tag.name.to_ascii_lowercase());
        let lowered = self.source[body_start..].to_ascii_lowercase();

        let (body_end, element_end) = match lowered.find(&closing) {
            Some(offset) => {
                let close_at = body_start + offset;
                let end = self.source[close_at..]
                    .find('>')
                    .map(|gt| close_at + gt + 1)
                    .unwrap_or(self.source.len());
                (close_at, end)
            }
            None => (self.source.len(), self.source.len()),
        };

        let mut content = Vec::new();
        if body_end > body_start {
            content.push(Node::Text(self.source[body_start..body_end].to_string()));
        }
        self.push_node(Node::Element(Element {
            name: tag.name,
            attributes: tag.attributes,
            content,
            self_closing: false,
            span: lt..element_end,
        }));
        self.pos = element_end;
        self.text_start = element_end;
    }

    /// Close the innermost open element named `name`, implicitly closing anything opened after it.
    fn close_element(&mut self, name: &str, span: Range<usize>) {
        let Some(index) = self
            .element_stack
            .iter()
            .rposition(|b| b.name.eq_ignore_ascii_case(name))
        else {
            let mut error = ParseError::error(
                format!("unexpected closing tag `</{}>`", name),
                span,
                self.file_id,
            )
            .with_note(format!("no `<{}>` element is open here", name));
            if let Some(open) = self.element_stack.last() {
                let tag_end = open.span_start + 1 + open.name.len();
                error = error.with_related(
                    open.span_start..tag_end,
                    format!("innermost open element is `<{}>`", open.name),
                );
            }
            self.errors.push(error);
            return;
        };

        while self.element_stack.len() > index + 1 {
            self.pop_element(span.start);
        }
        self.pop_element(span.end);
    }

    fn pop_element(&mut self, span_end: usize) {
        if let Some(builder) = self.element_stack.pop() {
            let element = builder.into_element(span_end);
            self.push_node(Node::Element(element));
        }
    }

    fn push_node(&mut self, node: Node) {
        if let Some(parent) = self.element_stack.last_mut() {
            parent.content.push(node);
        } else {
            self.top_nodes.push(node);
        }
    }

    fn flush_text(&mut self, upto: usize) {
        if upto > self.text_start {
            let text = self.source[self.text_start..upto].to_string();
            self.push_node(Node::Text(text));
        }
        self.text_start = upto;
    }

    fn finalize(mut self) -> Result<Vec<Node>, Vec<ParseError>> {
        let end = self.source.len();
        self.flush_text(end);

        // Elements still open at end of input are closed there.
        while !self.element_stack.is_empty() {
            self.pop_element(end);
        }

        if self.errors.is_empty() {
            Ok(self.top_nodes)
        } else {
            Err(self.errors)
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Scan a tag name: everything up to whitespace, `/` or `>`.
fn scan_name(source: &str, start: usize) -> usize {
    let bytes = source.as_bytes();
    let mut i = start;
    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'/' | b'>') {
        i += 1;
    }
    i
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}
