use std::ops::Range;

use markup::{Element, Node};

use crate::error::ExtendError;
use crate::options::ExtendOptions;

/// A markup node classified once by tag, so resolution never compares tag strings again.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    /// Text, comments and declarations, passed through as-is.
    Leaf(Node),
    /// Any other element. Its children live here; the element's own `content` is empty.
    Element(Element, Vec<TemplateNode>),
    Block(Block),
    Extends(Extends),
}

/// A named content region: default content in a layout, or an override inside `<extends>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// `None` when the attribute is missing or empty.
    pub name: Option<String>,
    pub merge: MergeType,
    pub content: Vec<TemplateNode>,
    pub span: Range<usize>,
}

impl Block {
    /// The block name, or `MissingBlockName` naming `tag`.
    pub fn require_name(&self, tag: &str) -> Result<&str, ExtendError> {
        self.name
            .as_deref()
            .ok_or_else(|| ExtendError::MissingBlockName {
                tag: tag.to_string(),
            })
    }
}

/// An extends marker. Only its direct override blocks survive adaptation.
#[derive(Debug, Clone, PartialEq)]
pub struct Extends {
    /// `None` when the attribute is missing or empty.
    pub src: Option<String>,
    pub blocks: Vec<Block>,
    /// Tag of a nameless block buried in the discarded part of the body, if any.
    pub unnamed_block: Option<String>,
    pub span: Range<usize>,
}

/// How an override combines with the layout's default content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeType {
    #[default]
    Replace,
    Append,
    Prepend,
}

impl MergeType {
    /// Read a `type` attribute. Unknown values fall back to replace.
    pub fn from_attribute(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("append") => MergeType::Append,
            Some(v) if v.eq_ignore_ascii_case("prepend") => MergeType::Prepend,
            _ => MergeType::Replace,
        }
    }

    pub fn apply(
        self,
        existing: Vec<TemplateNode>,
        incoming: Vec<TemplateNode>,
    ) -> Vec<TemplateNode> {
        match self {
            MergeType::Replace => incoming,
            MergeType::Append => existing.into_iter().chain(incoming).collect(),
            MergeType::Prepend => incoming.into_iter().chain(existing).collect(),
        }
    }
}

/// Classify a parsed tree against the configured tag names.
pub fn adapt(nodes: Vec<Node>, options: &ExtendOptions) -> Vec<TemplateNode> {
    nodes
        .into_iter()
        .map(|node| adapt_node(node, options))
        .collect()
}

fn adapt_node(node: Node, options: &ExtendOptions) -> TemplateNode {
    let Node::Element(mut element) = node else {
        return TemplateNode::Leaf(node);
    };

    if element.is(&options.tag_name) {
        let src = non_empty_attribute(&element, "src");
        // Dropped content still may not hide a nameless block.
        let unnamed_block = unnamed_block_tag(
            element
                .content
                .iter()
                .filter(|child| !matches!(child, Node::Element(e) if e.is(&options.fill_tag_name))),
            options,
        );
        // Anything in the body that is not an override block is dropped here.
        let blocks = element
            .content
            .into_iter()
            .filter_map(|child| match child {
                Node::Element(child) if child.is(&options.fill_tag_name) => {
                    Some(adapt_block(child, options))
                }
                _ => None,
            })
            .collect();
        return TemplateNode::Extends(Extends {
            src,
            blocks,
            unnamed_block,
            span: element.span,
        });
    }

    if element.is(&options.slot_tag_name) {
        return TemplateNode::Block(adapt_block(element, options));
    }

    let children = std::mem::take(&mut element.content);
    TemplateNode::Element(element, adapt(children, options))
}

fn adapt_block(element: Element, options: &ExtendOptions) -> Block {
    Block {
        name: non_empty_attribute(&element, "name"),
        merge: MergeType::from_attribute(element.attribute("type")),
        span: element.span,
        content: adapt(element.content, options),
    }
}

/// The configured tag of the first block without a name among `nodes` and their descendants.
fn unnamed_block_tag<'n>(
    nodes: impl IntoIterator<Item = &'n Node>,
    options: &ExtendOptions,
) -> Option<String> {
    nodes
        .into_iter()
        .filter_map(Node::as_element)
        .find_map(|element| {
            let tag = if element.is(&options.fill_tag_name) {
                Some(&options.fill_tag_name)
            } else if element.is(&options.slot_tag_name) {
                Some(&options.slot_tag_name)
            } else {
                None
            };
            match tag {
                Some(tag) if non_empty_attribute(element, "name").is_none() => Some(tag.clone()),
                _ => unnamed_block_tag(&element.content, options),
            }
        })
}

fn non_empty_attribute(element: &Element, name: &str) -> Option<String> {
    element
        .attribute(name)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
