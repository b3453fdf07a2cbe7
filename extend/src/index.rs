use std::collections::HashMap;

use crate::error::ExtendError;
use crate::template::{Block, TemplateNode};

/// Maps block names to the position of their block within one tree.
///
/// Positions are child-index paths from the tree root, so the index holds no
/// borrow of the tree and the tree stays free to be edited between lookups.
#[derive(Debug, Clone, Default)]
pub struct BlockIndex {
    entries: HashMap<String, Vec<usize>>,
}

impl BlockIndex {
    /// Scan `tree` for blocks at any depth. Every block must be named; when a
    /// name repeats, the later block in document order wins.
    pub fn build(tree: &[TemplateNode], tag: &str) -> Result<Self, ExtendError> {
        let mut entries = HashMap::new();
        let mut path = Vec::new();
        scan(tree, &mut path, &mut entries, tag)?;
        Ok(BlockIndex { entries })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// The indexed block called `name`, borrowed mutably out of `tree`.
    pub fn block_mut<'t>(&self, tree: &'t mut [TemplateNode], name: &str) -> Option<&'t mut Block> {
        let path = self.entries.get(name)?;
        block_at_mut(tree, path)
    }

    pub fn block<'t>(&self, tree: &'t [TemplateNode], name: &str) -> Option<&'t Block> {
        let path = self.entries.get(name)?;
        block_at(tree, path)
    }
}

fn scan(
    nodes: &[TemplateNode],
    path: &mut Vec<usize>,
    entries: &mut HashMap<String, Vec<usize>>,
    tag: &str,
) -> Result<(), ExtendError> {
    for (i, node) in nodes.iter().enumerate() {
        path.push(i);
        match node {
            TemplateNode::Block(block) => {
                let name = block.require_name(tag)?;
                entries.insert(name.to_string(), path.clone());
                scan(&block.content, path, entries, tag)?;
            }
            TemplateNode::Element(_, children) => scan(children, path, entries, tag)?,
            TemplateNode::Leaf(_) | TemplateNode::Extends(_) => {}
        }
        path.pop();
    }
    Ok(())
}

fn block_at<'t>(nodes: &'t [TemplateNode], path: &[usize]) -> Option<&'t Block> {
    let (&first, rest) = path.split_first()?;
    match nodes.get(first)? {
        TemplateNode::Block(block) if rest.is_empty() => Some(block),
        TemplateNode::Block(block) => block_at(&block.content, rest),
        TemplateNode::Element(_, children) => block_at(children, rest),
        _ => None,
    }
}

fn block_at_mut<'t>(nodes: &'t mut [TemplateNode], path: &[usize]) -> Option<&'t mut Block> {
    let (&first, rest) = path.split_first()?;
    match nodes.get_mut(first)? {
        TemplateNode::Block(block) => {
            if rest.is_empty() {
                Some(block)
            } else {
                block_at_mut(&mut block.content, rest)
            }
        }
        TemplateNode::Element(_, children) => block_at_mut(children, rest),
        _ => None,
    }
}
