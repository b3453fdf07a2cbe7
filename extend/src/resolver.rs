use log::debug;
use markup::{Document, Node};

use crate::dependency::Dependency;
use crate::error::ExtendError;
use crate::loader::Loader;
use crate::merge::{merge, merge_blocks};
use crate::options::ExtendOptions;
use crate::template::{Block, Extends, TemplateNode, adapt};

/// Output of a rewrite: a tree without extends or block tags, and every file
/// loaded on the way, in load order.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub tree: Vec<Node>,
    pub dependencies: Vec<Dependency>,
}

impl Resolved {
    pub fn into_document(self) -> Document {
        Document { nodes: self.tree }
    }
}

/// Rewrite `nodes`, resolving every extends marker and unwrapping every block.
/// `origin` identifies the document in dependency records.
pub fn rewrite<L: Loader>(
    nodes: Vec<Node>,
    origin: &str,
    options: &ExtendOptions,
    loader: L,
) -> Result<Resolved, ExtendError> {
    Resolver::new(options, loader).rewrite(nodes, origin)
}

pub fn rewrite_document<L: Loader>(
    document: Document,
    origin: &str,
    options: &ExtendOptions,
    loader: L,
) -> Result<Resolved, ExtendError> {
    rewrite(document.nodes, origin, options, loader)
}

/// State for one rewrite call. Nothing here outlives it.
pub struct Resolver<'o, L> {
    options: &'o ExtendOptions,
    loader: L,
    dependencies: Vec<Dependency>,
    /// Number of layouts currently being resolved on the chain.
    depth: usize,
}

impl<'o, L: Loader> Resolver<'o, L> {
    pub fn new(options: &'o ExtendOptions, loader: L) -> Self {
        Resolver {
            options,
            loader,
            dependencies: Vec::new(),
            depth: 0,
        }
    }

    pub fn rewrite(mut self, nodes: Vec<Node>, origin: &str) -> Result<Resolved, ExtendError> {
        let template = adapt(nodes, self.options);
        let tree = self.render(template, origin)?;
        Ok(Resolved {
            tree,
            dependencies: self.dependencies,
        })
    }

    /// Dependencies recorded so far.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Resolve one extends marker found in the document `origin`. The merged
    /// layout comes back with its blocks unwrapped.
    pub fn resolve(
        &mut self,
        extends: Extends,
        origin: &str,
    ) -> Result<Vec<TemplateNode>, ExtendError> {
        let (layout, overrides) = self.prepare(extends, origin)?;
        merge(layout, overrides, self.options)
    }

    /// Like `resolve`, but blocks stay tagged for the next level of the chain.
    fn resolve_chain(
        &mut self,
        extends: Extends,
        origin: &str,
    ) -> Result<Vec<TemplateNode>, ExtendError> {
        let (layout, overrides) = self.prepare(extends, origin)?;
        merge_blocks(layout, overrides, self.options)
    }

    /// Validate the marker, load its layout and resolve any extends markers
    /// inside the overrides, all on behalf of `origin`.
    fn prepare(
        &mut self,
        extends: Extends,
        origin: &str,
    ) -> Result<(Vec<TemplateNode>, Vec<Block>), ExtendError> {
        let Extends {
            src,
            blocks,
            unnamed_block,
            ..
        } = extends;
        let src = src.ok_or_else(|| ExtendError::MissingExtendsSrc {
            tag: self.options.tag_name.clone(),
        })?;
        if let Some(tag) = unnamed_block {
            return Err(ExtendError::MissingBlockName { tag });
        }

        let layout = self.load_layout(&src, origin)?;

        let mut overrides = Vec::with_capacity(blocks.len());
        for mut block in blocks {
            block.content = self.resolve_layout(block.content, origin)?;
            overrides.push(block);
        }
        Ok((layout, overrides))
    }

    /// Load the layout at `src` and resolve its own extends markers, if any.
    fn load_layout(&mut self, src: &str, origin: &str) -> Result<Vec<TemplateNode>, ExtendError> {
        let path = self.options.resolve_src(src);

        if self.depth >= self.options.max_depth {
            return Err(ExtendError::ChainTooDeep {
                limit: self.options.max_depth,
                path,
            });
        }

        debug!("loading layout '{}' for {}", path.display(), origin);
        let text = self.loader.load(&path)?;
        self.dependencies.push(Dependency::new(path.clone(), origin));

        let nodes = self.loader.parse(&path, text)?;
        let layout = adapt(nodes, self.options);
        let identifier = path.display().to_string();

        self.depth += 1;
        let resolved = self.resolve_layout(layout, &identifier);
        self.depth -= 1;
        resolved
    }

    /// Resolve extends markers inside a layout, keeping its blocks tagged.
    fn resolve_layout(
        &mut self,
        nodes: Vec<TemplateNode>,
        origin: &str,
    ) -> Result<Vec<TemplateNode>, ExtendError> {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                TemplateNode::Extends(extends) => {
                    out.extend(self.resolve_chain(extends, origin)?);
                }
                TemplateNode::Element(element, children) => {
                    let children = self.resolve_layout(children, origin)?;
                    out.push(TemplateNode::Element(element, children));
                }
                TemplateNode::Block(mut block) => {
                    block.content = self.resolve_layout(block.content, origin)?;
                    out.push(TemplateNode::Block(block));
                }
                leaf @ TemplateNode::Leaf(_) => out.push(leaf),
            }
        }
        Ok(out)
    }

    /// Turn a template back into markup: extends markers are resolved and
    /// spliced in place, standalone blocks are replaced by their content.
    fn render(&mut self, nodes: Vec<TemplateNode>, origin: &str) -> Result<Vec<Node>, ExtendError> {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                TemplateNode::Leaf(leaf) => out.push(leaf),
                TemplateNode::Element(mut element, children) => {
                    element.content = self.render(children, origin)?;
                    out.push(Node::Element(element));
                }
                TemplateNode::Block(block) => {
                    block.require_name(&self.options.slot_tag_name)?;
                    out.extend(self.render(block.content, origin)?);
                }
                TemplateNode::Extends(extends) => {
                    let merged = self.resolve(extends, origin)?;
                    out.extend(self.render(merged, origin)?);
                }
            }
        }
        Ok(out)
    }
}
