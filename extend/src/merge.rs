use log::{debug, warn};

use crate::error::ExtendError;
use crate::index::BlockIndex;
use crate::options::ExtendOptions;
use crate::template::{Block, TemplateNode};

/// Fold `overrides` into `layout` in their declared order, then unwrap every
/// remaining block so the result carries no block tags.
pub fn merge(
    layout: Vec<TemplateNode>,
    overrides: Vec<Block>,
    options: &ExtendOptions,
) -> Result<Vec<TemplateNode>, ExtendError> {
    let merged = merge_blocks(layout, overrides, options)?;
    unwrap_blocks(merged, &options.slot_tag_name)
}

/// Fold `overrides` into `layout` but leave the layout's blocks tagged, so a
/// document further down the chain can still override them.
pub fn merge_blocks(
    mut layout: Vec<TemplateNode>,
    overrides: Vec<Block>,
    options: &ExtendOptions,
) -> Result<Vec<TemplateNode>, ExtendError> {
    let mut index = BlockIndex::build(&layout, &options.slot_tag_name)?;

    for block in overrides {
        let name = block.require_name(&options.fill_tag_name)?.to_string();

        let Some(target) = index.block_mut(&mut layout, &name) else {
            if options.strict {
                return Err(ExtendError::UnexpectedBlock { name });
            }
            BlockIndex::build(&block.content, &options.slot_tag_name)?;
            warn!("skipping block \"{}\": the layout does not define it", name);
            continue;
        };

        debug!("merging block \"{}\" ({:?})", name, block.merge);
        let existing = std::mem::take(&mut target.content);
        target.content = block.merge.apply(existing, block.content);

        // Paths below the merged block have shifted, and the new content may
        // carry blocks of its own.
        index = BlockIndex::build(&layout, &options.slot_tag_name)?;
    }

    Ok(layout)
}

/// Replace every block by its own content, in place among its siblings.
pub fn unwrap_blocks(
    nodes: Vec<TemplateNode>,
    tag: &str,
) -> Result<Vec<TemplateNode>, ExtendError> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            TemplateNode::Block(block) => {
                block.require_name(tag)?;
                out.extend(unwrap_blocks(block.content, tag)?);
            }
            TemplateNode::Element(element, children) => {
                out.push(TemplateNode::Element(element, unwrap_blocks(children, tag)?));
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Extends, adapt};
    use markup::{Node, Parser};

    fn tree(source: &str) -> Vec<TemplateNode> {
        let nodes = Parser::new(source, 0).parse().expect("parse failed").nodes;
        adapt(nodes, &ExtendOptions::default())
    }

    fn overrides(source: &str) -> Vec<Block> {
        match tree(source).into_iter().next() {
            Some(TemplateNode::Extends(Extends { blocks, .. })) => blocks,
            other => panic!("expected an extends node, got {:?}", other),
        }
    }

    fn render(nodes: Vec<TemplateNode>) -> String {
        nodes
            .into_iter()
            .map(|node| match node {
                TemplateNode::Leaf(leaf) => leaf.to_string(),
                TemplateNode::Element(mut element, children) => {
                    element.content = vec![Node::text(render(children))];
                    element.to_string()
                }
                other => panic!("unexpected node {:?}", other),
            })
            .collect()
    }

    #[test]
    fn merge_types() {
        let layout = r#"<block name="x">D</block>"#;
        let options = ExtendOptions::default();
        let cases = [
            (r#"<extends src="l"><block name="x">R</block></extends>"#, "R"),
            (r#"<extends src="l"><block name="x" type="append">A</block></extends>"#, "DA"),
            (r#"<extends src="l"><block name="x" type="prepend">P</block></extends>"#, "PD"),
            (r#"<extends src="l"><block name="x"></block></extends>"#, ""),
        ];
        for (source, expected) in cases {
            let merged = merge(tree(layout), overrides(source), &options).expect("merge");
            assert_eq!(render(merged), expected, "for {}", source);
        }
    }

    #[test]
    fn overrides_apply_in_declared_order() {
        let merged = merge(
            tree(r#"<block name="x">D</block>"#),
            overrides(
                r#"<extends src="l"><block name="x" type="append">1</block><block name="x" type="append">2</block></extends>"#,
            ),
            &ExtendOptions::default(),
        )
        .expect("merge");
        assert_eq!(render(merged), "D12");
    }

    #[test]
    fn unknown_override_is_rejected_when_strict() {
        let err = merge(
            tree(r#"<block name="x"></block>"#),
            overrides(r#"<extends src="l"><block name="nope">!</block></extends>"#),
            &ExtendOptions::default(),
        )
        .expect_err("should fail");
        assert_eq!(err.to_string(), r#"[markup-extend] Unexpected block "nope""#);
    }

    #[test]
    fn unknown_override_is_skipped_when_lenient() {
        let merged = merge(
            tree(r#"<p><block name="x">D</block></p>"#),
            overrides(r#"<extends src="l"><block name="nope">!</block></extends>"#),
            &ExtendOptions::default().with_strict(false),
        )
        .expect("merge");
        assert_eq!(render(merged), "<p>D</p>");
    }

    #[test]
    fn skipped_override_content_is_still_validated() {
        let err = merge(
            tree(r#"<block name="x"></block>"#),
            overrides(r#"<extends src="l"><block name="nope"><block>!</block></block></extends>"#),
            &ExtendOptions::default().with_strict(false),
        )
        .expect_err("should fail");
        assert_eq!(err.to_string(), r#"[markup-extend] <block> has no "name""#);
    }

    #[test]
    fn merge_blocks_keeps_blocks_tagged() {
        let merged = merge_blocks(
            tree(r#"<block name="x">D</block>"#),
            overrides(r#"<extends src="l"><block name="x">R</block></extends>"#),
            &ExtendOptions::default(),
        )
        .expect("merge");
        let [TemplateNode::Block(block)] = merged.as_slice() else {
            panic!("expected the block to survive, got {:?}", merged);
        };
        assert_eq!(block.name.as_deref(), Some("x"));
        assert_eq!(block.content, vec![TemplateNode::Leaf(Node::text("R"))]);
    }
}
