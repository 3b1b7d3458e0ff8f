//! Turns scope events into the node arena.

use crate::{
    context::Context,
    error::{ScanError, ScopeImbalance},
    scanner::ScopeEvent,
    tree::{DeviceTreeNode, NodeId},
    TextRange,
};

struct Frame {
    id: NodeId,
    /// End of the opening `{`.
    start: usize,
    /// Set when the first child opens.
    block_end: Option<usize>,
}

/// Nodes in opening order and the ids of the root-level ones.
pub(crate) struct BuiltTree {
    pub(crate) nodes: Vec<DeviceTreeNode>,
    pub(crate) roots: Vec<NodeId>,
}

pub(crate) fn build<'input>(
    ctx: &Context,
    events: impl IntoIterator<Item = Result<ScopeEvent<'input>, ScanError>>,
) -> Result<BuiltTree, ScanError> {
    let mut nodes: Vec<DeviceTreeNode> = Vec::new();
    let mut roots = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    for event in events {
        match event? {
            ScopeEvent::Open(open) => {
                let id = NodeId(nodes.len());
                let mut node = match open.phandle_only_label {
                    Some(label) => {
                        let mut node = DeviceTreeNode::new(
                            format!("&{label}"),
                            ctx.source.clone(),
                            ctx.span(open.span),
                        );
                        node.is_overlay_fragment = true;
                        node
                    }
                    None => {
                        let mut node = DeviceTreeNode::new(
                            open.name.unwrap_or_default().to_owned(),
                            ctx.source.clone(),
                            ctx.span(open.span),
                        );
                        node.unit_address = open.unit_address.map(str::to_owned);
                        node.label = open.label.map(str::to_owned);
                        node
                    }
                };

                match stack.last_mut() {
                    Some(parent) => {
                        parent.block_end.get_or_insert(open.span.start);
                        node.parent = Some(parent.id);
                        nodes[parent.id.0].children.push(id);
                    }
                    None => roots.push(id),
                }

                tracing::trace!(name = %node.name, depth = stack.len(), "node");
                nodes.push(node);
                stack.push(Frame {
                    id,
                    start: open.span.end,
                    block_end: None,
                });
            }
            ScopeEvent::Close { span } => {
                let Some(frame) = stack.pop() else {
                    return Err(ScanError::UnbalancedScopes {
                        kind: ScopeImbalance::UnmatchedClose,
                        range: span,
                    });
                };
                let end = span.start;
                let node = &mut nodes[frame.id.0];
                node.node_span = ctx.span(TextRange::new(frame.start, end));
                node.property_block_span =
                    ctx.span(TextRange::new(frame.start, frame.block_end.unwrap_or(end)));
            }
        }
    }

    if let Some(frame) = stack.last() {
        return Err(ScanError::UnbalancedScopes {
            kind: ScopeImbalance::UnclosedOpen,
            range: nodes[frame.id.0].header_span.range,
        });
    }

    tracing::debug!(nodes = nodes.len(), roots = roots.len(), "built tree");
    Ok(BuiltTree { nodes, roots })
}
