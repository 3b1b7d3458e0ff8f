//! The parsed node tree.
//!
//! Nodes live in an arena owned by [`ParseOutcome`] and refer to each other by [`NodeId`].

use std::{fmt::Display, ops::Index, sync::Arc};

use dt_diagnostic::line_index::LineSpan;

use crate::{error::PropertyError, span::SourceSpan, value::PropertyValue, TextRange};

/// Identifies a source buffer, usually by its path.
pub type SourceId = Arc<str>;

/// Index of a node in its [`ParseOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub const fn index(self) -> usize {
        self.0
    }
}

/// One assignment of a property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRecord {
    pub value: PropertyValue,
    pub source: SourceId,
    /// Lines of the whole statement.
    pub lines: LineSpan,
    pub key_span: SourceSpan,
    /// Same as `key_span` for markers.
    pub value_span: SourceSpan,
}

/// A property slot on a node.
///
/// `value()` is always the value of the last history record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTreeProperty {
    name: String,
    current_value: PropertyValue,
    history: Vec<ValueRecord>,
}

impl DeviceTreeProperty {
    pub fn new(name: impl Into<String>, record: ValueRecord) -> Self {
        Self {
            name: name.into(),
            current_value: record.value.clone(),
            history: vec![record],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &PropertyValue {
        &self.current_value
    }

    /// Every assignment, oldest first.
    pub fn history(&self) -> &[ValueRecord] {
        &self.history
    }

    /// The assignment that produced [`value`](Self::value).
    pub fn last_record(&self) -> &ValueRecord {
        // `history` is never empty
        &self.history[self.history.len() - 1]
    }

    /// Appends a reassignment of the same value kind.
    fn revise(&mut self, record: ValueRecord) -> Result<(), PropertyError> {
        let (expected, found) = (self.current_value.kind(), record.value.kind());
        if expected != found {
            return Err(PropertyError::PropertyKindConflict {
                name: self.name.clone(),
                expected,
                found,
                range: record.key_span.range,
            });
        }
        self.current_value = record.value.clone();
        self.history.push(record);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionalKind {
    If,
    Ifdef,
    Ifndef,
    Elif,
    Else,
}

impl ConditionalKind {
    pub(crate) fn from_directive(word: &str) -> Option<Self> {
        Some(match word {
            "if" => Self::If,
            "ifdef" => Self::Ifdef,
            "ifndef" => Self::Ifndef,
            "elif" => Self::Elif,
            "else" => Self::Else,
            _ => return None,
        })
    }
}

impl Display for ConditionalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::If => "#if",
            Self::Ifdef => "#ifdef",
            Self::Ifndef => "#ifndef",
            Self::Elif => "#elif",
            Self::Else => "#else",
        })
    }
}

/// A preprocessor conditional found inside a property block.
///
/// These are recorded, not evaluated. Statements on both sides of the conditional are extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalDirective {
    pub kind: ConditionalKind,
    /// Text after the directive word, e.g. `CONFIG_FOO` for `#ifdef CONFIG_FOO`.
    pub expression: String,
    pub line: usize,
    pub range: TextRange,
}

/// One `{ ... };` scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTreeNode {
    /// `/` for the root, `&label` or `&{/path}` for overlay fragments.
    pub name: String,
    pub unit_address: Option<String>,
    pub label: Option<String>,
    pub is_overlay_fragment: bool,
    pub source: SourceId,
    /// From the label (or name) to the opening `{`.
    pub header_span: SourceSpan,
    /// From after the opening `{` to the closing `}`.
    pub node_span: SourceSpan,
    /// From after the opening `{` to the first child or the closing `}`.
    pub property_block_span: SourceSpan,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub conditionals: Vec<ConditionalDirective>,
    properties: Vec<DeviceTreeProperty>,
}

impl DeviceTreeNode {
    pub(crate) fn new(name: String, source: SourceId, header_span: SourceSpan) -> Self {
        Self {
            name,
            unit_address: None,
            label: None,
            is_overlay_fragment: false,
            source,
            header_span,
            node_span: SourceSpan::default(),
            property_block_span: SourceSpan::default(),
            parent: None,
            children: Vec::new(),
            conditionals: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// The name with its unit address, e.g. `uart@1000`.
    pub fn full_name(&self) -> String {
        match &self.unit_address {
            Some(addr) => format!("{}@{addr}", self.name),
            None => self.name.clone(),
        }
    }

    /// Returns true if `query` is this node's name, full name or label.
    pub fn is_called(&self, query: &str) -> bool {
        self.name == query
            || self.label.as_deref() == Some(query)
            || self
                .unit_address
                .as_deref()
                .and_then(|addr| query.strip_suffix(addr)?.strip_suffix('@'))
                == Some(self.name.as_str())
    }

    pub fn property(&self, name: &str) -> Option<&DeviceTreeProperty> {
        self.properties.iter().find(|prop| prop.name == name)
    }

    /// Properties in source order.
    pub fn properties(&self) -> &[DeviceTreeProperty] {
        &self.properties
    }

    pub fn remove_property(&mut self, name: &str) -> Option<DeviceTreeProperty> {
        let idx = self.properties.iter().position(|prop| prop.name == name)?;
        Some(self.properties.remove(idx))
    }

    /// Adds a property, rejecting names that are already assigned.
    pub(crate) fn insert_property(
        &mut self,
        name: &str,
        record: ValueRecord,
    ) -> Result<(), PropertyError> {
        if let Some(prev) = self.property(name) {
            return Err(PropertyError::DuplicateProperty {
                name: name.to_owned(),
                first: prev.history[0].key_span.range,
                range: record.key_span.range,
            });
        }
        self.properties.push(DeviceTreeProperty::new(name, record));
        Ok(())
    }

    /// Assigns a property, keeping earlier assignments as history.
    ///
    /// A reassignment must have the same [`ValueKind`](crate::value::ValueKind) as the current
    /// value.
    pub fn revise_property(
        &mut self,
        name: &str,
        record: ValueRecord,
    ) -> Result<(), PropertyError> {
        match self.properties.iter_mut().find(|prop| prop.name == name) {
            Some(prop) => prop.revise(record),
            None => {
                self.properties.push(DeviceTreeProperty::new(name, record));
                Ok(())
            }
        }
    }
}

/// The result of parsing one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutcome {
    pub source: SourceId,
    nodes: Vec<DeviceTreeNode>,
    roots: Vec<NodeId>,
    /// `/dts-v1/;` was present.
    pub has_dts_version: bool,
    /// `/plugin/;` was present.
    pub is_plugin: bool,
    pub includes: Vec<IncludeDirective>,
}

/// An include directive. Recorded, never expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    pub range: TextRange,
    /// Whether this is a preprocessor (`#include`) or a DTS (`/include/`) include.
    pub is_preprocessor: bool,
    /// The raw path pointed to.
    pub path: String,
    /// `true` for quoted paths, `false` for `<...>`.
    pub relative: bool,
}

impl ParseOutcome {
    pub(crate) fn new(source: SourceId, nodes: Vec<DeviceTreeNode>, roots: Vec<NodeId>) -> Self {
        Self {
            source,
            nodes,
            roots,
            has_dts_version: false,
            is_plugin: false,
            includes: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&DeviceTreeNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut DeviceTreeNode> {
        self.nodes.get_mut(id.0)
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [DeviceTreeNode] {
        &mut self.nodes
    }

    /// Every node with its id, in the order the nodes were opened.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &DeviceTreeNode)> {
        self.nodes.iter().enumerate().map(|(idx, node)| (NodeId(idx), node))
    }

    /// Root-level nodes in source order: the `/` root and overlay fragments.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// The `/` root.
    pub fn root(&self) -> Option<NodeId> {
        self.roots
            .iter()
            .copied()
            .find(|&id| !self[id].is_overlay_fragment)
    }

    pub fn fragments(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.roots
            .iter()
            .copied()
            .filter(|&id| self[id].is_overlay_fragment)
    }

    /// The first direct child of `parent` with the given name, full name or label.
    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.node(parent)?
            .children
            .iter()
            .copied()
            .find(|&id| self[id].is_called(name))
    }

    /// Searches the subtree of `start` in pre-order, `start` excluded.
    pub fn find(&self, start: NodeId, name: &str) -> Option<NodeId> {
        self.preorder(start).skip(1).find(|&id| self[id].is_called(name))
    }

    /// Walks a path like `/soc/uart@1000` from the root, or `&label/child` and
    /// `&{/soc/uart@1000}/child` from a fragment.
    pub fn lookup(&self, path: &str) -> Option<NodeId> {
        let (first, rest) = match path.strip_prefix('/') {
            Some(rest) => (self.root()?, rest),
            None => {
                // The head of a path reference fragment contains slashes itself
                let head_end = match path.strip_prefix("&{") {
                    Some(target) => target.find('}')? + "&{}".len(),
                    None => path.find('/').unwrap_or(path.len()),
                };
                let (head, rest) = path.split_at(head_end);
                let fragment = self.fragments().find(|&id| self[id].name == head)?;
                (fragment, rest)
            }
        };
        rest.split('/')
            .filter(|part| !part.is_empty())
            .try_fold(first, |id, part| self.child(id, part))
    }

    /// Pre-order traversal of the subtree of `start`, `start` included.
    pub fn preorder(&self, start: NodeId) -> Preorder<'_> {
        Preorder {
            outcome: self,
            stack: vec![start],
        }
    }

    /// Pre-order traversal of every tree, roots in source order.
    pub fn iter_preorder(&self) -> Preorder<'_> {
        Preorder {
            outcome: self,
            stack: self.roots.iter().rev().copied().collect(),
        }
    }

    /// Renders the path of a node, e.g. `/soc/uart@1000` or `&uart1/pins`.
    pub fn path(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut cur = Some(id);
        while let Some(node) = cur.and_then(|id| self.node(id)) {
            parts.push(node.full_name());
            cur = node.parent;
        }
        parts.reverse();

        match parts.split_first() {
            Some((root, rest)) if root == "/" => format!("/{}", rest.join("/")),
            _ => parts.join("/"),
        }
    }
}

impl Index<NodeId> for ParseOutcome {
    type Output = DeviceTreeNode;

    fn index(&self, index: NodeId) -> &Self::Output {
        &self.nodes[index.0]
    }
}

/// See [`ParseOutcome::preorder`].
#[derive(Debug, Clone)]
pub struct Preorder<'a> {
    outcome: &'a ParseOutcome,
    stack: Vec<NodeId>,
}

impl Iterator for Preorder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        if let Some(node) = self.outcome.node(id) {
            self.stack.extend(node.children.iter().rev());
        }
        Some(id)
    }
}
