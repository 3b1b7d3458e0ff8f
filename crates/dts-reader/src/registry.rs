//! Label and name lookups over parsed trees.

use std::fmt::Debug;

use dt_diagnostic::{Diagnostic, DiagnosticCollector, Severity};
use rustc_hash::FxHashMap;

use crate::tree::{DeviceTreeNode, NodeId, ParseOutcome};

/// A node in a specific [`ParseOutcome`].
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    pub outcome: &'a ParseOutcome,
    pub id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn node(&self) -> &'a DeviceTreeNode {
        &self.outcome[self.id]
    }

    pub fn path(&self) -> String {
        self.outcome.path(self.id)
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.outcome, other.outcome) && self.id == other.id
    }
}

impl Eq for NodeRef<'_> {}

impl Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.outcome.source, self.path())
    }
}

/// Maps labels, names and paths to nodes.
///
/// Registration is first-wins: a label that is already registered keeps pointing at the first
/// node, and the later one is reported as a warning.
#[derive(Debug, Default)]
pub struct TreeRegistry<'a> {
    labels: FxHashMap<&'a str, NodeRef<'a>>,
    names: FxHashMap<&'a str, Vec<NodeRef<'a>>>,
    paths: FxHashMap<String, NodeRef<'a>>,
}

impl<'a> TreeRegistry<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from several outcomes, registering them in order.
    pub fn from_outcomes(
        outcomes: impl IntoIterator<Item = &'a ParseOutcome>,
        diag: &dyn DiagnosticCollector,
    ) -> Self {
        let mut registry = Self::new();
        for outcome in outcomes {
            registry.register(outcome, diag);
        }
        registry
    }

    /// Registers every node of `outcome`.
    ///
    /// Overlay fragments aren't registered by name or path, but the nodes inside them are.
    pub fn register(&mut self, outcome: &'a ParseOutcome, diag: &dyn DiagnosticCollector) {
        let _span = tracing::debug_span!("register", source = %outcome.source).entered();

        for id in outcome.iter_preorder() {
            let node_ref = NodeRef { outcome, id };
            let node = &outcome[id];

            if let Some(label) = node.label.as_deref() {
                if let Some(prev) = self.labels.get(label) {
                    let mut warning = Diagnostic::new(
                        node.header_span.range,
                        format!("Label `{label}` is already defined at {prev:?}").into(),
                        Severity::Warn,
                    )
                    .with_source(outcome.source.clone());
                    if let Some(lines) = node.header_span.lines {
                        warning = warning.with_lines(lines);
                    }
                    if std::ptr::eq(prev.outcome, outcome) {
                        warning = warning
                            .with_label(prev.node().header_span.range, "first defined here");
                    }
                    diag.emit(warning);
                } else {
                    self.labels.insert(label, node_ref);
                }
            }

            if node.is_overlay_fragment {
                continue;
            }
            self.names
                .entry(node.name.as_str())
                .or_default()
                .push(node_ref);
            let path = outcome.path(id);
            if !path.starts_with('&') {
                self.paths.entry(path).or_insert(node_ref);
            }
        }

        tracing::debug!(
            labels = self.labels.len(),
            names = self.names.len(),
            "registered outcome"
        );
    }

    pub fn by_label(&self, label: &str) -> Option<NodeRef<'a>> {
        self.labels.get(label).copied()
    }

    /// The first registered node with this name (without unit address).
    pub fn by_name(&self, name: &str) -> Option<NodeRef<'a>> {
        self.names.get(name)?.first().copied()
    }

    /// Every registered node with this name, in registration order.
    pub fn all_named(&self, name: &str) -> &[NodeRef<'a>] {
        self.names.get(name).map_or(&[], Vec::as_slice)
    }

    /// Looks up an absolute path like `/soc/uart@1000`.
    pub fn by_path(&self, path: &str) -> Option<NodeRef<'a>> {
        self.paths.get(path).copied()
    }

    /// Resolves the node an overlay fragment (`&label` or `&{/path}`) applies to.
    pub fn resolve_fragment(&self, fragment: NodeRef<'_>) -> Option<NodeRef<'a>> {
        let node = fragment.node();
        if !node.is_overlay_fragment {
            return None;
        }
        let target = node.name.strip_prefix('&')?;
        match target.strip_prefix('{') {
            Some(path) => self.by_path(path.strip_suffix('}')?),
            None => self.by_label(target),
        }
    }
}
