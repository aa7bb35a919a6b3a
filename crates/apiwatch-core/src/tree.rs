//! # Path Tree
//!
//! Prefix-shared storage for every observed access path. Nodes live in
//! an arena and refer to each other by index, which keeps parent links
//! and ρ-bookkeeping cycle-safe and makes traversals explicit (no
//! recursion into arbitrarily deep client structures).
//!
//! Children are grouped per component kind and keyed by the component's
//! identity, so duplicate observations share one node and hashing can
//! walk the groups in a canonical order.

use std::collections::BTreeMap;

use crate::lattice::TypeTag;
use crate::path::{AccessPath, CallId, PathComponent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Child collections keyed by component identity.
#[derive(Debug, Default)]
pub(crate) struct ChildSet {
    pub require: BTreeMap<String, NodeId>,
    pub access_prop: BTreeMap<String, NodeId>,
    pub write_prop: BTreeMap<String, NodeId>,
    pub call: BTreeMap<CallId, NodeId>,
    pub construct: BTreeMap<CallId, NodeId>,
    /// Nested: call id → argument position → node.
    pub arg: BTreeMap<CallId, BTreeMap<usize, NodeId>>,
}

impl ChildSet {
    fn find(&self, component: &PathComponent) -> Option<NodeId> {
        match component {
            PathComponent::Require { module_name } => self.require.get(module_name).copied(),
            PathComponent::AccessProp { prop_name } => self.access_prop.get(prop_name).copied(),
            PathComponent::WriteProp { prop_name } => self.write_prop.get(prop_name).copied(),
            PathComponent::Call { call_id } => self.call.get(call_id).copied(),
            PathComponent::New { call_id } => self.construct.get(call_id).copied(),
            PathComponent::Arg { call_id, arg_id } => {
                self.arg.get(call_id).and_then(|m| m.get(arg_id)).copied()
            }
        }
    }

    fn insert(&mut self, component: &PathComponent, id: NodeId) {
        match component {
            PathComponent::Require { module_name } => {
                self.require.insert(module_name.clone(), id);
            }
            PathComponent::AccessProp { prop_name } => {
                self.access_prop.insert(prop_name.clone(), id);
            }
            PathComponent::WriteProp { prop_name } => {
                self.write_prop.insert(prop_name.clone(), id);
            }
            PathComponent::Call { call_id } => {
                self.call.insert(call_id.clone(), id);
            }
            PathComponent::New { call_id } => {
                self.construct.insert(call_id.clone(), id);
            }
            PathComponent::Arg { call_id, arg_id } => {
                self.arg
                    .entry(call_id.clone())
                    .or_default()
                    .insert(*arg_id, id);
            }
        }
    }

    fn detach(&mut self, component: &PathComponent) {
        match component {
            PathComponent::Require { module_name } => {
                self.require.remove(module_name);
            }
            PathComponent::AccessProp { prop_name } => {
                self.access_prop.remove(prop_name);
            }
            PathComponent::WriteProp { prop_name } => {
                self.write_prop.remove(prop_name);
            }
            PathComponent::Call { call_id } => {
                self.call.remove(call_id);
            }
            PathComponent::New { call_id } => {
                self.construct.remove(call_id);
            }
            PathComponent::Arg { call_id, arg_id } => {
                if let Some(group) = self.arg.get_mut(call_id) {
                    group.remove(arg_id);
                    if group.is_empty() {
                        self.arg.remove(call_id);
                    }
                }
            }
        }
    }

    pub(crate) fn iter_all(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.require
            .values()
            .chain(self.access_prop.values())
            .chain(self.write_prop.values())
            .chain(self.call.values())
            .chain(self.construct.values())
            .chain(self.arg.values().flat_map(|group| group.values()))
            .copied()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.require.is_empty()
            && self.access_prop.is_empty()
            && self.write_prop.is_empty()
            && self.call.is_empty()
            && self.construct.is_empty()
            && self.arg.is_empty()
    }
}

#[derive(Debug)]
pub struct TreeNode {
    /// Component labeling the edge from the parent; `None` at the root.
    pub component: Option<PathComponent>,
    /// Recorded type for the path ending here; `None` when no complete
    /// path ends at this node.
    pub tag: Option<TypeTag>,
    pub order: u32,
    pub parent: Option<NodeId>,
    pub(crate) children: ChildSet,
    pub(crate) removed: bool,
    // Compression metadata, filled in by the compression pass.
    pub(crate) h_full: Option<u128>,
    pub(crate) h_no_args: Option<u128>,
    pub(crate) prefix_touches_rho: bool,
}

impl TreeNode {
    fn new(component: Option<PathComponent>, order: u32, parent: Option<NodeId>) -> Self {
        Self {
            component,
            tag: None,
            order,
            parent,
            children: ChildSet::default(),
            removed: false,
            h_full: None,
            h_no_args: None,
            prefix_touches_rho: false,
        }
    }
}

/// A recorded path as enumerated in observation order.
#[derive(Debug, Clone)]
pub struct RecordedPath {
    pub node: NodeId,
    pub path: AccessPath,
    pub tag: TypeTag,
    pub order: u32,
}

#[derive(Debug)]
pub struct PathTree {
    nodes: Vec<TreeNode>,
    next_order: u32,
}

impl Default for PathTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PathTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![TreeNode::new(None, 0, None)],
            next_order: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id.index()]
    }

    /// Record an observed path. The first observation wins: an existing
    /// terminal keeps its type even if a later observation disagrees.
    pub fn record(&mut self, path: &AccessPath, tag: TypeTag) -> NodeId {
        let mut current = self.root();
        for component in path.components() {
            current = match self.nodes[current.index()].children.find(component) {
                Some(child) => child,
                None => {
                    let order = self.next_order;
                    self.next_order += 1;
                    let id = NodeId(self.nodes.len() as u32);
                    self.nodes
                        .push(TreeNode::new(Some(component.clone()), order, Some(current)));
                    self.nodes[current.index()].children.insert(component, id);
                    id
                }
            };
        }
        let node = &mut self.nodes[current.index()];
        if node.tag.is_none() {
            node.tag = Some(tag);
        }
        current
    }

    pub fn lookup(&self, path: &AccessPath) -> Option<NodeId> {
        let mut current = self.root();
        for component in path.components() {
            current = self.nodes[current.index()].children.find(component)?;
        }
        Some(current)
    }

    /// Reconstruct the full path of a node by following parent links.
    pub fn path_of(&self, id: NodeId) -> AccessPath {
        let mut components = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &self.nodes[node_id.index()];
            if let Some(component) = &node.component {
                components.push(component.clone());
            }
            current = node.parent;
        }
        components.reverse();
        AccessPath::from_components(components)
    }

    /// All surviving recorded paths in ascending observation order.
    pub fn recorded_paths(&self) -> Vec<RecordedPath> {
        let mut out: Vec<RecordedPath> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| !node.removed && node.component.is_some())
            .filter_map(|(i, node)| {
                let tag = node.tag.clone()?;
                let id = NodeId(i as u32);
                Some(RecordedPath {
                    node: id,
                    path: self.path_of(id),
                    tag,
                    order: node.order,
                })
            })
            .collect();
        out.sort_by_key(|r| r.order);
        out
    }

    /// Number of surviving recorded paths.
    pub fn recorded_len(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| !n.removed && n.component.is_some() && n.tag.is_some())
            .count()
    }

    /// Mark a ρ endpoint: the terminal node of `path` and every ancestor
    /// become ineligible for compression. Returns false when the path is
    /// not present.
    pub fn mark_rho(&mut self, path: &AccessPath) -> bool {
        let Some(mut current) = self.lookup(path) else {
            return false;
        };
        loop {
            let node = &mut self.nodes[current.index()];
            node.prefix_touches_rho = true;
            match node.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        true
    }

    /// Detach a subtree from its parent and mark every node in it
    /// removed. Arena slots are tombstoned, not reused.
    pub(crate) fn remove_subtree(&mut self, id: NodeId) {
        if let (Some(parent), Some(component)) = (
            self.nodes[id.index()].parent,
            self.nodes[id.index()].component.clone(),
        ) {
            self.nodes[parent.index()].children.detach(&component);
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            self.nodes[current.index()].removed = true;
            stack.extend(self.nodes[current.index()].children.iter_all());
        }
    }

    pub(crate) fn children(&self, id: NodeId) -> &ChildSet {
        &self.nodes[id.index()].children
    }
}
