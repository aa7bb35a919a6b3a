//! # Model Tree
//!
//! Replay-side reconstruction of a persisted model. Structure mirrors
//! the path tree, but children are order-sorted lists and every node
//! carries mutable replay state: whether the driver has processed it,
//! whether its value turned out to be missing (`empty`), and the
//! reconstructed runtime value itself.

use thiserror::Error;

use apiwatch_script::Value;

use crate::lattice::TypeTag;
use crate::path::{AccessPath, PathComponent, Variance};
use crate::persist::ModelFile;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("ρ-relation endpoint {path} does not resolve to a model node")]
    MissingRhoEndpoint { path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelNodeId(u32);

impl ModelNodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

pub struct ModelNode {
    /// `None` only at the root.
    pub component: Option<PathComponent>,
    pub tag: Option<TypeTag>,
    pub order: u32,
    pub parent: Option<ModelNodeId>,
    /// Sorted by ascending order after construction.
    pub children: Vec<ModelNodeId>,
    // Replay state.
    pub processed: bool,
    pub empty: bool,
    pub obj: Option<Value>,
}

pub struct ModelTree {
    nodes: Vec<ModelNode>,
    /// Resolved ρ endpoints: (source, sink).
    rho: Vec<(ModelNodeId, ModelNodeId)>,
}

impl ModelTree {
    /// Rebuild the tree from a parsed model. A ρ-relation that names a
    /// path absent from `paths` is model corruption and fatal.
    pub fn from_model(model: &ModelFile) -> Result<Self, ModelError> {
        let mut tree = ModelTree {
            nodes: vec![ModelNode {
                component: None,
                tag: None,
                order: 0,
                parent: None,
                children: Vec::new(),
                processed: false,
                empty: false,
                obj: None,
            }],
            rho: Vec::new(),
        };

        for entry in &model.paths {
            let id = tree.insert_path(&entry.path, entry.order);
            let node = &mut tree.nodes[id.index()];
            if node.tag.is_none() {
                node.tag = Some(entry.tag.clone());
            }
            node.order = entry.order;
        }

        // Children in observation order drives the replay schedule.
        let orders: Vec<u32> = tree.nodes.iter().map(|n| n.order).collect();
        for node in &mut tree.nodes {
            node.children.sort_by_key(|c| orders[c.index()]);
        }

        for relation in &model.rho_relations {
            let source = tree.resolve(&relation.source).ok_or_else(|| {
                ModelError::MissingRhoEndpoint {
                    path: relation.source.to_string(),
                }
            })?;
            let sink = tree.resolve(&relation.sink).ok_or_else(|| {
                ModelError::MissingRhoEndpoint {
                    path: relation.sink.to_string(),
                }
            })?;
            tree.rho.push((source, sink));
        }

        Ok(tree)
    }

    fn insert_path(&mut self, path: &AccessPath, order: u32) -> ModelNodeId {
        let mut current = self.root();
        for component in path.components() {
            let found = self.nodes[current.index()]
                .children
                .iter()
                .copied()
                .find(|&child| self.nodes[child.index()].component.as_ref() == Some(component));
            current = match found {
                Some(child) => child,
                None => {
                    let id = ModelNodeId(self.nodes.len() as u32);
                    self.nodes.push(ModelNode {
                        component: Some(component.clone()),
                        tag: None,
                        order,
                        parent: Some(current),
                        children: Vec::new(),
                        processed: false,
                        empty: false,
                        obj: None,
                    });
                    self.nodes[current.index()].children.push(id);
                    id
                }
            };
        }
        current
    }

    pub fn root(&self) -> ModelNodeId {
        ModelNodeId(0)
    }

    pub fn node(&self, id: ModelNodeId) -> &ModelNode {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: ModelNodeId) -> &mut ModelNode {
        &mut self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Non-root nodes in ascending observation order: the replay
    /// schedule.
    pub fn schedule(&self) -> Vec<ModelNodeId> {
        let mut ids: Vec<ModelNodeId> = (1..self.nodes.len() as u32).map(ModelNodeId).collect();
        ids.sort_by_key(|id| self.nodes[id.index()].order);
        ids
    }

    pub fn resolve(&self, path: &AccessPath) -> Option<ModelNodeId> {
        let mut current = self.root();
        for component in path.components() {
            current = self.nodes[current.index()]
                .children
                .iter()
                .copied()
                .find(|&child| self.nodes[child.index()].component.as_ref() == Some(component))?;
        }
        Some(current)
    }

    pub fn path_of(&self, id: ModelNodeId) -> AccessPath {
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

    pub fn variance_of(&self, id: ModelNodeId) -> Variance {
        let mut flips = 0;
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &self.nodes[node_id.index()];
            if let Some(component) = &node.component {
                if component.flips_variance() {
                    flips += 1;
                }
            }
            current = node.parent;
        }
        if flips % 2 == 0 {
            Variance::Covariant
        } else {
            Variance::Contravariant
        }
    }

    /// ρ source for a sink node, if the model links one.
    pub fn rho_source_for(&self, sink: ModelNodeId) -> Option<ModelNodeId> {
        self.rho
            .iter()
            .find(|(_, s)| *s == sink)
            .map(|(source, _)| *source)
    }

    pub fn rho(&self) -> &[(ModelNodeId, ModelNodeId)] {
        &self.rho
    }

    /// Mark a whole subtree processed (used once a synthesizer takes
    /// ownership of it).
    pub fn mark_subtree_processed(&mut self, id: ModelNodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            self.nodes[current.index()].processed = true;
            stack.extend(self.nodes[current.index()].children.iter().copied());
        }
    }

    /// Find a child of `id` by component predicate.
    pub fn find_child(
        &self,
        id: ModelNodeId,
        predicate: impl Fn(&PathComponent) -> bool,
    ) -> Option<ModelNodeId> {
        self.nodes[id.index()]
            .children
            .iter()
            .copied()
            .find(|&child| {
                self.nodes[child.index()]
                    .component
                    .as_ref()
                    .map(|c| predicate(c))
                    .unwrap_or(false)
            })
    }

    /// All children of `id` matching a component predicate.
    pub fn children_where(
        &self,
        id: ModelNodeId,
        predicate: impl Fn(&PathComponent) -> bool,
    ) -> Vec<ModelNodeId> {
        self.nodes[id.index()]
            .children
            .iter()
            .copied()
            .filter(|&child| {
                self.nodes[child.index()]
                    .component
                    .as_ref()
                    .map(|c| predicate(c))
                    .unwrap_or(false)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{CallId, RhoRelation};
    use crate::persist::PathEntry;

    fn access(name: &str) -> PathComponent {
        PathComponent::AccessProp {
            prop_name: name.to_string(),
        }
    }

    fn entry(path: AccessPath, tag: TypeTag, order: u32) -> PathEntry {
        PathEntry { path, tag, order }
    }

    fn sample_file() -> ModelFile {
        let root = AccessPath::root("lib");
        let id = root.extend(access("id"));
        let sink = id.extend(PathComponent::Arg {
            call_id: CallId("c1".to_string()),
            arg_id: 0,
        });
        ModelFile {
            paths: vec![
                entry(root.clone(), TypeTag::Object, 0),
                entry(id.clone(), TypeTag::Function, 1),
                entry(sink.clone(), TypeTag::Function, 2),
            ],
            rho_relations: vec![RhoRelation { source: id, sink }],
        }
    }

    #[test]
    fn reconstruction_resolves_rho_to_nodes() {
        let tree = ModelTree::from_model(&sample_file()).unwrap();
        assert_eq!(tree.rho().len(), 1);
        let (source, sink) = tree.rho()[0];
        assert_eq!(
            tree.node(source).component,
            Some(access("id"))
        );
        assert!(matches!(
            tree.node(sink).component,
            Some(PathComponent::Arg { .. })
        ));
        assert_eq!(tree.rho_source_for(sink), Some(source));
    }

    #[test]
    fn missing_rho_endpoint_is_fatal() {
        let mut file = sample_file();
        file.rho_relations.push(RhoRelation {
            source: AccessPath::root("lib").extend(access("ghost")),
            sink: AccessPath::root("lib"),
        });
        assert!(matches!(
            ModelTree::from_model(&file),
            Err(ModelError::MissingRhoEndpoint { .. })
        ));
    }

    #[test]
    fn schedule_follows_observation_order() {
        let tree = ModelTree::from_model(&sample_file()).unwrap();
        let orders: Vec<u32> = tree
            .schedule()
            .into_iter()
            .map(|id| tree.node(id).order)
            .collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn variance_recomputed_from_parents() {
        let tree = ModelTree::from_model(&sample_file()).unwrap();
        let (source, sink) = tree.rho()[0];
        assert_eq!(tree.variance_of(source), Variance::Covariant);
        assert_eq!(tree.variance_of(sink), Variance::Contravariant);
    }
}
