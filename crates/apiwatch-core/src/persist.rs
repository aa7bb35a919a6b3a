//! # Model Persistence
//!
//! The portable model format: an ordered list of typed paths plus the
//! ρ-relations, as JSON. Orders are renumbered densely on the way out so
//! a persisted model always carries a bijection onto `[0, N)` no matter
//! what compression removed.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::lattice::TypeTag;
use crate::path::{AccessPath, PathComponent, RhoRelation};
use crate::tree::PathTree;

/// One recorded path with its observed type and observation rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathEntry {
    pub path: AccessPath,
    #[serde(rename = "type")]
    pub tag: TypeTag,
    pub order: u32,
}

/// The serialized model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub paths: Vec<PathEntry>,
    #[serde(rename = "rhoRelations")]
    pub rho_relations: Vec<RhoRelation>,
}

impl ModelFile {
    /// Snapshot a traced tree. Paths come out in observation order with
    /// orders renumbered densely from zero.
    pub fn from_tree(tree: &PathTree, rho_relations: Vec<RhoRelation>) -> Self {
        let paths = tree
            .recorded_paths()
            .into_iter()
            .enumerate()
            .map(|(index, recorded)| PathEntry {
                path: recorded.path,
                tag: recorded.tag,
                order: index as u32,
            })
            .collect();
        ModelFile {
            paths,
            rho_relations,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serializing model")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("parsing model")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json).with_context(|| format!("writing model to {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading model from {}", path.display()))?;
        Self::from_json(&json)
    }
}

/// Summary numbers for a persisted model.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStats {
    pub path_count: usize,
    pub rho_count: usize,
    pub max_depth: usize,
    /// Count of recorded paths per type tag name.
    pub tags: BTreeMap<String, usize>,
    /// Count of terminal components per component kind.
    pub components: BTreeMap<String, usize>,
}

impl ModelStats {
    pub fn from_model(model: &ModelFile) -> Self {
        let mut tags = BTreeMap::new();
        let mut components = BTreeMap::new();
        let mut max_depth = 0;
        for entry in &model.paths {
            max_depth = max_depth.max(entry.path.len());
            *tags.entry(entry.tag.name().to_string()).or_insert(0) += 1;
            if let Some(last) = entry.path.components().last() {
                let kind = match last {
                    PathComponent::Require { .. } => "require",
                    PathComponent::AccessProp { .. } => "accessProp",
                    PathComponent::WriteProp { .. } => "writeProp",
                    PathComponent::Arg { .. } => "arg",
                    PathComponent::Call { .. } => "call",
                    PathComponent::New { .. } => "new",
                };
                *components.entry(kind.to_string()).or_insert(0) += 1;
            }
        }
        ModelStats {
            path_count: model.paths.len(),
            rho_count: model.rho_relations.len(),
            max_depth,
            tags,
            components,
        }
    }

    pub fn render_human(&self) -> String {
        let mut out = format!(
            "paths: {}\nrho relations: {}\nmax depth: {}\n",
            self.path_count, self.rho_count, self.max_depth
        );
        out.push_str("tags:\n");
        for (tag, count) in &self.tags {
            out.push_str(&format!("  {:<10} {}\n", tag, count));
        }
        out.push_str("components:\n");
        for (kind, count) in &self.components {
            out.push_str(&format!("  {:<10} {}\n", kind, count));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::{LitValue, PrimLiteral, PrimType};
    use crate::path::CallId;

    fn access(name: &str) -> PathComponent {
        PathComponent::AccessProp {
            prop_name: name.to_string(),
        }
    }

    fn sample_model() -> ModelFile {
        let mut tree = PathTree::new();
        let root = AccessPath::root("lib");
        tree.record(&root, TypeTag::Object);
        let id = root.extend(access("id"));
        tree.record(&id, TypeTag::Function);
        let sink = id.extend(PathComponent::Arg {
            call_id: CallId("abc123".to_string()),
            arg_id: 0,
        });
        tree.record(&sink, TypeTag::Function);
        tree.record(
            &id.extend(PathComponent::Call {
                call_id: CallId("abc123".to_string()),
            }),
            TypeTag::Literal(PrimLiteral {
                prim: PrimType::Number,
                value: LitValue::Num(f64::INFINITY),
            }),
        );
        ModelFile::from_tree(
            &tree,
            vec![RhoRelation {
                source: id,
                sink,
            }],
        )
    }

    #[test]
    fn round_trip_preserves_everything() {
        let model = sample_model();
        let json = model.to_json().unwrap();
        let back = ModelFile::from_json(&json).unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn orders_are_a_dense_bijection() {
        let model = sample_model();
        let orders: Vec<u32> = model.paths.iter().map(|p| p.order).collect();
        let expected: Vec<u32> = (0..model.paths.len() as u32).collect();
        assert_eq!(orders, expected);
    }

    #[test]
    fn rho_relations_serialize_as_pairs() {
        let model = sample_model();
        let json = serde_json::to_value(&model).unwrap();
        let rho = json["rhoRelations"][0].as_array().unwrap();
        assert_eq!(rho.len(), 2);
        assert!(rho[0].is_array(), "each endpoint is a component array");
    }

    #[test]
    fn infinity_is_a_string_on_the_wire() {
        let model = sample_model();
        let json = model.to_json().unwrap();
        assert!(json.contains(r#""Infinity""#));
    }

    #[test]
    fn stats_count_paths_and_tags() {
        let stats = ModelStats::from_model(&sample_model());
        assert_eq!(stats.path_count, 4);
        assert_eq!(stats.rho_count, 1);
        assert_eq!(stats.max_depth, 3);
        assert_eq!(stats.tags.get("function"), Some(&2));
        assert_eq!(stats.components.get("require"), Some(&1));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.api.json");
        let model = sample_model();
        model.save(&path).unwrap();
        let back = ModelFile::load(&path).unwrap();
        assert_eq!(back, model);
    }
}
