//! # Access Paths
//!
//! A path describes how a value was obtained from (or handed to) the
//! subject library: a `require` root followed by property reads/writes,
//! argument positions, and call/construct results. Paths are the keys of
//! the whole model; two paths are equal iff their components agree on
//! their identity keys.

use std::fmt;

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Length of a generated call identifier. Uniqueness is only needed
/// within a single tracing run.
const CALL_ID_LEN: usize = 6;

const CALL_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Identifier tying together a call's arguments and its result.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub String);

impl CallId {
    pub fn fresh(rng: &mut StdRng) -> Self {
        let id: String = (0..CALL_ID_LEN)
            .map(|_| CALL_ID_ALPHABET[rng.gen_range(0..CALL_ID_ALPHABET.len())] as char)
            .collect();
        CallId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One step of an access path. The serialized form carries a `compType`
/// discriminator plus the identity keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "compType")]
pub enum PathComponent {
    #[serde(rename = "require")]
    Require {
        #[serde(rename = "moduleName")]
        module_name: String,
    },
    #[serde(rename = "accessProp")]
    AccessProp {
        #[serde(rename = "propName")]
        prop_name: String,
    },
    #[serde(rename = "writeProp")]
    WriteProp {
        #[serde(rename = "propName")]
        prop_name: String,
    },
    #[serde(rename = "arg")]
    Arg {
        #[serde(rename = "callId")]
        call_id: CallId,
        #[serde(rename = "argId")]
        arg_id: usize,
    },
    #[serde(rename = "call")]
    Call {
        #[serde(rename = "callId")]
        call_id: CallId,
    },
    #[serde(rename = "new")]
    New {
        #[serde(rename = "callId")]
        call_id: CallId,
    },
}

impl PathComponent {
    /// Does this component flip variance? Argument and write positions
    /// hand values from the client to the library.
    pub fn flips_variance(&self) -> bool {
        matches!(
            self,
            PathComponent::Arg { .. } | PathComponent::WriteProp { .. }
        )
    }
}

impl fmt::Display for PathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathComponent::Require { module_name } => write!(f, "require({})", module_name),
            PathComponent::AccessProp { prop_name } => write!(f, ".{}", prop_name),
            PathComponent::WriteProp { prop_name } => write!(f, ".{}=", prop_name),
            PathComponent::Arg { call_id, arg_id } => write!(f, "arg({},{})", call_id, arg_id),
            PathComponent::Call { call_id } => write!(f, "call({})", call_id),
            PathComponent::New { call_id } => write!(f, "new({})", call_id),
        }
    }
}

/// Whether a position is produced by the library (covariant) or supplied
/// by the client (contravariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variance {
    Covariant,
    Contravariant,
}

impl Variance {
    pub fn flip(self) -> Self {
        match self {
            Variance::Covariant => Variance::Contravariant,
            Variance::Contravariant => Variance::Covariant,
        }
    }
}

/// An ordered component sequence rooted at a `require`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessPath(Vec<PathComponent>);

impl AccessPath {
    pub fn root(module_name: impl Into<String>) -> Self {
        AccessPath(vec![PathComponent::Require {
            module_name: module_name.into(),
        }])
    }

    pub fn from_components(components: Vec<PathComponent>) -> Self {
        AccessPath(components)
    }

    /// A new path with `component` appended.
    pub fn extend(&self, component: PathComponent) -> Self {
        let mut components = self.0.clone();
        components.push(component);
        AccessPath(components)
    }

    pub fn components(&self) -> &[PathComponent] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Variance from the parity of variance-flipping components.
    pub fn variance(&self) -> Variance {
        let flips = self.0.iter().filter(|c| c.flips_variance()).count();
        if flips % 2 == 0 {
            Variance::Covariant
        } else {
            Variance::Contravariant
        }
    }
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.0.iter().enumerate() {
            if i > 0 && !matches!(component, PathComponent::AccessProp { .. } | PathComponent::WriteProp { .. }) {
                write!(f, ".")?;
            }
            write!(f, "{}", component)?;
        }
        Ok(())
    }
}

/// An observed flow: the value produced at `source` was later passed to
/// the library at argument position `sink`. Serialized as a two-element
/// `[source, sink]` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "(AccessPath, AccessPath)", from = "(AccessPath, AccessPath)")]
pub struct RhoRelation {
    pub source: AccessPath,
    pub sink: AccessPath,
}

impl From<RhoRelation> for (AccessPath, AccessPath) {
    fn from(relation: RhoRelation) -> Self {
        (relation.source, relation.sink)
    }
}

impl From<(AccessPath, AccessPath)> for RhoRelation {
    fn from((source, sink): (AccessPath, AccessPath)) -> Self {
        RhoRelation { source, sink }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn call(id: &str) -> PathComponent {
        PathComponent::Call {
            call_id: CallId(id.to_string()),
        }
    }

    fn arg(id: &str, n: usize) -> PathComponent {
        PathComponent::Arg {
            call_id: CallId(id.to_string()),
            arg_id: n,
        }
    }

    fn access(name: &str) -> PathComponent {
        PathComponent::AccessProp {
            prop_name: name.to_string(),
        }
    }

    #[test]
    fn variance_follows_arg_and_write_parity() {
        let root = AccessPath::root("lib");
        assert_eq!(root.variance(), Variance::Covariant);

        let read = root.extend(access("f"));
        assert_eq!(read.variance(), Variance::Covariant);

        let argument = read.extend(arg("c1", 0));
        assert_eq!(argument.variance(), Variance::Contravariant);

        // Library invokes a callback argument: back to covariant.
        let callback_arg = argument.extend(arg("c2", 0));
        assert_eq!(callback_arg.variance(), Variance::Covariant);

        let write = root.extend(PathComponent::WriteProp {
            prop_name: "x".to_string(),
        });
        assert_eq!(write.variance(), Variance::Contravariant);
    }

    #[test]
    fn path_equality_is_structural() {
        let a = AccessPath::root("lib").extend(call("abc123"));
        let b = AccessPath::root("lib").extend(call("abc123"));
        let c = AccessPath::root("lib").extend(call("zzz999"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn call_ids_are_deterministic_under_seed() {
        let mut rng_a = StdRng::seed_from_u64(7);
        let mut rng_b = StdRng::seed_from_u64(7);
        let a: Vec<CallId> = (0..10).map(|_| CallId::fresh(&mut rng_a)).collect();
        let b: Vec<CallId> = (0..10).map(|_| CallId::fresh(&mut rng_b)).collect();
        assert_eq!(a, b);
        assert!(a.iter().all(|id| id.0.len() == 6));
        assert_ne!(a[0], a[1]);
    }

    #[test]
    fn components_serialize_with_comp_type() {
        let json = serde_json::to_string(&access("greet")).unwrap();
        assert_eq!(json, r#"{"compType":"accessProp","propName":"greet"}"#);
        let json = serde_json::to_string(&arg("abc", 2)).unwrap();
        assert_eq!(json, r#"{"compType":"arg","callId":"abc","argId":2}"#);
        let back: PathComponent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, arg("abc", 2));
    }
}
