//! # Type Lattice
//!
//! Classification of runtime values into a small set of type tags, plus
//! the compatibility relation used at replay time. In covariant
//! positions primitives are refined to literal tags carrying the exact
//! value; contravariant positions keep the bare primitive tag so client
//! inputs stay general enough to synthesize.

use serde::{Deserialize, Serialize};

use apiwatch_script::Value;

use crate::path::Variance;

/// A type tag for an observed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TagRepr", into = "TagRepr")]
pub enum TypeTag {
    Null,
    Undefined,
    String,
    Number,
    Boolean,
    Array,
    Object,
    Function,
    Map,
    Set,
    Error,
    /// Primitive refined to its exact value (covariant positions only).
    Literal(PrimLiteral),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimLiteral {
    pub prim: PrimType,
    pub value: LitValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimType {
    String,
    Number,
    Boolean,
}

#[derive(Debug, Clone)]
pub enum LitValue {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl PartialEq for LitValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LitValue::Str(a), LitValue::Str(b)) => a == b,
            // NaN compares equal to itself: two observations of NaN are
            // the same literal.
            (LitValue::Num(a), LitValue::Num(b)) => (a.is_nan() && b.is_nan()) || a == b,
            (LitValue::Bool(a), LitValue::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for LitValue {}

impl TypeTag {
    pub fn name(&self) -> &'static str {
        match self {
            TypeTag::Null => "null",
            TypeTag::Undefined => "undefined",
            TypeTag::String => "string",
            TypeTag::Number => "number",
            TypeTag::Boolean => "boolean",
            TypeTag::Array => "array",
            TypeTag::Object => "object",
            TypeTag::Function => "function",
            TypeTag::Map => "map",
            TypeTag::Set => "set",
            TypeTag::Error => "error",
            TypeTag::Literal(lit) => match lit.prim {
                PrimType::String => "string",
                PrimType::Number => "number",
                PrimType::Boolean => "boolean",
            },
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "null" => TypeTag::Null,
            "undefined" => TypeTag::Undefined,
            "string" => TypeTag::String,
            "number" => TypeTag::Number,
            "boolean" => TypeTag::Boolean,
            "array" => TypeTag::Array,
            "object" => TypeTag::Object,
            "function" => TypeTag::Function,
            "map" => TypeTag::Map,
            "set" => TypeTag::Set,
            "error" => TypeTag::Error,
            _ => return None,
        })
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeTag::Literal(lit) => {
                let rendered = match &lit.value {
                    LitValue::Str(s) => format!("{:?}", s),
                    LitValue::Num(n) => apiwatch_script::value::num_to_string(*n),
                    LitValue::Bool(b) => b.to_string(),
                };
                write!(f, "{}({})", self.name(), rendered)
            }
            plain => write!(f, "{}", plain.name()),
        }
    }
}

/// Classify a runtime value. Dispatch order is significant: specific
/// object flavors (error, array, map, set) come before the generic
/// object case.
pub fn classify(value: &Value, variance: Variance) -> TypeTag {
    match value {
        Value::Proxy(m) => classify(&m.target(), variance),
        Value::Null => TypeTag::Null,
        Value::Undefined => TypeTag::Undefined,
        Value::Error(_) => TypeTag::Error,
        Value::Array(_) => TypeTag::Array,
        Value::MapObj(_) => TypeTag::Map,
        Value::SetObj(_) => TypeTag::Set,
        Value::Str(s) => primitive(
            PrimType::String,
            LitValue::Str(s.to_string()),
            variance,
        ),
        Value::Num(n) => primitive(PrimType::Number, LitValue::Num(*n), variance),
        Value::Bool(b) => primitive(PrimType::Boolean, LitValue::Bool(*b), variance),
        Value::Function(_) => TypeTag::Function,
        Value::Object(_) | Value::Sym(_) => TypeTag::Object,
    }
}

fn primitive(prim: PrimType, value: LitValue, variance: Variance) -> TypeTag {
    match variance {
        Variance::Covariant => TypeTag::Literal(PrimLiteral { prim, value }),
        Variance::Contravariant => match prim {
            PrimType::String => TypeTag::String,
            PrimType::Number => TypeTag::Number,
            PrimType::Boolean => TypeTag::Boolean,
        },
    }
}

/// Drop literal refinement, keeping the bare primitive tag.
pub fn widen(tag: &TypeTag) -> TypeTag {
    match tag {
        TypeTag::Literal(lit) => match lit.prim {
            PrimType::String => TypeTag::String,
            PrimType::Number => TypeTag::Number,
            PrimType::Boolean => TypeTag::Boolean,
        },
        other => other.clone(),
    }
}

/// Is `actual` acceptable where `required` was recorded?
///
/// - a recorded `null` is an untyped position and accepts anything;
/// - a recorded `object` widens over the structured flavors;
/// - otherwise tags must match structurally (literals compare by value).
pub fn compatible(actual: &TypeTag, required: &TypeTag) -> bool {
    if *required == TypeTag::Null {
        return true;
    }
    if *required == TypeTag::Object {
        return matches!(
            actual,
            TypeTag::Object | TypeTag::Function | TypeTag::Map | TypeTag::Set
        );
    }
    actual == required
}

// ---------------------------------------------------------------------------
// Wire representation
// ---------------------------------------------------------------------------

/// Serialized form: either a bare tag name or `{primType, value}`, with
/// non-finite numbers spelled as the strings `"Infinity"` / `"NaN"`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TagRepr {
    Plain(String),
    Literal {
        #[serde(rename = "primType")]
        prim_type: String,
        value: LitRepr,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum LitRepr {
    Bool(bool),
    Num(f64),
    Str(String),
}

impl From<TypeTag> for TagRepr {
    fn from(tag: TypeTag) -> Self {
        match tag {
            TypeTag::Literal(lit) => {
                let prim_type = match lit.prim {
                    PrimType::String => "string",
                    PrimType::Number => "number",
                    PrimType::Boolean => "boolean",
                }
                .to_string();
                let value = match lit.value {
                    LitValue::Str(s) => LitRepr::Str(s),
                    LitValue::Bool(b) => LitRepr::Bool(b),
                    LitValue::Num(n) if n.is_nan() => LitRepr::Str("NaN".to_string()),
                    LitValue::Num(n) if n == f64::INFINITY => {
                        LitRepr::Str("Infinity".to_string())
                    }
                    LitValue::Num(n) if n == f64::NEG_INFINITY => {
                        LitRepr::Str("-Infinity".to_string())
                    }
                    LitValue::Num(n) => LitRepr::Num(n),
                };
                TagRepr::Literal { prim_type, value }
            }
            plain => TagRepr::Plain(plain.name().to_string()),
        }
    }
}

impl TryFrom<TagRepr> for TypeTag {
    type Error = String;

    fn try_from(repr: TagRepr) -> Result<Self, String> {
        match repr {
            TagRepr::Plain(name) => {
                TypeTag::from_name(&name).ok_or_else(|| format!("unknown type tag {:?}", name))
            }
            TagRepr::Literal { prim_type, value } => {
                let prim = match prim_type.as_str() {
                    "string" => PrimType::String,
                    "number" => PrimType::Number,
                    "boolean" => PrimType::Boolean,
                    other => return Err(format!("unknown primitive type {:?}", other)),
                };
                let value = match (prim, value) {
                    (PrimType::Number, LitRepr::Str(s)) => match s.as_str() {
                        "Infinity" => LitValue::Num(f64::INFINITY),
                        "-Infinity" => LitValue::Num(f64::NEG_INFINITY),
                        "NaN" => LitValue::Num(f64::NAN),
                        other => {
                            return Err(format!("invalid number sentinel {:?}", other));
                        }
                    },
                    (_, LitRepr::Str(s)) => LitValue::Str(s),
                    (_, LitRepr::Num(n)) => LitValue::Num(n),
                    (_, LitRepr::Bool(b)) => LitValue::Bool(b),
                };
                Ok(TypeTag::Literal(PrimLiteral { prim, value }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit_num(n: f64) -> TypeTag {
        TypeTag::Literal(PrimLiteral {
            prim: PrimType::Number,
            value: LitValue::Num(n),
        })
    }

    #[test]
    fn classification_order_puts_specific_before_object() {
        assert_eq!(
            classify(&Value::error("x"), Variance::Covariant),
            TypeTag::Error
        );
        assert_eq!(
            classify(&Value::array(vec![]), Variance::Covariant),
            TypeTag::Array
        );
        assert_eq!(
            classify(&Value::object(), Variance::Covariant),
            TypeTag::Object
        );
    }

    #[test]
    fn covariant_primitives_refine_to_literals() {
        let tag = classify(&Value::string("hello"), Variance::Covariant);
        assert_eq!(
            tag,
            TypeTag::Literal(PrimLiteral {
                prim: PrimType::String,
                value: LitValue::Str("hello".to_string()),
            })
        );
    }

    #[test]
    fn contravariant_primitives_stay_bare() {
        assert_eq!(
            classify(&Value::Num(3.0), Variance::Contravariant),
            TypeTag::Number
        );
        assert_eq!(
            classify(&Value::Bool(true), Variance::Contravariant),
            TypeTag::Boolean
        );
    }

    #[test]
    fn compatibility_widens_object() {
        assert!(compatible(&TypeTag::Function, &TypeTag::Object));
        assert!(compatible(&TypeTag::Map, &TypeTag::Object));
        assert!(!compatible(&TypeTag::Number, &TypeTag::Object));
    }

    #[test]
    fn compatibility_null_accepts_anything() {
        assert!(compatible(&TypeTag::Function, &TypeTag::Null));
        assert!(compatible(&lit_num(4.0), &TypeTag::Null));
    }

    #[test]
    fn compatibility_requires_structural_equality_otherwise() {
        assert!(compatible(&TypeTag::Number, &TypeTag::Number));
        assert!(!compatible(&TypeTag::String, &TypeTag::Number));
        assert!(compatible(&lit_num(4.0), &lit_num(4.0)));
        assert!(!compatible(&lit_num(4.0), &lit_num(5.0)));
    }

    #[test]
    fn nan_literal_equals_itself() {
        assert_eq!(lit_num(f64::NAN), lit_num(f64::NAN));
    }

    #[test]
    fn sentinels_round_trip_through_json() {
        for tag in [
            lit_num(f64::INFINITY),
            lit_num(f64::NAN),
            lit_num(2.5),
            TypeTag::Function,
            TypeTag::Literal(PrimLiteral {
                prim: PrimType::String,
                value: LitValue::Str("Infinity".to_string()),
            }),
        ] {
            let json = serde_json::to_string(&tag).unwrap();
            let back: TypeTag = serde_json::from_str(&json).unwrap();
            assert_eq!(back, tag, "round-trip failed for {}", json);
        }
        assert_eq!(
            serde_json::to_string(&lit_num(f64::INFINITY)).unwrap(),
            r#"{"primType":"number","value":"Infinity"}"#
        );
        assert_eq!(serde_json::to_string(&TypeTag::Map).unwrap(), r#""map""#);
    }
}
