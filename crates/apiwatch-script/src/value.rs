//! # Dynamic Value Model
//!
//! Runtime values for the script engine. `Value` is a cheap-to-clone
//! tagged union; compound values share interiors through `Rc`, matching
//! the aliasing semantics client programs expect from a dynamic language.
//!
//! The `Proxy` variant is the interposition seam: every property read,
//! property write, call, and construction on a proxy is routed to its
//! [`Mediator`]. The tracing layer and the replay-time synthesizer are
//! both implemented as mediators, so the engine itself stays unaware of
//! either.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::FunctionLiteral;
use crate::error::EvalResult;
use crate::interp::{Interpreter, ScopeRef};

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(Rc<str>),
    Sym(Rc<Symbol>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<ObjectData>),
    MapObj(Rc<RefCell<Vec<(Value, Value)>>>),
    SetObj(Rc<RefCell<Vec<Value>>>),
    Error(Rc<ErrorData>),
    Function(Rc<FunctionData>),
    Proxy(Rc<dyn Mediator>),
}

/// A unique symbol; identity is the `Rc` allocation.
pub struct Symbol {
    pub description: String,
}

/// Plain object: an insertion-ordered property table plus a side table
/// for symbol-keyed properties.
#[derive(Default)]
pub struct ObjectData {
    pub props: RefCell<IndexMap<String, Value>>,
    pub sym_props: RefCell<Vec<(Rc<Symbol>, Value)>>,
}

pub struct ErrorData {
    pub message: String,
}

pub struct FunctionData {
    pub name: Option<String>,
    /// Engine intrinsics (`console.log`, string/array methods) are
    /// builtins; library host functions are not.
    pub builtin: bool,
    pub kind: FunctionKind,
}

pub enum FunctionKind {
    Script {
        decl: Rc<FunctionLiteral>,
        env: ScopeRef,
    },
    Native(NativeFn),
}

pub type NativeFn = Rc<dyn Fn(&mut Interpreter, Value, &[Value]) -> EvalResult<Value>>;

/// Property key: a string name or a symbol.
#[derive(Clone)]
pub enum PropKey {
    Name(String),
    Sym(Rc<Symbol>),
}

impl PropKey {
    pub fn name(n: impl Into<String>) -> Self {
        PropKey::Name(n.into())
    }

    /// Canonical key for a computed member access (`obj[expr]`).
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Sym(s) => PropKey::Sym(s.clone()),
            Value::Str(s) => PropKey::Name(s.to_string()),
            Value::Num(n) => PropKey::Name(num_to_string(*n)),
            other => PropKey::Name(other.to_string()),
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            PropKey::Name(n) => Some(n),
            PropKey::Sym(_) => None,
        }
    }
}

/// Interposition handler for a [`Value::Proxy`].
///
/// `target` must return the underlying value the proxy stands for; the
/// engine uses it for classification-adjacent queries (`typeof`,
/// truthiness, callability) so a proxy is indistinguishable from its
/// target everywhere except the four mediated operations.
pub trait Mediator {
    fn target(&self) -> Value;
    fn get(&self, interp: &mut Interpreter, key: &PropKey) -> EvalResult<Value>;
    fn set(&self, interp: &mut Interpreter, key: &PropKey, value: Value) -> EvalResult<()>;
    fn call(&self, interp: &mut Interpreter, this: Value, args: &[Value]) -> EvalResult<Value>;
    fn construct(&self, interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value>;
    /// Downcast support so embedders can recognize their own mediators.
    fn as_any(&self) -> &dyn Any;
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn object() -> Self {
        Value::Object(Rc::new(ObjectData::default()))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Value::Error(Rc::new(ErrorData {
            message: message.into(),
        }))
    }

    /// A native function provided by an embedded library.
    pub fn native_fn(
        name: impl Into<String>,
        f: impl Fn(&mut Interpreter, Value, &[Value]) -> EvalResult<Value> + 'static,
    ) -> Self {
        Value::Function(Rc::new(FunctionData {
            name: Some(name.into()),
            builtin: false,
            kind: FunctionKind::Native(Rc::new(f)),
        }))
    }

    /// An engine intrinsic; subject to the tracer's native short-circuit.
    pub fn builtin_fn(
        name: impl Into<String>,
        f: impl Fn(&mut Interpreter, Value, &[Value]) -> EvalResult<Value> + 'static,
    ) -> Self {
        Value::Function(Rc::new(FunctionData {
            name: Some(name.into()),
            builtin: true,
            kind: FunctionKind::Native(Rc::new(f)),
        }))
    }

    /// Follow proxy targets down to the raw value.
    pub fn unwrap_proxies(&self) -> Value {
        let mut current = self.clone();
        while let Value::Proxy(m) = &current {
            let next = m.target();
            current = next;
        }
        current
    }

    pub fn is_callable(&self) -> bool {
        match self {
            Value::Function(_) => true,
            Value::Proxy(m) => m.target().is_callable(),
            _ => false,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// `typeof` result.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Num(_) => "number",
            Value::Str(_) => "string",
            Value::Sym(_) => "symbol",
            Value::Function(_) => "function",
            Value::Proxy(m) => m.target().type_of(),
            _ => "object",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Proxy(m) => m.target().truthy(),
            _ => true,
        }
    }

    /// `===` semantics: primitives by value, compounds by identity.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Sym(a), Value::Sym(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::MapObj(a), Value::MapObj(b)) => Rc::ptr_eq(a, b),
            (Value::SetObj(a), Value::SetObj(b)) => Rc::ptr_eq(a, b),
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Proxy(a), Value::Proxy(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==` semantics, reduced: strict equality plus `null == undefined`.
    pub fn loose_eq(&self, other: &Value) -> bool {
        if self.strict_eq(other) {
            return true;
        }
        matches!(
            (self, other),
            (Value::Null, Value::Undefined) | (Value::Undefined, Value::Null)
        )
    }

    /// Numeric coercion for arithmetic and comparisons.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Num(n) => *n,
            Value::Bool(true) => 1.0,
            Value::Bool(false) => 0.0,
            Value::Null => 0.0,
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Value::Proxy(m) => m.target().to_number(),
            _ => f64::NAN,
        }
    }
}

/// Number-to-string with the host conventions (`Infinity`, `NaN`,
/// integer forms without a trailing `.0`).
pub fn num_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    format!("{}", n)
}

const DISPLAY_DEPTH: usize = 4;

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value, depth: usize) -> fmt::Result {
    if depth == 0 {
        return write!(f, "…");
    }
    match value {
        Value::Undefined => write!(f, "undefined"),
        Value::Null => write!(f, "null"),
        Value::Bool(b) => write!(f, "{}", b),
        Value::Num(n) => write!(f, "{}", num_to_string(*n)),
        Value::Str(s) => write!(f, "{}", s),
        Value::Sym(s) => write!(f, "Symbol({})", s.description),
        Value::Array(items) => {
            write!(f, "[")?;
            for (i, item) in items.borrow().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_value(f, item, depth - 1)?;
            }
            write!(f, "]")
        }
        Value::Object(o) => {
            write!(f, "{{")?;
            for (i, (k, v)) in o.props.borrow().iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, " {}: ", k)?;
                write_value(f, v, depth - 1)?;
            }
            write!(f, " }}")
        }
        Value::MapObj(entries) => write!(f, "[Map({})]", entries.borrow().len()),
        Value::SetObj(items) => write!(f, "[Set({})]", items.borrow().len()),
        Value::Error(e) => write!(f, "Error: {}", e.message),
        Value::Function(func) => {
            write!(f, "[Function: {}]", func.name.as_deref().unwrap_or("anonymous"))
        }
        Value::Proxy(m) => write_value(f, &m.target(), depth),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, DISPLAY_DEPTH)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            other => write_value(f, other, DISPLAY_DEPTH),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_formatting() {
        assert_eq!(num_to_string(3.0), "3");
        assert_eq!(num_to_string(3.5), "3.5");
        assert_eq!(num_to_string(f64::INFINITY), "Infinity");
        assert_eq!(num_to_string(f64::NAN), "NaN");
        assert_eq!(num_to_string(-0.0), "0");
    }

    #[test]
    fn strict_eq_identity_for_objects() {
        let a = Value::object();
        let b = a.clone();
        assert!(a.strict_eq(&b));
        assert!(!a.strict_eq(&Value::object()));
    }

    #[test]
    fn loose_eq_null_undefined() {
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(!Value::Null.loose_eq(&Value::Bool(false)));
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Undefined.truthy());
        assert!(!Value::Num(0.0).truthy());
        assert!(!Value::string("").truthy());
        assert!(Value::string("x").truthy());
        assert!(Value::object().truthy());
    }
}
