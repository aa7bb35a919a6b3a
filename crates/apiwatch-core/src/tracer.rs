//! # Tracer
//!
//! Wraps the subject library in transparent mediators. Every read,
//! write, call, and construction that crosses the client↔library
//! boundary extends an access path, classifies the observed value, and
//! records the pair into the shared path tree before delegating to the
//! real operation.
//!
//! Returned objects and functions are wrapped recursively so the
//! exploration follows values wherever the client takes them. Arguments
//! are wrapped too, which is what lets the tracer see the library
//! reading properties of client-supplied objects. An argument that is
//! already a tracer proxy is passed through untouched and contributes a
//! ρ-relation instead: the model must remember that this exact value
//! originated at another path.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use apiwatch_script::value::Mediator;
use apiwatch_script::{EvalResult, Interpreter, PropKey, Value};

use crate::lattice::{classify, TypeTag};
use crate::path::{AccessPath, CallId, PathComponent, RhoRelation};
use crate::tree::PathTree;

/// Reserved property name a mediator answers with its own access path.
/// Reads of this name are never recorded.
pub const PATH_SENTINEL: &str = "@@__PATH__@@";

pub(crate) struct TraceState {
    pub tree: PathTree,
    pub rho: Vec<RhoRelation>,
    pub rng: StdRng,
}

/// Shared recording state for one tracing run. Clones share the same
/// underlying tree.
#[derive(Clone)]
pub struct TraceSession {
    state: Rc<RefCell<TraceState>>,
}

impl Default for TraceSession {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceSession {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Deterministic call ids, for reproducible runs and tests.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            state: Rc::new(RefCell::new(TraceState {
                tree: PathTree::new(),
                rho: Vec::new(),
                rng,
            })),
        }
    }

    /// Record the root `require` and hand back the mediated library.
    pub fn wrap_root(&self, module_name: &str, library: Value) -> Value {
        let path = AccessPath::root(module_name);
        let tag = record(&self.state, &path, &library);
        if should_wrap(&tag) {
            wrap(self.state.clone(), library, path)
        } else {
            library
        }
    }

    pub fn recorded_len(&self) -> usize {
        self.state.borrow().tree.recorded_len()
    }

    pub fn rho_len(&self) -> usize {
        self.state.borrow().rho.len()
    }

    /// Extract the recorded model. Mediators that outlive the session
    /// keep recording into an empty tree that is simply discarded.
    pub fn finish(self) -> (PathTree, Vec<RhoRelation>) {
        let mut state = self.state.borrow_mut();
        let tree = std::mem::take(&mut state.tree);
        let rho = std::mem::take(&mut state.rho);
        (tree, rho)
    }
}

fn record(state: &Rc<RefCell<TraceState>>, path: &AccessPath, value: &Value) -> TypeTag {
    let tag = classify(value, path.variance());
    state.borrow_mut().tree.record(path, tag.clone());
    tag
}

/// Only plain objects and functions are wrapped; arrays, maps, sets,
/// errors, and primitives are returned raw.
fn should_wrap(tag: &TypeTag) -> bool {
    matches!(tag, TypeTag::Object | TypeTag::Function)
}

/// The access path a tracer proxy carries, if the value is one.
pub(crate) fn trace_path_of(value: &Value) -> Option<AccessPath> {
    if let Value::Proxy(m) = value {
        return m
            .as_any()
            .downcast_ref::<TraceMediator>()
            .map(|t| t.path.clone());
    }
    None
}

fn wrap(state: Rc<RefCell<TraceState>>, target: Value, path: AccessPath) -> Value {
    Value::Proxy(Rc::new(TraceMediator {
        state,
        target,
        path,
    }))
}

pub(crate) struct TraceMediator {
    state: Rc<RefCell<TraceState>>,
    target: Value,
    path: AccessPath,
}

impl TraceMediator {
    /// Wrap the result of a call/construct unless it is already traced.
    fn wrap_result(&self, result: Value, path: AccessPath, force: bool) -> Value {
        if trace_path_of(&result).is_some() {
            return result;
        }
        let tag = classify(&result, path.variance());
        if force || should_wrap(&tag) {
            wrap(self.state.clone(), result, path)
        } else {
            result
        }
    }

    /// Record each argument, wrap the wrappable ones, and capture
    /// ρ-relations for arguments that are already traced values.
    fn process_args(&self, call_id: &CallId, args: &[Value]) -> Vec<Value> {
        let mut processed = Vec::with_capacity(args.len());
        for (arg_id, arg) in args.iter().enumerate() {
            let arg_path = self.path.extend(PathComponent::Arg {
                call_id: call_id.clone(),
                arg_id,
            });
            let tag = record(&self.state, &arg_path, arg);
            if let Some(source) = trace_path_of(arg) {
                self.state.borrow_mut().rho.push(RhoRelation {
                    source,
                    sink: arg_path,
                });
                processed.push(arg.clone());
            } else if should_wrap(&tag) {
                processed.push(wrap(self.state.clone(), arg.clone(), arg_path));
            } else {
                processed.push(arg.clone());
            }
        }
        processed
    }

    fn fresh_call_id(&self) -> CallId {
        CallId::fresh(&mut self.state.borrow_mut().rng)
    }
}

impl Mediator for TraceMediator {
    fn target(&self) -> Value {
        self.target.clone()
    }

    fn get(&self, interp: &mut Interpreter, key: &PropKey) -> EvalResult<Value> {
        let name = match key {
            // Symbol-keyed reads are not modeled; pass them through.
            PropKey::Sym(_) => return interp.get_property(&self.target, key),
            PropKey::Name(name) => name.clone(),
        };
        if name == PATH_SENTINEL {
            return Ok(Value::string(self.path.to_string()));
        }
        let extended = self.path.extend(PathComponent::AccessProp {
            prop_name: name.clone(),
        });
        let raw = interp.get_property(&self.target, key)?;
        let tag = record(&self.state, &extended, &raw);
        debug!(path = %extended, tag = %tag, "traced property read");

        if trace_path_of(&raw).is_some() {
            return Ok(raw);
        }
        // Engine intrinsics go back raw so they keep their native
        // receiver behavior.
        if let Value::Function(f) = &raw {
            if f.builtin {
                return Ok(raw);
            }
        }
        if should_wrap(&tag) && !matches!(raw, Value::Null) {
            return Ok(wrap(self.state.clone(), raw, extended));
        }
        Ok(raw)
    }

    fn set(&self, interp: &mut Interpreter, key: &PropKey, value: Value) -> EvalResult<()> {
        let name = match key {
            PropKey::Sym(_) => return interp.set_property(&self.target, key, value),
            PropKey::Name(name) => name.clone(),
        };
        let extended = self.path.extend(PathComponent::WriteProp { prop_name: name });
        let tag = record(&self.state, &extended, &value);
        debug!(path = %extended, tag = %tag, "traced property write");
        interp.set_property(&self.target, key, value)
    }

    fn call(&self, interp: &mut Interpreter, this: Value, args: &[Value]) -> EvalResult<Value> {
        let call_id = self.fresh_call_id();
        let processed = self.process_args(&call_id, args);
        // The raw receiver: mediation covers the client↔library boundary,
        // not the library's own self-access.
        let this_raw = this.unwrap_proxies();
        let result = interp.call_value(&self.target, this_raw, &processed)?;
        let call_path = self.path.extend(PathComponent::Call { call_id });
        let tag = record(&self.state, &call_path, &result);
        debug!(path = %call_path, tag = %tag, "traced call");
        Ok(self.wrap_result(result, call_path, false))
    }

    fn construct(&self, interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
        let call_id = self.fresh_call_id();
        let processed = self.process_args(&call_id, args);
        let result = interp.construct_value(&self.target, &processed)?;
        let new_path = self.path.extend(PathComponent::New { call_id });
        let tag = record(&self.state, &new_path, &result);
        debug!(path = %new_path, tag = %tag, "traced construct");
        Ok(self.wrap_result(result, new_path, true))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
