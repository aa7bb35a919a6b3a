//! # Value Synthesizer
//!
//! Replay needs stand-ins for everything the client supplied during
//! tracing: arguments and written properties. The synthesizer
//! manufactures them lazily from the model subtree — a property is
//! materialized only when the new library actually reads it, a callback
//! result only when the callback is actually invoked. Laziness is what
//! keeps replay safe in the presence of cyclic structures.
//!
//! Accesses the model never recorded are themselves evidence of a
//! breaking change: they are reported and answered with a safe default
//! (`null` for reads, `0` for unmatched callback invocations).

use std::any::Any;
use std::rc::Rc;

use apiwatch_script::value::Mediator;
use apiwatch_script::{EvalResult, Interpreter, PropKey, Value};

use crate::lattice::{classify, compatible, widen, LitValue, TypeTag};
use crate::model::ModelNodeId;
use crate::path::{PathComponent, Variance};
use crate::replay::ReplayCtx;
use crate::report::{BreakageKind, BreakingPath};

/// Manufacture (or fetch the cached) value for a model node. The result
/// is cached in the node's replay state so every sink that reuses the
/// node sees the same value.
pub(crate) fn synthesize(ctx: &Rc<ReplayCtx>, node: ModelNodeId) -> Value {
    if let Some(cached) = ctx.model.borrow().node(node).obj.clone() {
        return cached;
    }
    let tag = ctx.model.borrow().node(node).tag.clone();
    let value = match tag {
        None | Some(TypeTag::Undefined) => Value::Undefined,
        Some(TypeTag::Null) => Value::Null,
        Some(TypeTag::Literal(lit)) => match lit.value {
            LitValue::Str(s) => Value::string(s),
            LitValue::Num(n) => Value::Num(n),
            LitValue::Bool(b) => Value::Bool(b),
        },
        Some(TypeTag::Function) => Value::Proxy(Rc::new(SynthMediator::callable(ctx.clone(), node))),
        Some(_) => Value::Proxy(Rc::new(SynthMediator::plain(ctx.clone(), node))),
    };
    ctx.model.borrow_mut().node_mut(node).obj = Some(value.clone());
    value
}

/// Mediator standing in for a recorded client value during replay.
pub(crate) struct SynthMediator {
    ctx: Rc<ReplayCtx>,
    node: ModelNodeId,
    /// Raw value behind the proxy: an empty object, or a host callable
    /// when the recorded tag was `function`.
    target: Value,
}

impl SynthMediator {
    fn plain(ctx: Rc<ReplayCtx>, node: ModelNodeId) -> Self {
        Self {
            ctx,
            node,
            target: Value::object(),
        }
    }

    fn callable(ctx: Rc<ReplayCtx>, node: ModelNodeId) -> Self {
        Self {
            ctx,
            node,
            target: Value::native_fn("synthesized", |_interp, _this, _args| {
                Ok(Value::Undefined)
            }),
        }
    }

    fn report(&self, breakage: BreakingPath) {
        self.ctx.report.borrow_mut().record(breakage);
    }

    /// Does `actual` fit a recorded argument tag, contravariantly?
    fn arg_matches(recorded: &TypeTag, actual: &Value) -> bool {
        let refined = classify(actual, Variance::Covariant);
        if compatible(&refined, recorded) {
            return true;
        }
        compatible(&widen(&refined), recorded)
    }
}

impl Mediator for SynthMediator {
    fn target(&self) -> Value {
        self.target.clone()
    }

    fn get(&self, _interp: &mut Interpreter, key: &PropKey) -> EvalResult<Value> {
        let Some(name) = key.as_name() else {
            return Ok(Value::Undefined);
        };
        let child = self.ctx.model.borrow().find_child(self.node, |c| {
            matches!(c, PathComponent::AccessProp { prop_name } if prop_name == name)
        });
        match child {
            Some(child) => Ok(synthesize(&self.ctx, child)),
            None => {
                let path = self
                    .ctx
                    .model
                    .borrow()
                    .path_of(self.node)
                    .extend(PathComponent::AccessProp {
                        prop_name: name.to_string(),
                    });
                self.report(BreakingPath {
                    breaking_path: path,
                    kind: BreakageKind::UnexpectedRead,
                    actual: None,
                    required: None,
                    reason: Some("property read was never recorded".to_string()),
                });
                Ok(Value::Null)
            }
        }
    }

    fn set(&self, interp: &mut Interpreter, key: &PropKey, value: Value) -> EvalResult<()> {
        // Library-side writes to synthesized values are not modeled;
        // store them on the raw target so later raw reads stay coherent.
        interp.set_property(&self.target, key, value)
    }

    fn call(&self, _interp: &mut Interpreter, _this: Value, args: &[Value]) -> EvalResult<Value> {
        // Scan recorded invocations for one whose argument shapes accept
        // the actual arguments.
        let candidates: Vec<(crate::path::CallId, ModelNodeId)> = {
            let model = self.ctx.model.borrow();
            model
                .children_where(self.node, |c| matches!(c, PathComponent::Call { .. }))
                .into_iter()
                .filter_map(|child| match model.node(child).component.clone() {
                    Some(PathComponent::Call { call_id }) => Some((call_id, child)),
                    _ => None,
                })
                .collect()
        };

        for (call_id, call_node) in candidates {
            let recorded_args: Vec<(usize, Option<TypeTag>)> = {
                let model = self.ctx.model.borrow();
                let mut args: Vec<(usize, Option<TypeTag>)> = model
                    .children_where(self.node, |c| {
                        matches!(c, PathComponent::Arg { call_id: id, .. } if *id == call_id)
                    })
                    .into_iter()
                    .filter_map(|child| {
                        let node = model.node(child);
                        match &node.component {
                            Some(PathComponent::Arg { arg_id, .. }) => {
                                Some((*arg_id, node.tag.clone()))
                            }
                            _ => None,
                        }
                    })
                    .collect();
                args.sort_by_key(|(arg_id, _)| *arg_id);
                args
            };

            let matches = recorded_args.iter().all(|(arg_id, recorded)| {
                let actual = args.get(*arg_id).cloned().unwrap_or(Value::Undefined);
                match recorded {
                    Some(tag) => Self::arg_matches(tag, &actual),
                    None => true,
                }
            });
            if matches {
                return Ok(synthesize(&self.ctx, call_node));
            }
        }

        let signature: Vec<String> = args
            .iter()
            .map(|a| classify(a, Variance::Contravariant).to_string())
            .collect();
        let path = self.ctx.model.borrow().path_of(self.node);
        self.report(BreakingPath {
            breaking_path: path,
            kind: BreakageKind::UnexpectedSignature,
            actual: None,
            required: None,
            reason: Some(format!(
                "callback invoked with unrecorded signature ({})",
                signature.join(", ")
            )),
        });
        Ok(Value::Num(0.0))
    }

    fn construct(&self, _interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
        let candidates: Vec<ModelNodeId> = self
            .ctx
            .model
            .borrow()
            .children_where(self.node, |c| matches!(c, PathComponent::New { .. }));
        if let Some(first) = candidates.into_iter().next() {
            return Ok(synthesize(&self.ctx, first));
        }
        let signature: Vec<String> = args
            .iter()
            .map(|a| classify(a, Variance::Contravariant).to_string())
            .collect();
        let path = self.ctx.model.borrow().path_of(self.node);
        self.report(BreakingPath {
            breaking_path: path,
            kind: BreakageKind::UnexpectedSignature,
            actual: None,
            required: None,
            reason: Some(format!(
                "construction with unrecorded signature ({})",
                signature.join(", ")
            )),
        });
        Ok(Value::object())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
