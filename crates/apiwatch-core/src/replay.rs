//! # Replayer
//!
//! Drives a reconstructed model against a (possibly new) library
//! version. The traversal is demand-ordered: nodes are processed in
//! ascending observation order, which reproduces the sequence in which
//! the library originally executed and is therefore safe with respect
//! to hidden state the library mutates between calls.
//!
//! Each node kind has a handler: `require` imports the library,
//! `accessProp` reads and checks, `writeProp` and `arg` synthesize
//! client values, `call`/`new` invoke and check the result. Library
//! exceptions during invocation are logged and skipped; type
//! incompatibilities become breaking-path records, never failures.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};

use apiwatch_script::{Interpreter, PropKey, Value};

use crate::lattice::{classify, compatible, TypeTag};
use crate::model::{ModelNodeId, ModelTree};
use crate::path::PathComponent;
use crate::report::{BreakageKind, BreakingPath, CheckReport};
use crate::synth::synthesize;

/// Where replay gets library modules from. The host bridge implements
/// this against the filesystem; tests implement it with closures.
pub trait LibrarySource {
    fn load(&mut self, interp: &mut Interpreter, module_name: &str) -> anyhow::Result<Value>;
}

impl<F> LibrarySource for F
where
    F: FnMut(&mut Interpreter, &str) -> anyhow::Result<Value>,
{
    fn load(&mut self, interp: &mut Interpreter, module_name: &str) -> anyhow::Result<Value> {
        self(interp, module_name)
    }
}

/// Shared replay state reachable from synthesizer mediators.
pub(crate) struct ReplayCtx {
    pub model: RefCell<ModelTree>,
    pub report: RefCell<CheckReport>,
}

pub struct Replayer<'a, L: LibrarySource> {
    interp: &'a mut Interpreter,
    source: &'a mut L,
    ctx: Rc<ReplayCtx>,
    visited: usize,
}

impl<'a, L: LibrarySource> Replayer<'a, L> {
    pub fn new(
        interp: &'a mut Interpreter,
        source: &'a mut L,
        model: ModelTree,
        library: impl Into<String>,
    ) -> Self {
        Self {
            interp,
            source,
            ctx: Rc::new(ReplayCtx {
                model: RefCell::new(model),
                report: RefCell::new(CheckReport::new(library)),
            }),
            visited: 0,
        }
    }

    /// Replay the whole model and collect the report.
    pub fn run(mut self) -> CheckReport {
        let schedule = self.ctx.model.borrow().schedule();
        for id in schedule {
            if self.ctx.model.borrow().node(id).processed {
                continue;
            }
            self.process(id);
        }
        let mut report = self.ctx.report.borrow_mut();
        report.checked_paths = self.visited;
        report.clone()
    }

    fn process(&mut self, id: ModelNodeId) {
        self.ctx.model.borrow_mut().node_mut(id).processed = true;
        self.visited += 1;
        let component = self.ctx.model.borrow().node(id).component.clone();
        match component {
            Some(PathComponent::Require { module_name }) => self.process_require(id, &module_name),
            Some(PathComponent::AccessProp { prop_name }) => self.process_access(id, &prop_name),
            Some(PathComponent::WriteProp { prop_name }) => self.process_write(id, &prop_name),
            Some(PathComponent::Arg { .. }) => self.process_arg(id),
            Some(PathComponent::Call { call_id }) => self.process_invoke(id, &call_id, false),
            Some(PathComponent::New { call_id }) => self.process_invoke(id, &call_id, true),
            None => {}
        }
    }

    fn process_require(&mut self, id: ModelNodeId, module_name: &str) {
        match self.source.load(self.interp, module_name) {
            Ok(library) => {
                let tag = classify(&library, self.ctx.model.borrow().variance_of(id));
                self.check(id, tag);
                self.ctx.model.borrow_mut().node_mut(id).obj = Some(library);
            }
            Err(e) => {
                warn!(module = module_name, error = %e, "library failed to load during replay");
                self.mark_empty(id, "module failed to load");
            }
        }
    }

    fn process_access(&mut self, id: ModelNodeId, prop_name: &str) {
        let Some(parent_obj) = self.parent_object(id) else {
            return;
        };
        let read = self
            .interp
            .get_property(&parent_obj, &PropKey::name(prop_name));
        match read {
            Ok(value) => {
                let tag = classify(&value, self.ctx.model.borrow().variance_of(id));
                self.check(id, tag);
                self.ctx.model.borrow_mut().node_mut(id).obj = Some(value);
            }
            Err(e) => {
                debug!(prop = prop_name, error = %e, "property read failed during replay");
                self.mark_empty(id, "get property of undefined");
            }
        }
    }

    fn process_write(&mut self, id: ModelNodeId, prop_name: &str) {
        let value = synthesize(&self.ctx, id);
        self.ctx.model.borrow_mut().mark_subtree_processed(id);
        let Some(parent_obj) = self.parent_object(id) else {
            return;
        };
        if let Err(e) = self
            .interp
            .set_property(&parent_obj, &PropKey::name(prop_name), value)
        {
            debug!(prop = prop_name, error = %e, "property write failed during replay");
        }
    }

    fn process_arg(&mut self, id: ModelNodeId) {
        let rho_source = self.ctx.model.borrow().rho_source_for(id);
        if let Some(source) = rho_source {
            // The model asserts this argument was the exact value
            // produced at the source path: reuse it.
            if !self.ctx.model.borrow().node(source).processed {
                self.process(source);
            }
            let obj = self.ctx.model.borrow().node(source).obj.clone();
            self.ctx.model.borrow_mut().node_mut(id).obj = obj;
        } else {
            synthesize(&self.ctx, id);
        }
        self.ctx.model.borrow_mut().mark_subtree_processed(id);
    }

    fn process_invoke(&mut self, id: ModelNodeId, call_id: &crate::path::CallId, is_new: bool) {
        let Some(parent) = self.ctx.model.borrow().node(id).parent else {
            return;
        };
        let Some(callee) = self.parent_object(id) else {
            return;
        };
        // Gather this call's already-processed arguments, densely by
        // position.
        let (args, receiver) = {
            let model = self.ctx.model.borrow();
            let mut positional: Vec<(usize, Option<Value>)> = model
                .children_where(parent, |c| {
                    matches!(c, PathComponent::Arg { call_id: cid, .. } if cid == call_id)
                })
                .into_iter()
                .filter_map(|child| {
                    let node = model.node(child);
                    match &node.component {
                        Some(PathComponent::Arg { arg_id, .. }) => {
                            Some((*arg_id, node.obj.clone()))
                        }
                        _ => None,
                    }
                })
                .collect();
            positional.sort_by_key(|(arg_id, _)| *arg_id);
            let width = positional.iter().map(|(i, _)| i + 1).max().unwrap_or(0);
            let mut args = vec![Value::Undefined; width];
            for (arg_id, value) in positional {
                args[arg_id] = value.unwrap_or(Value::Undefined);
            }

            // Method-style calls use the object the function was read
            // from as the receiver.
            let receiver = if !is_new
                && matches!(
                    model.node(parent).component,
                    Some(PathComponent::AccessProp { .. })
                ) {
                model
                    .node(parent)
                    .parent
                    .and_then(|gp| model.node(gp).obj.clone())
                    .unwrap_or(Value::Undefined)
            } else {
                Value::Undefined
            };
            (args, receiver)
        };

        let result = if is_new {
            self.interp.construct_value(&callee, &args)
        } else {
            self.interp.call_value(&callee, receiver, &args)
        };
        match result {
            Ok(value) => {
                let tag = classify(&value, self.ctx.model.borrow().variance_of(id));
                self.check(id, tag);
                self.ctx.model.borrow_mut().node_mut(id).obj = Some(value);
            }
            Err(e) => {
                // The library throwing here is not itself a breaking
                // path; the replay moves on.
                warn!(error = %e, "library threw during replayed invocation");
            }
        }
    }

    /// The parent's reconstructed value, or `None` after flagging this
    /// node empty when the parent has nothing to offer.
    fn parent_object(&mut self, id: ModelNodeId) -> Option<Value> {
        let (parent_empty, parent_obj) = {
            let model = self.ctx.model.borrow();
            let parent = model.node(id).parent?;
            let parent_node = model.node(parent);
            (parent_node.empty, parent_node.obj.clone())
        };
        let missing = parent_empty
            || parent_obj.is_none()
            || matches!(parent_obj, Some(Value::Undefined));
        if missing {
            self.mark_empty(id, "get property of undefined");
            return None;
        }
        parent_obj
    }

    /// Flag a node empty and report the dead subtree access.
    fn mark_empty(&mut self, id: ModelNodeId, reason: &str) {
        self.ctx.model.borrow_mut().node_mut(id).empty = true;
        let path = self.ctx.model.borrow().path_of(id);
        self.ctx.report.borrow_mut().record(BreakingPath {
            breaking_path: path,
            kind: BreakageKind::EmptyAccess,
            actual: None,
            required: None,
            reason: Some(reason.to_string()),
        });
    }

    /// Covariant compatibility check against the recorded tag.
    fn check(&mut self, id: ModelNodeId, actual: TypeTag) {
        let required = self.ctx.model.borrow().node(id).tag.clone();
        let Some(required) = required else {
            return;
        };
        if compatible(&actual, &required) {
            return;
        }
        let path = self.ctx.model.borrow().path_of(id);
        self.ctx.report.borrow_mut().record(BreakingPath {
            breaking_path: path,
            kind: BreakageKind::TypeMismatch,
            actual: Some(actual),
            required: Some(required),
            reason: None,
        });
    }
}
