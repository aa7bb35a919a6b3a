//! # Tree-Walking Interpreter
//!
//! Single-threaded, synchronous evaluator for the script subset. Scope
//! chains are `Rc`-linked environments; closures capture their defining
//! scope; `this` is a scope slot so arrow functions inherit it lexically.
//!
//! All property reads, property writes, calls, and constructions funnel
//! through the four public entry points (`get_property`, `set_property`,
//! `call_value`, `construct_value`). Embedders that need to observe those
//! operations install a [`crate::value::Mediator`] proxy; the evaluator
//! itself never special-cases one.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::*;
use crate::error::{EvalError, EvalResult};
use crate::value::{FunctionData, FunctionKind, ObjectData, PropKey, Symbol, Value};

const MAX_CALL_DEPTH: usize = 200;

/// One frame of the environment chain.
pub struct Scope {
    vars: RefCell<HashMap<String, Value>>,
    this_val: Option<Value>,
    parent: Option<ScopeRef>,
}

pub type ScopeRef = Rc<Scope>;

impl Scope {
    pub fn root() -> ScopeRef {
        Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            this_val: None,
            parent: None,
        })
    }

    pub fn child(parent: ScopeRef) -> ScopeRef {
        Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            this_val: None,
            parent: Some(parent),
        })
    }

    pub fn child_with_this(parent: ScopeRef, this: Value) -> ScopeRef {
        Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            this_val: Some(this),
            parent: Some(parent),
        })
    }

    pub fn declare(&self, name: impl AsRef<str>, value: Value) {
        self.vars.borrow_mut().insert(name.as_ref().to_string(), value);
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.vars.borrow().get(name) {
            return Some(v.clone());
        }
        self.parent.as_ref()?.lookup(name)
    }

    /// Assign to the nearest existing binding. Returns false when the
    /// name is not bound anywhere in the chain.
    fn assign(&self, name: &str, value: Value) -> bool {
        if self.vars.borrow().contains_key(name) {
            self.vars.borrow_mut().insert(name.to_string(), value);
            return true;
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => false,
        }
    }

    fn this(&self) -> Value {
        if let Some(v) = &self.this_val {
            return v.clone();
        }
        match &self.parent {
            Some(parent) => parent.this(),
            None => Value::Undefined,
        }
    }
}

/// Statement completion.
enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter {
    globals: ScopeRef,
    depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let globals = Scope::root();
        install_globals(&globals);
        Self { globals, depth: 0 }
    }

    pub fn globals(&self) -> &ScopeRef {
        &self.globals
    }

    /// Run a parsed program in a fresh scope seeded with `bindings`
    /// (typically `require` and `module`).
    pub fn run_with_bindings(
        &mut self,
        program: &Program,
        bindings: Vec<(String, Value)>,
    ) -> EvalResult<()> {
        let scope = Scope::child(self.globals.clone());
        for (name, value) in bindings {
            scope.declare(name, value);
        }
        self.run_program(program, &scope)
    }

    pub fn run_program(&mut self, program: &Program, scope: &ScopeRef) -> EvalResult<()> {
        self.hoist(&program.body, scope);
        for stmt in &program.body {
            if let Flow::Return(_) = self.exec_stmt(stmt, scope)? {
                break;
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Mediated value operations
    // -------------------------------------------------------------------

    pub fn get_property(&mut self, value: &Value, key: &PropKey) -> EvalResult<Value> {
        match value {
            Value::Proxy(m) => {
                let m = m.clone();
                m.get(self, key)
            }
            Value::Object(o) => Ok(match key {
                PropKey::Name(n) => o.props.borrow().get(n).cloned().unwrap_or(Value::Undefined),
                PropKey::Sym(s) => o
                    .sym_props
                    .borrow()
                    .iter()
                    .find(|(k, _)| Rc::ptr_eq(k, s))
                    .map(|(_, v)| v.clone())
                    .unwrap_or(Value::Undefined),
            }),
            Value::Array(items) => Ok(array_property(items, key)),
            Value::Str(s) => Ok(string_property(s, key)),
            Value::MapObj(entries) => Ok(map_property(entries, key)),
            Value::SetObj(items) => Ok(set_property_intrinsic(items, key)),
            Value::Error(e) => Ok(match key.as_name() {
                Some("message") => Value::string(&e.message),
                Some("name") => Value::string("Error"),
                _ => Value::Undefined,
            }),
            Value::Function(f) => Ok(match key.as_name() {
                Some("name") => Value::string(f.name.as_deref().unwrap_or("")),
                _ => Value::Undefined,
            }),
            Value::Undefined | Value::Null => Err(EvalError::type_error(format!(
                "cannot read properties of {} (reading '{}')",
                value,
                key.as_name().unwrap_or("<symbol>")
            ))),
            _ => Ok(Value::Undefined),
        }
    }

    pub fn set_property(&mut self, value: &Value, key: &PropKey, new_value: Value) -> EvalResult<()> {
        match value {
            Value::Proxy(m) => {
                let m = m.clone();
                m.set(self, key, new_value)
            }
            Value::Object(o) => {
                match key {
                    PropKey::Name(n) => {
                        o.props.borrow_mut().insert(n.clone(), new_value);
                    }
                    PropKey::Sym(s) => {
                        let mut syms = o.sym_props.borrow_mut();
                        if let Some(slot) = syms.iter_mut().find(|(k, _)| Rc::ptr_eq(k, s)) {
                            slot.1 = new_value;
                        } else {
                            syms.push((s.clone(), new_value));
                        }
                    }
                }
                Ok(())
            }
            Value::Array(items) => {
                if let Some(name) = key.as_name() {
                    if name == "length" {
                        let len = new_value.to_number();
                        if len.is_finite() && len >= 0.0 {
                            items.borrow_mut().resize(len as usize, Value::Undefined);
                        }
                        return Ok(());
                    }
                    if let Ok(index) = name.parse::<usize>() {
                        let mut vec = items.borrow_mut();
                        if index >= vec.len() {
                            vec.resize(index + 1, Value::Undefined);
                        }
                        vec[index] = new_value;
                        return Ok(());
                    }
                }
                Ok(())
            }
            Value::Undefined | Value::Null => Err(EvalError::type_error(format!(
                "cannot set properties of {}",
                value
            ))),
            // Writes to other primitives silently no-op.
            _ => Ok(()),
        }
    }

    pub fn call_value(&mut self, callee: &Value, this: Value, args: &[Value]) -> EvalResult<Value> {
        match callee {
            Value::Proxy(m) => {
                let m = m.clone();
                m.call(self, this, args)
            }
            Value::Function(f) => self.call_function(f.clone(), this, args),
            _ => Err(EvalError::type_error(format!(
                "{} is not a function",
                callee
            ))),
        }
    }

    pub fn construct_value(&mut self, callee: &Value, args: &[Value]) -> EvalResult<Value> {
        match callee {
            Value::Proxy(m) => {
                let m = m.clone();
                m.construct(self, args)
            }
            Value::Function(f) => match &f.kind {
                FunctionKind::Native(_) => {
                    // Native constructors build and return their own value.
                    self.call_function(f.clone(), Value::Undefined, args)
                }
                FunctionKind::Script { decl, .. } => {
                    if decl.is_arrow {
                        return Err(EvalError::type_error("arrow function is not a constructor"));
                    }
                    let this_obj = Value::object();
                    let result = self.call_function(f.clone(), this_obj.clone(), args)?;
                    Ok(if is_object_like(&result) {
                        result
                    } else {
                        this_obj
                    })
                }
            },
            _ => Err(EvalError::type_error(format!(
                "{} is not a constructor",
                callee
            ))),
        }
    }

    fn call_function(&mut self, f: Rc<FunctionData>, this: Value, args: &[Value]) -> EvalResult<Value> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(EvalError::RecursionLimit);
        }
        self.depth += 1;
        let result = match &f.kind {
            FunctionKind::Native(native) => {
                let native = native.clone();
                native(self, this, args)
            }
            FunctionKind::Script { decl, env } => {
                let scope = if decl.is_arrow {
                    Scope::child(env.clone())
                } else {
                    Scope::child_with_this(env.clone(), this)
                };
                for (i, param) in decl.params.iter().enumerate() {
                    scope.declare(param, args.get(i).cloned().unwrap_or(Value::Undefined));
                }
                let decl = decl.clone();
                self.hoist(&decl.body, &scope);
                let mut out = Value::Undefined;
                let mut result = Ok(());
                for stmt in &decl.body {
                    match self.exec_stmt(stmt, &scope) {
                        Ok(Flow::Normal) => {}
                        Ok(Flow::Return(v)) => {
                            out = v;
                            break;
                        }
                        Err(e) => {
                            result = Err(e);
                            break;
                        }
                    }
                }
                result.map(|_| out)
            }
        };
        self.depth -= 1;
        result
    }

    // -------------------------------------------------------------------
    // Statements
    // -------------------------------------------------------------------

    /// Pre-bind function declarations so forward references resolve.
    fn hoist(&mut self, body: &[Stmt], scope: &ScopeRef) {
        for stmt in body {
            if let Stmt::FunctionDecl(lit) = stmt {
                let closure = self.make_closure(lit.clone(), scope);
                if let Some(name) = &lit.name {
                    scope.declare(name, closure);
                }
            }
        }
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &ScopeRef) -> EvalResult<Flow> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval_expr(expr, scope)?;
                Ok(Flow::Normal)
            }
            Stmt::VarDecl { name, init } => {
                let value = match init {
                    Some(expr) => self.eval_expr(expr, scope)?,
                    None => Value::Undefined,
                };
                scope.declare(name, value);
                Ok(Flow::Normal)
            }
            // Bound during hoisting.
            Stmt::FunctionDecl(_) => Ok(Flow::Normal),
            Stmt::Return(value) => {
                let v = match value {
                    Some(expr) => self.eval_expr(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(v))
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval_expr(cond, scope)?.truthy() {
                    self.exec_block(then_branch, scope)
                } else if let Some(else_branch) = else_branch {
                    self.exec_block(else_branch, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { cond, body } => {
                while self.eval_expr(cond, scope)?.truthy() {
                    if let Flow::Return(v) = self.exec_block(body, scope)? {
                        return Ok(Flow::Return(v));
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Throw(expr) => {
                let value = self.eval_expr(expr, scope)?;
                Err(EvalError::Thrown(value))
            }
            Stmt::Block(body) => self.exec_block(body, scope),
        }
    }

    fn exec_block(&mut self, body: &[Stmt], scope: &ScopeRef) -> EvalResult<Flow> {
        let inner = Scope::child(scope.clone());
        self.hoist(body, &inner);
        for stmt in body {
            if let Flow::Return(v) = self.exec_stmt(stmt, &inner)? {
                return Ok(Flow::Return(v));
            }
        }
        Ok(Flow::Normal)
    }

    // -------------------------------------------------------------------
    // Expressions
    // -------------------------------------------------------------------

    fn eval_expr(&mut self, expr: &Expr, scope: &ScopeRef) -> EvalResult<Value> {
        match expr {
            Expr::Num(n) => Ok(Value::Num(*n)),
            Expr::Str(s) => Ok(Value::string(s)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::This => Ok(scope.this()),
            Expr::Ident(name) => scope
                .lookup(name)
                .ok_or_else(|| EvalError::UndefinedVariable(name.clone())),
            Expr::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval_expr(item, scope)?);
                }
                Ok(Value::array(out))
            }
            Expr::Object(props) => {
                let object = ObjectData::default();
                for (key, value_expr) in props {
                    let value = self.eval_expr(value_expr, scope)?;
                    object.props.borrow_mut().insert(key.clone(), value);
                }
                Ok(Value::Object(Rc::new(object)))
            }
            Expr::Function(lit) => Ok(self.make_closure(lit.clone(), scope)),
            Expr::Member { object, key } => {
                let obj = self.eval_expr(object, scope)?;
                let key = self.eval_member_key(key, scope)?;
                self.get_property(&obj, &key)
            }
            Expr::Call { callee, args } => {
                // Method calls bind the receiver.
                let (f, this) = match callee.as_ref() {
                    Expr::Member { object, key } => {
                        let obj = self.eval_expr(object, scope)?;
                        let key = self.eval_member_key(key, scope)?;
                        let f = self.get_property(&obj, &key)?;
                        (f, obj)
                    }
                    other => (self.eval_expr(other, scope)?, Value::Undefined),
                };
                let arg_values = self.eval_args(args, scope)?;
                self.call_value(&f, this, &arg_values)
            }
            Expr::New { callee, args } => {
                let f = self.eval_expr(callee, scope)?;
                let arg_values = self.eval_args(args, scope)?;
                self.construct_value(&f, &arg_values)
            }
            Expr::Unary { op, operand } => self.eval_unary(*op, operand, scope),
            Expr::Binary { op, lhs, rhs } => {
                let l = self.eval_expr(lhs, scope)?;
                let r = self.eval_expr(rhs, scope)?;
                Ok(eval_binary(*op, &l, &r))
            }
            Expr::Logical { op, lhs, rhs } => {
                let l = self.eval_expr(lhs, scope)?;
                match op {
                    LogicalOp::And => {
                        if l.truthy() {
                            self.eval_expr(rhs, scope)
                        } else {
                            Ok(l)
                        }
                    }
                    LogicalOp::Or => {
                        if l.truthy() {
                            Ok(l)
                        } else {
                            self.eval_expr(rhs, scope)
                        }
                    }
                }
            }
            Expr::Assign { target, value } => {
                let v = self.eval_expr(value, scope)?;
                match target.as_ref() {
                    AssignTarget::Ident(name) => {
                        if !scope.assign(name, v.clone()) {
                            return Err(EvalError::UndefinedVariable(name.clone()));
                        }
                    }
                    AssignTarget::Member { object, key } => {
                        let obj = self.eval_expr(object, scope)?;
                        let key = self.eval_member_key(key, scope)?;
                        self.set_property(&obj, &key, v.clone())?;
                    }
                }
                Ok(v)
            }
        }
    }

    fn eval_member_key(&mut self, key: &MemberKey, scope: &ScopeRef) -> EvalResult<PropKey> {
        match key {
            MemberKey::Static(name) => Ok(PropKey::Name(name.clone())),
            MemberKey::Computed(expr) => {
                let v = self.eval_expr(expr, scope)?;
                Ok(PropKey::from_value(&v))
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr], scope: &ScopeRef) -> EvalResult<Vec<Value>> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            out.push(self.eval_expr(arg, scope)?);
        }
        Ok(out)
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, scope: &ScopeRef) -> EvalResult<Value> {
        // `typeof missing` must not throw.
        if op == UnaryOp::TypeOf {
            if let Expr::Ident(name) = operand {
                return Ok(match scope.lookup(name) {
                    Some(v) => Value::string(v.type_of()),
                    None => Value::string("undefined"),
                });
            }
        }
        let v = self.eval_expr(operand, scope)?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!v.truthy()),
            UnaryOp::Neg => Value::Num(-v.to_number()),
            UnaryOp::TypeOf => Value::string(v.type_of()),
        })
    }

    fn make_closure(&mut self, lit: Rc<FunctionLiteral>, scope: &ScopeRef) -> Value {
        Value::Function(Rc::new(FunctionData {
            name: lit.name.clone(),
            builtin: false,
            kind: FunctionKind::Script {
                decl: lit,
                env: scope.clone(),
            },
        }))
    }
}

fn is_object_like(value: &Value) -> bool {
    matches!(
        value,
        Value::Object(_)
            | Value::Array(_)
            | Value::MapObj(_)
            | Value::SetObj(_)
            | Value::Error(_)
            | Value::Function(_)
            | Value::Proxy(_)
    )
}

fn eval_binary(op: BinaryOp, l: &Value, r: &Value) -> Value {
    use BinaryOp::*;
    match op {
        Add => {
            if matches!(l.unwrap_proxies(), Value::Str(_)) || matches!(r.unwrap_proxies(), Value::Str(_)) {
                Value::string(format!("{}{}", l, r))
            } else {
                Value::Num(l.to_number() + r.to_number())
            }
        }
        Sub => Value::Num(l.to_number() - r.to_number()),
        Mul => Value::Num(l.to_number() * r.to_number()),
        Div => Value::Num(l.to_number() / r.to_number()),
        Rem => Value::Num(l.to_number() % r.to_number()),
        LooseEq => Value::Bool(l.loose_eq(r)),
        LooseNe => Value::Bool(!l.loose_eq(r)),
        StrictEq => Value::Bool(l.strict_eq(r)),
        StrictNe => Value::Bool(!l.strict_eq(r)),
        Lt | Le | Gt | Ge => compare(op, l, r),
    }
}

fn compare(op: BinaryOp, l: &Value, r: &Value) -> Value {
    if let (Value::Str(a), Value::Str(b)) = (&l.unwrap_proxies(), &r.unwrap_proxies()) {
        let ord = a.as_ref().cmp(b.as_ref());
        return Value::Bool(match op {
            BinaryOp::Lt => ord.is_lt(),
            BinaryOp::Le => ord.is_le(),
            BinaryOp::Gt => ord.is_gt(),
            BinaryOp::Ge => ord.is_ge(),
            _ => unreachable!(),
        });
    }
    let (a, b) = (l.to_number(), r.to_number());
    if a.is_nan() || b.is_nan() {
        return Value::Bool(false);
    }
    Value::Bool(match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Le => a <= b,
        BinaryOp::Gt => a > b,
        BinaryOp::Ge => a >= b,
        _ => unreachable!(),
    })
}

// ---------------------------------------------------------------------------
// Globals and intrinsics
// ---------------------------------------------------------------------------

fn install_globals(globals: &ScopeRef) {
    let console = ObjectData::default();
    console.props.borrow_mut().insert(
        "log".to_string(),
        Value::builtin_fn("log", |_interp, _this, args| {
            let line: Vec<String> = args.iter().map(|a| a.to_string()).collect();
            println!("{}", line.join(" "));
            Ok(Value::Undefined)
        }),
    );
    globals.declare("console", Value::Object(Rc::new(console)));

    globals.declare(
        "Error",
        Value::builtin_fn("Error", |_interp, _this, args| {
            let message = args.first().map(|v| v.to_string()).unwrap_or_default();
            Ok(Value::error(message))
        }),
    );
    globals.declare(
        "Map",
        Value::builtin_fn("Map", |_interp, _this, _args| {
            Ok(Value::MapObj(Rc::new(RefCell::new(Vec::new()))))
        }),
    );
    globals.declare(
        "Set",
        Value::builtin_fn("Set", |_interp, _this, _args| {
            Ok(Value::SetObj(Rc::new(RefCell::new(Vec::new()))))
        }),
    );
    globals.declare(
        "Symbol",
        Value::builtin_fn("Symbol", |_interp, _this, args| {
            let description = args.first().map(|v| v.to_string()).unwrap_or_default();
            Ok(Value::Sym(Rc::new(Symbol { description })))
        }),
    );
    globals.declare("Infinity", Value::Num(f64::INFINITY));
    globals.declare("NaN", Value::Num(f64::NAN));
}

fn array_property(items: &Rc<RefCell<Vec<Value>>>, key: &PropKey) -> Value {
    let Some(name) = key.as_name() else {
        return Value::Undefined;
    };
    if name == "length" {
        return Value::Num(items.borrow().len() as f64);
    }
    if name == "push" {
        return Value::builtin_fn("push", |_interp, this, args| {
            let this = this.unwrap_proxies();
            if let Value::Array(items) = &this {
                items.borrow_mut().extend(args.iter().cloned());
                return Ok(Value::Num(items.borrow().len() as f64));
            }
            Err(EvalError::type_error("push called on non-array"))
        });
    }
    if let Ok(index) = name.parse::<usize>() {
        return items.borrow().get(index).cloned().unwrap_or(Value::Undefined);
    }
    Value::Undefined
}

fn string_property(s: &Rc<str>, key: &PropKey) -> Value {
    match key.as_name() {
        Some("length") => Value::Num(s.chars().count() as f64),
        Some("toUpperCase") => Value::builtin_fn("toUpperCase", |_interp, this, _args| {
            let this = this.unwrap_proxies();
            match this {
                Value::Str(s) => Ok(Value::string(s.to_uppercase())),
                other => Ok(Value::string(other.to_string().to_uppercase())),
            }
        }),
        _ => Value::Undefined,
    }
}

fn map_property(entries: &Rc<RefCell<Vec<(Value, Value)>>>, key: &PropKey) -> Value {
    match key.as_name() {
        Some("size") => Value::Num(entries.borrow().len() as f64),
        Some("get") => Value::builtin_fn("get", |_interp, this, args| {
            let key = args.first().cloned().unwrap_or(Value::Undefined);
            if let Value::MapObj(entries) = this.unwrap_proxies() {
                let found = entries
                    .borrow()
                    .iter()
                    .find(|(k, _)| k.strict_eq(&key))
                    .map(|(_, v)| v.clone());
                return Ok(found.unwrap_or(Value::Undefined));
            }
            Err(EvalError::type_error("get called on non-map"))
        }),
        Some("set") => Value::builtin_fn("set", |_interp, this, args| {
            let key = args.first().cloned().unwrap_or(Value::Undefined);
            let value = args.get(1).cloned().unwrap_or(Value::Undefined);
            let raw = this.unwrap_proxies();
            if let Value::MapObj(entries) = &raw {
                let mut entries = entries.borrow_mut();
                if let Some(slot) = entries.iter_mut().find(|(k, _)| k.strict_eq(&key)) {
                    slot.1 = value;
                } else {
                    entries.push((key, value));
                }
                drop(entries);
                return Ok(raw);
            }
            Err(EvalError::type_error("set called on non-map"))
        }),
        Some("has") => Value::builtin_fn("has", |_interp, this, args| {
            let key = args.first().cloned().unwrap_or(Value::Undefined);
            if let Value::MapObj(entries) = this.unwrap_proxies() {
                let found = entries.borrow().iter().any(|(k, _)| k.strict_eq(&key));
                return Ok(Value::Bool(found));
            }
            Err(EvalError::type_error("has called on non-map"))
        }),
        _ => Value::Undefined,
    }
}

fn set_property_intrinsic(items: &Rc<RefCell<Vec<Value>>>, key: &PropKey) -> Value {
    match key.as_name() {
        Some("size") => Value::Num(items.borrow().len() as f64),
        Some("add") => Value::builtin_fn("add", |_interp, this, args| {
            let value = args.first().cloned().unwrap_or(Value::Undefined);
            let raw = this.unwrap_proxies();
            if let Value::SetObj(items) = &raw {
                let mut items_mut = items.borrow_mut();
                if !items_mut.iter().any(|v| v.strict_eq(&value)) {
                    items_mut.push(value);
                }
                drop(items_mut);
                return Ok(raw);
            }
            Err(EvalError::type_error("add called on non-set"))
        }),
        Some("has") => Value::builtin_fn("has", |_interp, this, args| {
            let value = args.first().cloned().unwrap_or(Value::Undefined);
            if let Value::SetObj(items) = this.unwrap_proxies() {
                let found = items.borrow().iter().any(|v| v.strict_eq(&value));
                return Ok(Value::Bool(found));
            }
            Err(EvalError::type_error("has called on non-set"))
        }),
        _ => Value::Undefined,
    }
}
