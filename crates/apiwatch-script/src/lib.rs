//! apiwatch script runtime
//!
//! A small embedded dynamic-language engine: the substrate apiwatch
//! traces and replays against. The language is a JavaScript subset —
//! just enough surface to express every interaction class a client
//! program can have with a library (property reads and writes, calls,
//! constructions, callbacks).
//!
//! # Core pieces
//!
//! - [`parser::parse`]: source text → [`ast::Program`]
//! - [`interp::Interpreter`]: tree-walking evaluator
//! - [`value::Value`]: the dynamic value union
//! - [`value::Mediator`]: the interposition seam — a proxy value routes
//!   its property reads/writes, calls, and constructions to a mediator,
//!   which is how the tracer and the replay synthesizer hook in
//!
//! # Example
//!
//! ```
//! use apiwatch_script::interp::{Interpreter, Scope};
//! use apiwatch_script::parser::parse;
//!
//! let mut interp = Interpreter::new();
//! let scope = Scope::child(interp.globals().clone());
//! let program = parse("var x = 1 + 2;").unwrap();
//! interp.run_program(&program, &scope).unwrap();
//! ```

pub mod ast;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod value;

pub use error::{EvalError, EvalResult, ParseError};
pub use interp::{Interpreter, Scope, ScopeRef};
pub use parser::parse;
pub use value::{Mediator, PropKey, Value};
