//! Script engine error types.
//!
//! Parse errors carry source position; evaluation errors fold host-level
//! failures and script-level `throw` into one enum so embedders can treat
//! a throwing script uniformly.

use thiserror::Error;

use crate::value::Value;

/// A syntax error with 1-based line/column into the source file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("syntax error at {line}:{column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

/// Runtime failure during evaluation.
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    #[error("type error: {0}")]
    Type(String),

    #[error("{0} is not defined")]
    UndefinedVariable(String),

    /// A script-level `throw`. The payload is the thrown value.
    #[error("uncaught exception: {0}")]
    Thrown(Value),

    #[error("call depth limit exceeded")]
    RecursionLimit,
}

impl EvalError {
    pub fn type_error(message: impl Into<String>) -> Self {
        EvalError::Type(message.into())
    }
}

pub type EvalResult<T> = Result<T, EvalError>;
