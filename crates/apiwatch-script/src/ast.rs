//! Abstract syntax for the script subset.
//!
//! The grammar is a deliberately small slice of JavaScript: enough to
//! express every interaction class a client can have with a library
//! (reads, writes, calls, constructions, callbacks) without dragging in
//! the rest of the language.

use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct Program {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    /// `var`/`let`/`const` all behave as function-scoped bindings here.
    VarDecl {
        name: String,
        init: Option<Expr>,
    },
    FunctionDecl(Rc<FunctionLiteral>),
    Return(Option<Expr>),
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Throw(Expr),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Num(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    This,
    Ident(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Function(Rc<FunctionLiteral>),
    Member {
        object: Box<Expr>,
        key: MemberKey,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Assign {
        target: Box<AssignTarget>,
        value: Box<Expr>,
    },
}

/// Property position in a member expression.
#[derive(Debug, Clone)]
pub enum MemberKey {
    /// `obj.name`
    Static(String),
    /// `obj[expr]`
    Computed(Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum AssignTarget {
    Ident(String),
    Member { object: Expr, key: MemberKey },
}

#[derive(Debug, Clone)]
pub struct FunctionLiteral {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    /// Arrow functions take `this` from the enclosing scope.
    pub is_arrow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    LooseEq,
    LooseNe,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}
