//! Syntax tree for the shell's script language.

use std::sync::Arc;

use super::source::{SourceId, Span};

/// A parsed piece of source text.
#[derive(Debug, Clone)]
pub struct Program {
    /// Identifies the text the spans in `body` point into.
    pub source: SourceId,
    /// Top-level statements in order.
    pub body: Vec<Stmt>,
}

/// A statement.
#[derive(Debug, Clone)]
pub enum Stmt {
    /// `var|let|const name [= init]`.
    Declare { name: String, init: Option<Expr> },
    /// `function name(params) { ... }`.
    Function(Arc<FunctionDef>),
    /// `if (cond) then [else otherwise]`.
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    /// `return [value]`, only valid inside a function body.
    Return(Option<Expr>),
    /// `{ ... }`.
    Block(Vec<Stmt>),
    /// An expression evaluated for its value or effect.
    Expr(Expr),
}

/// An expression with its source range.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

/// Expression variants.
#[derive(Debug, Clone)]
pub enum ExprKind {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    Ident(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Function(Arc<FunctionDef>),
    Member {
        object: Box<Expr>,
        property: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// The explicit suspension marker.
    Await(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
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

/// A function literal, arrow function or function declaration.
#[derive(Debug)]
pub struct FunctionDef {
    /// Declared name, if any.
    pub name: Option<String>,
    /// Parameter names.
    pub params: Vec<String>,
    /// Function body.
    pub body: FunctionBody,
    /// The exact text the function was written as.
    pub source_text: String,
    /// Where the function was written.
    pub span: Span,
}

/// Body of a function.
#[derive(Debug)]
pub enum FunctionBody {
    /// `{ ... }`
    Block(Vec<Stmt>),
    /// Concise arrow body `x => x + 1`.
    Expr(Box<Expr>),
}
