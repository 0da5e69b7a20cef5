use std::fmt;

use crate::Result;
use crate::error::Position;
use crate::tpl::render_context::ExecutionContext;
use crate::tpl::writer::TemplateWriter;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
    In,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone)]
pub struct FilterCall {
    pub name: String,
    pub param: Option<Expr>,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Member(Box<Expr>, String),
    Subscript(Box<Expr>, Box<Expr>),
    Slice(Box<Expr>, Option<Box<Expr>>, Option<Box<Expr>>),
    Unary(UnaryOp, Box<Expr>),
    Binary(Op, Box<Expr>, Box<Expr>),
    Filtered(Box<Expr>, Vec<FilterCall>),
    Call {
        name: String,
        args: Vec<Expr>,
        pos: Position,
    },
}

/// A node produced by a registered tag parser.
pub trait TagNode: fmt::Debug + Send + Sync {
    fn execute(&self, ctx: &mut ExecutionContext<'_>, writer: &mut TemplateWriter<'_>) -> Result<()>;
}

#[derive(Debug)]
pub enum Node {
    /// Literal text, already trimmed according to neighbouring trim markers.
    Html(String),
    /// `{{ expr }}`
    Output { expr: Expr, pos: Position },
    Tag(Box<dyn TagNode>),
}

/// An ordered sequence of nodes: a document or a tag body.
pub type NodeList = Vec<Node>;
