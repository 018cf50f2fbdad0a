use std::{
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
    sync::Arc,
};

use smallvec::SmallVec;

use crate::{lexer::token::TokenKind, number::Number, range::Range};

use super::{IdentName, Params, Program};

pub type Args = SmallVec<[Arc<Node>; 4]>;

#[derive(PartialEq, Debug, Clone)]
pub struct Node {
    pub range: Range,
    pub expr: Arc<Expr>,
}

impl Node {
    pub fn new(range: Range, expr: Expr) -> Arc<Self> {
        Arc::new(Self {
            range,
            expr: Arc::new(expr),
        })
    }
}

#[derive(PartialEq, Debug, Eq, Clone)]
pub struct Ident {
    pub name: IdentName,
    pub range: Range,
}

impl Ident {
    pub fn new(name: &str) -> Self {
        Self {
            name: IdentName::new(name),
            range: Range::default(),
        }
    }

    pub fn new_with_range(name: &str, range: Range) -> Self {
        Self {
            name: IdentName::new(name),
            range,
        }
    }
}

impl Hash for Ident {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl Display for Ident {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.name)
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum Literal {
    None,
    Bool(bool),
    Number(Number),
    String(String),
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn from_token_kind(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            TokenKind::Asterisk => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::Percent => Some(BinaryOp::Mod),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::Gte => Some(BinaryOp::Gte),
            TokenKind::Lte => Some(BinaryOp::Lte),
            TokenKind::EqEq => Some(BinaryOp::Eq),
            TokenKind::NeEq => Some(BinaryOp::Ne),
            TokenKind::AndAnd => Some(BinaryOp::And),
            TokenKind::OrOr => Some(BinaryOp::Or),
            _ => None,
        }
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let op = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Gt => ">",
            BinaryOp::Lt => "<",
            BinaryOp::Gte => ">=",
            BinaryOp::Lte => "<=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        write!(f, "{}", op)
    }
}

/// Statement and expression variants of the AST.
///
/// Immutable once constructed; the optimizer produces rewritten copies
/// before a program is placed in the compilation cache. The `bool` on
/// `Call` is the tail-call marker left by the optimizer.
#[derive(PartialEq, Debug, Clone)]
pub enum Expr {
    Literal(Literal),
    Ident(Ident),
    Binary(BinaryOp, Arc<Node>, Arc<Node>),
    Index(Arc<Node>, Arc<Node>),
    Call(Ident, Args, bool),
    Array(Vec<Arc<Node>>),
    Object(Vec<(String, Arc<Node>)>),
    Set(Ident, Arc<Node>),
    Func(Ident, Params, Program),
    Return(Arc<Node>),
    If(Arc<Node>, Program),
    For(Ident, Arc<Node>, Program),
}

impl Expr {
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            Expr::Set(_, _)
                | Expr::Func(_, _, _)
                | Expr::Return(_)
                | Expr::If(_, _)
                | Expr::For(_, _, _)
        )
    }
}
