use std::fmt::{self, Display, Formatter};

use smol_str::SmolStr;

use crate::number::Number;
use crate::range::Range;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub range: Range,
    pub kind: TokenKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    NumberLiteral(Number),
    StringLiteral(String),
    Ident(SmolStr),
    // Keywords
    Set,
    Func,
    Return,
    If,
    For,
    In,
    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    // Operators
    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,
    Gt,
    Lt,
    Gte,
    Lte,
    EqEq,
    NeEq,
    AndAnd,
    OrOr,
    Comment(String),
    NewLine,
    Eof,
}

impl TokenKind {
    pub fn is_binary_op(&self) -> bool {
        matches!(
            self,
            TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Asterisk
                | TokenKind::Slash
                | TokenKind::Percent
                | TokenKind::Gt
                | TokenKind::Lt
                | TokenKind::Gte
                | TokenKind::Lte
                | TokenKind::EqEq
                | TokenKind::NeEq
                | TokenKind::AndAnd
                | TokenKind::OrOr
        )
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::NumberLiteral(n) => write!(f, "{}", n),
            TokenKind::StringLiteral(s) => write!(f, "\"{}\"", s),
            TokenKind::Ident(name) => write!(f, "{}", name),
            TokenKind::Set => write!(f, "Set"),
            TokenKind::Func => write!(f, "Func"),
            TokenKind::Return => write!(f, "Return"),
            TokenKind::If => write!(f, "If"),
            TokenKind::For => write!(f, "For"),
            TokenKind::In => write!(f, "In"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::LBrace => write!(f, "{{"),
            TokenKind::RBrace => write!(f, "}}"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Asterisk => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::Gte => write!(f, ">="),
            TokenKind::Lte => write!(f, "<="),
            TokenKind::EqEq => write!(f, "=="),
            TokenKind::NeEq => write!(f, "!="),
            TokenKind::AndAnd => write!(f, "&&"),
            TokenKind::OrOr => write!(f, "||"),
            TokenKind::Comment(comment) => write!(f, "#{}", comment),
            TokenKind::NewLine => write!(f, "\\n"),
            TokenKind::Eof => write!(f, "EOF"),
        }
    }
}
