//! `aether-lang` is an embeddable execution engine for the Aether DSL.
//!
//! Programs are compiled (lexer, parser, optimizer) and cached by a
//! fingerprint of their source and optimization flags, then run by a
//! tree-walking evaluator under configurable step, recursion, and time
//! limits. Scripts can emit structured trace records into a ring
//! buffer, and IO builtins are disabled unless the engine is created
//! with permissions.
//!
//! ## Examples
//!
//! ```rust
//! use aether_lang::{Engine, Value};
//!
//! let engine = Engine::new();
//!
//! engine.set_global("BASE", Value::Number(100.into()));
//! let result = engine.eval("Set X 10\nSet Y 20\n((X + Y) + BASE)").unwrap();
//! assert_eq!(result, Value::Number(130.into()));
//!
//! // Parse code into AST nodes without evaluating.
//! let program = aether_lang::parse("Set X 10").unwrap();
//! assert_eq!(program.len(), 1);
//! ```
mod ast;
mod cache;
mod engine;
mod error;
mod eval;
mod lexer;
mod limits;
mod number;
mod optimizer;
mod range;
mod trace;
mod value;

use error::InnerError;
use lexer::Lexer;

pub use ast::IdentName as AstIdentName;
pub use ast::Params as AstParams;
pub use ast::Program;
pub use ast::node::Expr as AstExpr;
pub use ast::node::Ident as AstIdent;
pub use ast::node::Literal as AstLiteral;
pub use ast::node::Node as AstNode;
pub use ast::parser::Parser as AstParser;
pub use cache::CacheStats;
pub use engine::Engine;
pub use error::{Error, ErrorKind, LimitKind};
pub use lexer::token::{Token, TokenKind};
pub use limits::Limits;
pub use number::Number;
pub use optimizer::Optimization;
pub use range::{Position, Range};
pub use trace::{DEFAULT_TRACE_CAPACITY, TraceBuffer, TraceLevel, TraceRecord, TraceStats};
pub use value::Value;

#[allow(clippy::result_large_err)]
pub fn parse(code: &str) -> Result<Program, Error> {
    let tokens = tokenize(code)?;
    AstParser::new(tokens.iter())
        .parse()
        .map_err(|e| Error::from_error(code, InnerError::Parse(e)))
}

#[allow(clippy::result_large_err)]
pub fn tokenize(code: &str) -> Result<Vec<Token>, Error> {
    Lexer::new()
        .tokenize(code)
        .map_err(|e| Error::from_error(code, InnerError::Lexer(e)))
}
