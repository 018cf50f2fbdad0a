use thiserror::Error;

use crate::lexer::token::Token;

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token \"{}\"", .0.kind)]
    UnexpectedToken(Token),
    #[error("Unexpected EOF detected")]
    UnexpectedEOFDetected,
    #[error("Expected closing parenthesis")]
    ExpectedClosingParen(Token),
    #[error("Expected closing brace")]
    ExpectedClosingBrace(Token),
    #[error("Expected closing bracket")]
    ExpectedClosingBracket(Token),
    #[error("Expected an identifier, found \"{}\"", .0.kind)]
    ExpectedIdent(Token),
}
