use miette::{Diagnostic, SourceOffset, SourceSpan};

use crate::{
    ast::error::ParseError, eval::error::EvalError, lexer::error::LexerError, range::Range,
};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InnerError {
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Steps,
    Recursion,
    Time,
}

/// Coarse classification of an error, for hosts that branch on failure
/// mode rather than on the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    TypeMismatch,
    UndefinedReference,
    PermissionDenied,
    ResourceExceeded(LimitKind),
    Io,
    Internal,
}

/// Represents a high-level error with diagnostic information for the user.
#[derive(PartialEq, Debug, thiserror::Error)]
#[error("{cause}")]
pub struct Error {
    /// The underlying cause of the error.
    pub cause: InnerError,
    /// The source code related to the error.
    pub source_code: String,
    /// The location in the source code for diagnostics.
    pub location: SourceSpan,
}

impl Error {
    pub fn from_error(source_code: impl Into<String>, cause: InnerError) -> Self {
        let source_code = source_code.into();
        let range = match &cause {
            InnerError::Lexer(LexerError::UnexpectedToken(token)) => Some(token.range),
            InnerError::Lexer(LexerError::UnexpectedEOFDetected) => None,
            InnerError::Parse(err) => match err {
                ParseError::UnexpectedToken(token)
                | ParseError::ExpectedClosingParen(token)
                | ParseError::ExpectedClosingBrace(token)
                | ParseError::ExpectedClosingBracket(token)
                | ParseError::ExpectedIdent(token) => Some(token.range),
                ParseError::UnexpectedEOFDetected => None,
            },
            InnerError::Eval(err) => err.range(),
        };

        let location = match range {
            Some(range) => span_for_range(&source_code, range),
            None if is_eof(&cause) => {
                let lines = source_code.lines();
                let loc_line = lines.clone().count().saturating_sub(1);
                let loc_col = lines.last().map(|line| line.len()).unwrap_or(0);
                SourceSpan::new(SourceOffset::from_location(&source_code, loc_line, loc_col), 1)
            }
            None => SourceSpan::new(SourceOffset::from_location(&source_code, 0, 0), 1),
        };

        Self {
            cause,
            source_code,
            location,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match &self.cause {
            InnerError::Lexer(_) | InnerError::Parse(_) => ErrorKind::Syntax,
            InnerError::Eval(err) => match err {
                EvalError::NotDefined(_, _) => ErrorKind::UndefinedReference,
                EvalError::InvalidTypes { .. }
                | EvalError::ZeroDivision(_)
                | EvalError::IndexOutOfBounds(_, _)
                | EvalError::InvalidNumberOfArguments(_, _, _, _) => ErrorKind::TypeMismatch,
                EvalError::PermissionDenied(_, _) => ErrorKind::PermissionDenied,
                EvalError::StepLimitExceeded(_) => ErrorKind::ResourceExceeded(LimitKind::Steps),
                EvalError::RecursionLimitExceeded(_) => {
                    ErrorKind::ResourceExceeded(LimitKind::Recursion)
                }
                EvalError::TimeLimitExceeded(_) => ErrorKind::ResourceExceeded(LimitKind::Time),
                EvalError::Io(_, _) => ErrorKind::Io,
                EvalError::Internal(_) => ErrorKind::Internal,
            },
        }
    }
}

fn is_eof(cause: &InnerError) -> bool {
    matches!(
        cause,
        InnerError::Lexer(LexerError::UnexpectedEOFDetected)
            | InnerError::Parse(ParseError::UnexpectedEOFDetected)
    )
}

fn span_for_range(source_code: &str, range: Range) -> SourceSpan {
    let start = SourceOffset::from_location(
        source_code,
        range.start.line as usize,
        range.start.column,
    );
    let end = SourceOffset::from_location(source_code, range.end.line as usize, range.end.column);

    SourceSpan::new(
        start,
        std::cmp::max(end.offset().saturating_sub(start.offset()), 1),
    )
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let c = match &self.cause {
            InnerError::Lexer(LexerError::UnexpectedToken(_)) => "LexerError::UnexpectedToken",
            InnerError::Lexer(LexerError::UnexpectedEOFDetected) => {
                "LexerError::UnexpectedEOFDetected"
            }
            InnerError::Parse(ParseError::UnexpectedToken(_)) => "ParseError::UnexpectedToken",
            InnerError::Parse(ParseError::UnexpectedEOFDetected) => {
                "ParseError::UnexpectedEOFDetected"
            }
            InnerError::Parse(ParseError::ExpectedClosingParen(_)) => {
                "ParseError::ExpectedClosingParen"
            }
            InnerError::Parse(ParseError::ExpectedClosingBrace(_)) => {
                "ParseError::ExpectedClosingBrace"
            }
            InnerError::Parse(ParseError::ExpectedClosingBracket(_)) => {
                "ParseError::ExpectedClosingBracket"
            }
            InnerError::Parse(ParseError::ExpectedIdent(_)) => "ParseError::ExpectedIdent",
            InnerError::Eval(EvalError::NotDefined(_, _)) => "EvalError::NotDefined",
            InnerError::Eval(EvalError::InvalidTypes { .. }) => "EvalError::InvalidTypes",
            InnerError::Eval(EvalError::ZeroDivision(_)) => "EvalError::ZeroDivision",
            InnerError::Eval(EvalError::IndexOutOfBounds(_, _)) => "EvalError::IndexOutOfBounds",
            InnerError::Eval(EvalError::InvalidNumberOfArguments(_, _, _, _)) => {
                "EvalError::InvalidNumberOfArguments"
            }
            InnerError::Eval(EvalError::PermissionDenied(_, _)) => "EvalError::PermissionDenied",
            InnerError::Eval(EvalError::StepLimitExceeded(_)) => "EvalError::StepLimitExceeded",
            InnerError::Eval(EvalError::RecursionLimitExceeded(_)) => {
                "EvalError::RecursionLimitExceeded"
            }
            InnerError::Eval(EvalError::TimeLimitExceeded(_)) => "EvalError::TimeLimitExceeded",
            InnerError::Eval(EvalError::Io(_, _)) => "EvalError::Io",
            InnerError::Eval(EvalError::Internal(_)) => "EvalError::Internal",
        };

        Some(Box::new(c))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let msg = match &self.cause {
            InnerError::Lexer(LexerError::UnexpectedToken(_)) => {
                Some("Check for unexpected or misplaced tokens in your input.".to_string())
            }
            InnerError::Lexer(LexerError::UnexpectedEOFDetected) => {
                Some("Input ended unexpectedly. Make sure all expressions are complete.".to_string())
            }
            InnerError::Parse(ParseError::UnexpectedToken(_)) => {
                Some("Check for syntax errors or misplaced tokens.".to_string())
            }
            InnerError::Parse(ParseError::UnexpectedEOFDetected) => Some(
                "Input ended unexpectedly. Check for missing closing brackets or incomplete expressions."
                    .to_string(),
            ),
            InnerError::Parse(ParseError::ExpectedClosingParen(_)) => {
                Some("Binary expressions must be fully parenthesized, e.g. ((A + B) + C).".to_string())
            }
            InnerError::Parse(ParseError::ExpectedClosingBrace(_)) => {
                Some("Check for a missing '}' closing this block.".to_string())
            }
            InnerError::Parse(ParseError::ExpectedClosingBracket(_)) => {
                Some("Check for a missing ']' closing this array or index.".to_string())
            }
            InnerError::Parse(ParseError::ExpectedIdent(_)) => {
                Some("An identifier was expected here.".to_string())
            }
            InnerError::Eval(EvalError::NotDefined(_, name)) => {
                Some(format!("'{name}' is not defined. Did you forget to declare it?"))
            }
            InnerError::Eval(EvalError::InvalidTypes { .. }) => {
                Some("Type mismatch. Check the types of your operands.".to_string())
            }
            InnerError::Eval(EvalError::ZeroDivision(_)) => {
                Some("Division by zero is not allowed.".to_string())
            }
            InnerError::Eval(EvalError::IndexOutOfBounds(_, _)) => {
                Some("Index out of bounds. Check your array indices.".to_string())
            }
            InnerError::Eval(EvalError::InvalidNumberOfArguments(_, _, expected, actual)) => {
                Some(format!(
                    "Invalid number of arguments: expected {expected}, got {actual}."
                ))
            }
            InnerError::Eval(EvalError::PermissionDenied(_, name)) => Some(format!(
                "'{name}' requires IO permissions. Construct the engine with permissions enabled."
            )),
            InnerError::Eval(EvalError::StepLimitExceeded(_)) => {
                Some("Execution exceeded the configured step limit.".to_string())
            }
            InnerError::Eval(EvalError::RecursionLimitExceeded(_)) => {
                Some("Execution exceeded the configured recursion depth.".to_string())
            }
            InnerError::Eval(EvalError::TimeLimitExceeded(_)) => {
                Some("Execution exceeded the configured time limit.".to_string())
            }
            InnerError::Eval(EvalError::Io(_, _)) => {
                Some("An IO error occurred. Check file paths and permissions.".to_string())
            }
            InnerError::Eval(EvalError::Internal(_)) => {
                Some("An internal error occurred. Please report this if it persists.".to_string())
            }
        };

        msg.map(|m| Box::new(m) as Box<dyn std::fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(
            miette::LabeledSpan::new_with_span(Some(format!("{}", self.cause)), self.location),
        )))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_code)
    }
}
