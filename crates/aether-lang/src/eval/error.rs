use thiserror::Error;

use crate::ast::IdentName;
use crate::number::Number;
use crate::range::Range;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum EvalError {
    #[error("\"{1}\" is not defined")]
    NotDefined(Range, IdentName),
    #[error("Invalid types for \"{op}\": {}", args.join(", "))]
    InvalidTypes {
        range: Range,
        op: String,
        args: Vec<String>,
    },
    #[error("Division by zero")]
    ZeroDivision(Range),
    #[error("Index {1} out of bounds")]
    IndexOutOfBounds(Range, Number),
    #[error("Invalid number of arguments in \"{1}\": expected {2}, got {3}")]
    InvalidNumberOfArguments(Range, IdentName, usize, usize),
    #[error("Permission denied for \"{1}\"")]
    PermissionDenied(Range, IdentName),
    #[error("Step limit exceeded ({0} steps)")]
    StepLimitExceeded(u64),
    #[error("Recursion limit exceeded (depth {0})")]
    RecursionLimitExceeded(u32),
    #[error("Time limit exceeded ({0} ms)")]
    TimeLimitExceeded(u64),
    #[error("IO error: {1}")]
    Io(Range, String),
    #[error("Internal evaluator error")]
    Internal(Range),
}

impl EvalError {
    pub fn range(&self) -> Option<Range> {
        match self {
            EvalError::NotDefined(range, _)
            | EvalError::InvalidTypes { range, .. }
            | EvalError::ZeroDivision(range)
            | EvalError::IndexOutOfBounds(range, _)
            | EvalError::InvalidNumberOfArguments(range, _, _, _)
            | EvalError::PermissionDenied(range, _)
            | EvalError::Io(range, _)
            | EvalError::Internal(range) => Some(*range),
            EvalError::StepLimitExceeded(_)
            | EvalError::RecursionLimitExceeded(_)
            | EvalError::TimeLimitExceeded(_) => None,
        }
    }
}
