use crate::ast::node::BinaryOp;
use crate::value::Value;

/// Failure modes shared by the evaluator and the constant folder. The
/// folder leaves any erroring expression alone so the error surfaces at
/// run time with a proper source range.
#[derive(Debug, PartialEq)]
pub(crate) enum OpError {
    InvalidTypes,
    ZeroDivision,
}

/// `Null` and `false` are falsey, everything else is truthy.
pub(crate) fn truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

/// Applies a binary operator to two already-evaluated operands.
///
/// Arithmetic is numeric only, except `+` which also concatenates
/// strings and arrays. Ordering comparisons cover numbers and strings.
/// Equality is structural over any pair of values. `&&`/`||` operate on
/// truthiness and always yield a `Bool`.
pub(crate) fn apply(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, OpError> {
    match (op, lhs, rhs) {
        (BinaryOp::Add, Value::Number(a), Value::Number(b)) => Ok(Value::Number(*a + *b)),
        (BinaryOp::Add, Value::String(a), Value::String(b)) => {
            Ok(Value::String(format!("{}{}", a, b)))
        }
        (BinaryOp::Add, Value::Array(a), Value::Array(b)) => {
            let mut merged = a.clone();
            merged.extend(b.iter().cloned());
            Ok(Value::Array(merged))
        }
        (BinaryOp::Sub, Value::Number(a), Value::Number(b)) => Ok(Value::Number(*a - *b)),
        (BinaryOp::Mul, Value::Number(a), Value::Number(b)) => Ok(Value::Number(*a * *b)),
        (BinaryOp::Div, Value::Number(a), Value::Number(b)) => {
            if b.is_zero() {
                Err(OpError::ZeroDivision)
            } else {
                Ok(Value::Number(*a / *b))
            }
        }
        (BinaryOp::Mod, Value::Number(a), Value::Number(b)) => {
            if b.is_zero() {
                Err(OpError::ZeroDivision)
            } else {
                Ok(Value::Number(*a % *b))
            }
        }
        (BinaryOp::Gt, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),
        (BinaryOp::Lt, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),
        (BinaryOp::Gte, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),
        (BinaryOp::Lte, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),
        (BinaryOp::Gt, Value::String(a), Value::String(b)) => Ok(Value::Bool(a > b)),
        (BinaryOp::Lt, Value::String(a), Value::String(b)) => Ok(Value::Bool(a < b)),
        (BinaryOp::Gte, Value::String(a), Value::String(b)) => Ok(Value::Bool(a >= b)),
        (BinaryOp::Lte, Value::String(a), Value::String(b)) => Ok(Value::Bool(a <= b)),
        (BinaryOp::Eq, a, b) => Ok(Value::Bool(a == b)),
        (BinaryOp::Ne, a, b) => Ok(Value::Bool(a != b)),
        (BinaryOp::And, a, b) => Ok(Value::Bool(truthy(a) && truthy(b))),
        (BinaryOp::Or, a, b) => Ok(Value::Bool(truthy(a) || truthy(b))),
        _ => Err(OpError::InvalidTypes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::Number;
    use rstest::rstest;

    fn num(n: f64) -> Value {
        Value::Number(Number::new(n))
    }

    fn s(v: &str) -> Value {
        Value::String(v.to_string())
    }

    #[rstest]
    #[case(BinaryOp::Add, num(10.0), num(20.0), num(30.0))]
    #[case(BinaryOp::Sub, num(10.0), num(4.0), num(6.0))]
    #[case(BinaryOp::Mul, num(3.0), num(4.0), num(12.0))]
    #[case(BinaryOp::Div, num(10.0), num(4.0), num(2.5))]
    #[case(BinaryOp::Mod, num(10.0), num(3.0), num(1.0))]
    #[case(BinaryOp::Add, s("a"), s("b"), s("ab"))]
    #[case(BinaryOp::Gt, num(2.0), num(1.0), Value::Bool(true))]
    #[case(BinaryOp::Lte, num(2.0), num(2.0), Value::Bool(true))]
    #[case(BinaryOp::Lt, s("a"), s("b"), Value::Bool(true))]
    #[case(BinaryOp::Eq, s("a"), s("a"), Value::Bool(true))]
    #[case(BinaryOp::Ne, num(1.0), s("1"), Value::Bool(true))]
    #[case(BinaryOp::Eq, Value::Null, Value::Null, Value::Bool(true))]
    #[case(BinaryOp::And, Value::Bool(true), Value::Null, Value::Bool(false))]
    #[case(BinaryOp::Or, Value::Bool(false), num(1.0), Value::Bool(true))]
    fn test_apply(
        #[case] op: BinaryOp,
        #[case] lhs: Value,
        #[case] rhs: Value,
        #[case] expected: Value,
    ) {
        assert_eq!(apply(op, &lhs, &rhs), Ok(expected));
    }

    #[rstest]
    #[case(BinaryOp::Div)]
    #[case(BinaryOp::Mod)]
    fn test_zero_division(#[case] op: BinaryOp) {
        assert_eq!(apply(op, &num(1.0), &num(0.0)), Err(OpError::ZeroDivision));
    }

    #[rstest]
    #[case(BinaryOp::Add, num(1.0), Value::Bool(true))]
    #[case(BinaryOp::Sub, s("a"), s("b"))]
    #[case(BinaryOp::Gt, num(1.0), s("a"))]
    fn test_invalid_types(#[case] op: BinaryOp, #[case] lhs: Value, #[case] rhs: Value) {
        assert_eq!(apply(op, &lhs, &rhs), Err(OpError::InvalidTypes));
    }

    #[test]
    fn test_array_concat() {
        assert_eq!(
            apply(
                BinaryOp::Add,
                &Value::Array(vec![num(1.0)]),
                &Value::Array(vec![num(2.0)])
            ),
            Ok(Value::Array(vec![num(1.0), num(2.0)]))
        );
    }

    #[test]
    fn test_truthiness() {
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&Value::Bool(false)));
        assert!(truthy(&num(0.0)));
        assert!(truthy(&s("")));
    }
}
