use std::fs;

use crate::ast::node::Ident;
use crate::range::Range;
use crate::trace::{TraceBuffer, TraceLevel, TraceRecord};
use crate::value::Value;

use super::error::EvalError;

/// Host facilities a builtin may touch. IO builtins additionally check
/// the permission flag before doing anything.
pub(crate) struct BuiltinContext<'a> {
    pub trace: &'a mut TraceBuffer,
    pub permissive: bool,
}

pub(crate) fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        "TRACE" | "TRACE_DEBUG" | "TRACE_INFO" | "TRACE_WARN" | "LENGTH" | "READ_FILE"
            | "WRITE_FILE"
    )
}

pub(crate) fn call(
    ident: &Ident,
    args: &[Value],
    range: Range,
    ctx: &mut BuiltinContext<'_>,
) -> Result<Value, EvalError> {
    match ident.name.as_str() {
        "TRACE" => trace(ident, args, range, TraceLevel::Info, ctx),
        "TRACE_DEBUG" => trace(ident, args, range, TraceLevel::Debug, ctx),
        "TRACE_INFO" => trace(ident, args, range, TraceLevel::Info, ctx),
        "TRACE_WARN" => trace(ident, args, range, TraceLevel::Warn, ctx),
        "LENGTH" => length(ident, args, range),
        "READ_FILE" => read_file(ident, args, range, ctx),
        "WRITE_FILE" => write_file(ident, args, range, ctx),
        _ => Err(EvalError::NotDefined(range, ident.name.clone())),
    }
}

fn trace(
    ident: &Ident,
    args: &[Value],
    range: Range,
    level: TraceLevel,
    ctx: &mut BuiltinContext<'_>,
) -> Result<Value, EvalError> {
    let Some((category, values)) = args.split_first() else {
        return Err(EvalError::InvalidNumberOfArguments(
            range,
            ident.name.clone(),
            1,
            0,
        ));
    };

    let category = match category {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    ctx.trace.append(TraceRecord::new(
        level,
        category,
        values.iter().map(render_value).collect(),
        None,
    ));

    Ok(Value::Null)
}

/// Trace values keep a visible form for every type, unlike `Display`
/// where `Null` renders empty.
fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

fn length(ident: &Ident, args: &[Value], range: Range) -> Result<Value, EvalError> {
    let [value] = args else {
        return Err(EvalError::InvalidNumberOfArguments(
            range,
            ident.name.clone(),
            1,
            args.len(),
        ));
    };

    let len = match value {
        Value::Array(values) => values.len(),
        Value::Object(entries) => entries.len(),
        Value::String(s) => s.chars().count(),
        other => {
            return Err(EvalError::InvalidTypes {
                range,
                op: ident.to_string(),
                args: vec![other.type_name().to_string()],
            });
        }
    };

    Ok(Value::Number(len.into()))
}

fn read_file(
    ident: &Ident,
    args: &[Value],
    range: Range,
    ctx: &mut BuiltinContext<'_>,
) -> Result<Value, EvalError> {
    if !ctx.permissive {
        return Err(EvalError::PermissionDenied(range, ident.name.clone()));
    }

    let [Value::String(path)] = args else {
        return Err(invalid_args(ident, args, range, 1));
    };

    fs::read_to_string(path)
        .map(Value::String)
        .map_err(|e| EvalError::Io(range, e.to_string()))
}

fn write_file(
    ident: &Ident,
    args: &[Value],
    range: Range,
    ctx: &mut BuiltinContext<'_>,
) -> Result<Value, EvalError> {
    if !ctx.permissive {
        return Err(EvalError::PermissionDenied(range, ident.name.clone()));
    }

    let [Value::String(path), content] = args else {
        return Err(invalid_args(ident, args, range, 2));
    };

    fs::write(path, content.to_string()).map_err(|e| EvalError::Io(range, e.to_string()))?;
    Ok(Value::Null)
}

fn invalid_args(ident: &Ident, args: &[Value], range: Range, expected: usize) -> EvalError {
    if args.len() == expected {
        EvalError::InvalidTypes {
            range,
            op: ident.to_string(),
            args: args.iter().map(|a| a.type_name().to_string()).collect(),
        }
    } else {
        EvalError::InvalidNumberOfArguments(range, ident.name.clone(), expected, args.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::Number;

    fn ident(name: &str) -> Ident {
        Ident::new(name)
    }

    fn ctx(trace: &mut TraceBuffer, permissive: bool) -> BuiltinContext<'_> {
        BuiltinContext { trace, permissive }
    }

    #[test]
    fn test_trace_appends_record() {
        let mut buffer = TraceBuffer::default();
        let result = call(
            &ident("TRACE_WARN"),
            &[
                Value::String("auth".to_string()),
                Value::String("denied".to_string()),
                Value::Number(Number::from(42)),
            ],
            Range::default(),
            &mut ctx(&mut buffer, false),
        );

        assert_eq!(result, Ok(Value::Null));
        let records = buffer.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, TraceLevel::Warn);
        assert_eq!(records[0].category, "auth");
        assert_eq!(records[0].values, vec!["denied".to_string(), "42".to_string()]);
    }

    #[test]
    fn test_trace_requires_category() {
        let mut buffer = TraceBuffer::default();
        let result = call(
            &ident("TRACE"),
            &[],
            Range::default(),
            &mut ctx(&mut buffer, false),
        );

        assert!(matches!(
            result,
            Err(EvalError::InvalidNumberOfArguments(_, _, 1, 0))
        ));
    }

    #[test]
    fn test_length() {
        let mut buffer = TraceBuffer::default();
        let array = Value::Array(vec![Value::Null, Value::Null, Value::Null]);

        assert_eq!(
            call(
                &ident("LENGTH"),
                &[array],
                Range::default(),
                &mut ctx(&mut buffer, false)
            ),
            Ok(Value::Number(Number::from(3)))
        );
        assert_eq!(
            call(
                &ident("LENGTH"),
                &[Value::String("héllo".to_string())],
                Range::default(),
                &mut ctx(&mut buffer, false)
            ),
            Ok(Value::Number(Number::from(5)))
        );
    }

    #[test]
    fn test_length_rejects_number() {
        let mut buffer = TraceBuffer::default();
        let result = call(
            &ident("LENGTH"),
            &[Value::Number(Number::from(1))],
            Range::default(),
            &mut ctx(&mut buffer, false),
        );

        assert!(matches!(result, Err(EvalError::InvalidTypes { .. })));
    }

    #[test]
    fn test_io_denied_without_permission() {
        let mut buffer = TraceBuffer::default();
        let result = call(
            &ident("READ_FILE"),
            &[Value::String("/tmp/anything".to_string())],
            Range::default(),
            &mut ctx(&mut buffer, false),
        );

        assert!(matches!(result, Err(EvalError::PermissionDenied(_, _))));
    }

    #[test]
    fn test_io_roundtrip_with_permission() {
        let mut buffer = TraceBuffer::default();
        let dir = std::env::temp_dir().join("aether-builtin-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("io.txt");
        let path_value = Value::String(path.to_string_lossy().to_string());

        let written = call(
            &ident("WRITE_FILE"),
            &[path_value.clone(), Value::String("hello".to_string())],
            Range::default(),
            &mut ctx(&mut buffer, true),
        );
        assert_eq!(written, Ok(Value::Null));

        let read = call(
            &ident("READ_FILE"),
            &[path_value],
            Range::default(),
            &mut ctx(&mut buffer, true),
        );
        assert_eq!(read, Ok(Value::String("hello".to_string())));

        std::fs::remove_dir_all(&dir).ok();
    }
}
