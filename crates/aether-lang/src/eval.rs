pub(crate) mod builtin;
pub(crate) mod env;
pub mod error;
pub(crate) mod ops;

use std::sync::Arc;

use crate::ast::Program;
use crate::ast::node::{Expr, Ident, Literal, Node};
use crate::limits::Governor;
use crate::range::Range;
use crate::trace::TraceBuffer;
use crate::value::Value;

use env::{Binding, Env, FuncDef, SharedEnv};
use error::EvalError;

/// Control flow threaded through block evaluation.
///
/// `TailCall` only surfaces from a `Return` whose call the optimizer
/// marked as a tail-position self-call. It is caught by the enclosing
/// call frame, which rebinds the parameters and iterates instead of
/// recursing. The callee ident travels with the evaluated arguments:
/// the marker is a static guess, and the name may have been rebound by
/// the time the call runs.
enum Ctrl {
    Value(Value),
    Return(Value),
    TailCall(Ident, Vec<Value>, Range),
}

pub(crate) struct Evaluator<'a> {
    env: SharedEnv,
    governor: Governor,
    trace: &'a mut TraceBuffer,
    permissive: bool,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(
        env: SharedEnv,
        governor: Governor,
        trace: &'a mut TraceBuffer,
        permissive: bool,
    ) -> Self {
        Self {
            env,
            governor,
            trace,
            permissive,
        }
    }

    /// Runs a program against the global environment. The result is the
    /// value of the last statement, or the operand of a top-level
    /// `Return`, or `Null` for an empty program.
    pub(crate) fn eval_program(&mut self, program: &Program) -> Result<Value, EvalError> {
        let env = Arc::clone(&self.env);
        match self.eval_block(program, &env)? {
            Ctrl::Value(value) | Ctrl::Return(value) => Ok(value),
            Ctrl::TailCall(_, _, _) => Err(EvalError::Internal(Range::default())),
        }
    }

    fn eval_block(&mut self, program: &Program, env: &SharedEnv) -> Result<Ctrl, EvalError> {
        let mut last = Value::Null;

        for node in program {
            match self.eval_node(node, env)? {
                Ctrl::Value(value) => last = value,
                ctrl => return Ok(ctrl),
            }
        }

        Ok(Ctrl::Value(last))
    }

    fn eval_node(&mut self, node: &Arc<Node>, env: &SharedEnv) -> Result<Ctrl, EvalError> {
        self.governor.step()?;

        match &*node.expr {
            Expr::Literal(literal) => Ok(Ctrl::Value(literal_value(literal))),
            Expr::Ident(ident) => match env::resolve(env, &ident.name) {
                Some(Binding::Value(value)) => Ok(Ctrl::Value(value)),
                Some(Binding::Function(_)) => Err(EvalError::InvalidTypes {
                    range: node.range,
                    op: ident.to_string(),
                    args: vec!["function".to_string()],
                }),
                None => Err(EvalError::NotDefined(node.range, ident.name.clone())),
            },
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval_value(lhs, env)?;
                let rhs = self.eval_value(rhs, env)?;
                ops::apply(*op, &lhs, &rhs).map(Ctrl::Value).map_err(|e| match e {
                    ops::OpError::ZeroDivision => EvalError::ZeroDivision(node.range),
                    ops::OpError::InvalidTypes => EvalError::InvalidTypes {
                        range: node.range,
                        op: op.to_string(),
                        args: vec![
                            lhs.type_name().to_string(),
                            rhs.type_name().to_string(),
                        ],
                    },
                })
            }
            Expr::Index(target, index) => {
                let target = self.eval_value(target, env)?;
                let index = self.eval_value(index, env)?;
                self.eval_index(&target, &index, node.range).map(Ctrl::Value)
            }
            Expr::Call(ident, args, tail) => {
                debug_assert!(!tail, "tail markers only appear under Return");
                self.eval_call(ident, args, node.range, env)
            }
            Expr::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval_value(element, env)?);
                }
                Ok(Ctrl::Value(Value::Array(values)))
            }
            Expr::Object(entries) => {
                let mut object = std::collections::BTreeMap::new();
                for (key, value) in entries {
                    object.insert(key.clone(), self.eval_value(value, env)?);
                }
                Ok(Ctrl::Value(Value::Object(object)))
            }
            Expr::Set(ident, value) => {
                let value = self.eval_value(value, env)?;
                env::assign(env, &ident.name, value);
                Ok(Ctrl::Value(Value::Null))
            }
            Expr::Func(ident, params, body) => {
                env.write().unwrap().define(
                    ident.name.clone(),
                    Binding::Function(Arc::new(FuncDef {
                        name: ident.name.clone(),
                        params: params.clone(),
                        body: body.clone(),
                    })),
                );
                Ok(Ctrl::Value(Value::Null))
            }
            Expr::Return(inner) => {
                if let Expr::Call(ident, args, true) = &*inner.expr {
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args.iter() {
                        values.push(self.eval_value(arg, env)?);
                    }
                    return Ok(Ctrl::TailCall(ident.clone(), values, inner.range));
                }

                let value = self.eval_value(inner, env)?;
                Ok(Ctrl::Return(value))
            }
            Expr::If(cond, body) => {
                let cond = self.eval_value(cond, env)?;
                if ops::truthy(&cond) {
                    match self.eval_block(body, env)? {
                        Ctrl::Value(_) => Ok(Ctrl::Value(Value::Null)),
                        ctrl => Ok(ctrl),
                    }
                } else {
                    Ok(Ctrl::Value(Value::Null))
                }
            }
            Expr::For(binding, collection, body) => {
                let collection = self.eval_value(collection, env)?;
                let items: Vec<Value> = match collection {
                    Value::Array(values) => values,
                    Value::Object(entries) => {
                        entries.keys().cloned().map(Value::String).collect()
                    }
                    other => {
                        return Err(EvalError::InvalidTypes {
                            range: node.range,
                            op: "For".to_string(),
                            args: vec![other.type_name().to_string()],
                        });
                    }
                };

                for item in items {
                    env.write()
                        .unwrap()
                        .define(binding.name.clone(), Binding::Value(item));

                    match self.eval_block(body, env)? {
                        Ctrl::Value(_) => {}
                        ctrl => return Ok(ctrl),
                    }
                }

                Ok(Ctrl::Value(Value::Null))
            }
        }
    }

    /// Evaluates a node in expression position. The parser guarantees
    /// statements never appear here, so control flow other than a plain
    /// value indicates an evaluator bug.
    fn eval_value(&mut self, node: &Arc<Node>, env: &SharedEnv) -> Result<Value, EvalError> {
        match self.eval_node(node, env)? {
            Ctrl::Value(value) => Ok(value),
            _ => Err(EvalError::Internal(node.range)),
        }
    }

    fn eval_index(&self, target: &Value, index: &Value, range: Range) -> Result<Value, EvalError> {
        match (target, index) {
            (Value::Array(values), Value::Number(n)) => {
                let i = n.to_int();
                if !n.is_int() || i < 0 || i as usize >= values.len() {
                    return Err(EvalError::IndexOutOfBounds(range, *n));
                }
                Ok(values[i as usize].clone())
            }
            (Value::Object(entries), Value::String(key)) => {
                Ok(entries.get(key).cloned().unwrap_or(Value::Null))
            }
            (target, index) => Err(EvalError::InvalidTypes {
                range,
                op: "[]".to_string(),
                args: vec![
                    target.type_name().to_string(),
                    index.type_name().to_string(),
                ],
            }),
        }
    }

    fn eval_call(
        &mut self,
        ident: &Ident,
        args: &crate::ast::node::Args,
        range: Range,
        env: &SharedEnv,
    ) -> Result<Ctrl, EvalError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args.iter() {
            values.push(self.eval_value(arg, env)?);
        }

        self.dispatch_call(ident, values, range, env).map(Ctrl::Value)
    }

    fn dispatch_call(
        &mut self,
        ident: &Ident,
        values: Vec<Value>,
        range: Range,
        env: &SharedEnv,
    ) -> Result<Value, EvalError> {
        match env::resolve(env, &ident.name) {
            Some(Binding::Function(def)) => self.call_function(&def, values, range),
            Some(Binding::Value(_)) => Err(EvalError::InvalidTypes {
                range,
                op: ident.to_string(),
                args: vec!["value is not callable".to_string()],
            }),
            None if builtin::is_builtin(&ident.name) => {
                let mut ctx = builtin::BuiltinContext {
                    trace: &mut *self.trace,
                    permissive: self.permissive,
                };
                builtin::call(ident, &values, range, &mut ctx)
            }
            None => Err(EvalError::NotDefined(range, ident.name.clone())),
        }
    }

    /// Runs a user-defined function. Tail-marked self-calls loop here,
    /// rebinding the parameters in a fresh scope without growing the
    /// recursion depth. Looping is only safe when the name still
    /// resolves to the executing definition; a body can rebind it (a
    /// nested `Func`, a `Set`, a parameter of the same name), in which
    /// case the call is dispatched normally instead.
    fn call_function(
        &mut self,
        def: &FuncDef,
        mut args: Vec<Value>,
        range: Range,
    ) -> Result<Value, EvalError> {
        if args.len() != def.params.len() {
            return Err(EvalError::InvalidNumberOfArguments(
                range,
                def.name.clone(),
                def.params.len(),
                args.len(),
            ));
        }

        self.governor.enter_call()?;

        let result = loop {
            let scope = Env::with_parent(Arc::clone(&self.env));
            {
                let mut guard = scope.write().unwrap();
                for (param, value) in def.params.iter().zip(args.drain(..)) {
                    guard.define(param.name.clone(), Binding::Value(value));
                }
            }

            match self.eval_block(&def.body, &scope) {
                Ok(Ctrl::TailCall(ident, next_args, call_range)) => {
                    let same_def = matches!(
                        env::resolve(&scope, &ident.name),
                        Some(Binding::Function(resolved))
                            if std::ptr::eq(Arc::as_ptr(&resolved), def)
                    );
                    if same_def {
                        args = next_args;
                    } else {
                        break self.dispatch_call(&ident, next_args, call_range, &scope);
                    }
                }
                Ok(Ctrl::Return(value)) => break Ok(value),
                Ok(Ctrl::Value(_)) => break Ok(Value::Null),
                Err(e) => break Err(e),
            }
        };

        self.governor.exit_call();
        result
    }
}

pub(crate) fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::None => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Number(n) => Value::Number(*n),
        Literal::String(s) => Value::String(s.clone()),
    }
}
