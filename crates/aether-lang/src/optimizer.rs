use std::sync::Arc;

use crate::ast::node::{Expr, Literal, Node};
use crate::ast::{IdentName, Program};
use crate::eval::{literal_value, ops};
use crate::value::Value;

/// Per-engine optimization flags. Part of the compilation cache key, so
/// toggling a flag never reuses a program compiled under different
/// settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Optimization {
    pub constant_folding: bool,
    pub dead_code: bool,
    pub tail_recursion: bool,
}

impl Default for Optimization {
    fn default() -> Self {
        Self {
            constant_folding: true,
            dead_code: true,
            tail_recursion: true,
        }
    }
}

impl Optimization {
    pub(crate) fn cache_key_byte(&self) -> u8 {
        (self.constant_folding as u8)
            | (self.dead_code as u8) << 1
            | (self.tail_recursion as u8) << 2
    }
}

/// Rewrites a parsed program according to the enabled flags. Passes run
/// in a fixed order: folding, then dead code, then tail marking.
pub(crate) struct Optimizer {
    options: Optimization,
}

impl Optimizer {
    pub(crate) fn new(options: Optimization) -> Self {
        Self { options }
    }

    pub(crate) fn optimize(&self, program: &Program) -> Program {
        let mut program = program.clone();

        if self.options.constant_folding {
            program = program.iter().map(fold_node).collect();
        }
        if self.options.dead_code {
            program = eliminate_in_block(&program, true);
        }
        if self.options.tail_recursion {
            program = program.iter().map(mark_node).collect();
        }

        program
    }
}

/// Bottom-up constant folding. An operation is only folded when it
/// evaluates cleanly; anything that would error (zero division, type
/// mismatch) is left for the evaluator to report with a source range.
fn fold_node(node: &Arc<Node>) -> Arc<Node> {
    match &*node.expr {
        Expr::Binary(op, lhs, rhs) => {
            let lhs = fold_node(lhs);
            let rhs = fold_node(rhs);

            if let (Expr::Literal(a), Expr::Literal(b)) = (&*lhs.expr, &*rhs.expr)
                && let Ok(folded) = ops::apply(*op, &literal_value(a), &literal_value(b))
                && let Some(literal) = value_literal(&folded)
            {
                return Node::new(node.range, Expr::Literal(literal));
            }

            Node::new(node.range, Expr::Binary(*op, lhs, rhs))
        }
        Expr::Index(target, index) => Node::new(
            node.range,
            Expr::Index(fold_node(target), fold_node(index)),
        ),
        Expr::Call(ident, args, tail) => Node::new(
            node.range,
            Expr::Call(ident.clone(), args.iter().map(fold_node).collect(), *tail),
        ),
        Expr::Array(elements) => Node::new(
            node.range,
            Expr::Array(elements.iter().map(fold_node).collect()),
        ),
        Expr::Object(entries) => Node::new(
            node.range,
            Expr::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), fold_node(value)))
                    .collect(),
            ),
        ),
        Expr::Set(ident, value) => {
            Node::new(node.range, Expr::Set(ident.clone(), fold_node(value)))
        }
        Expr::Func(ident, params, body) => Node::new(
            node.range,
            Expr::Func(
                ident.clone(),
                params.clone(),
                body.iter().map(fold_node).collect(),
            ),
        ),
        Expr::Return(inner) => Node::new(node.range, Expr::Return(fold_node(inner))),
        Expr::If(cond, body) => Node::new(
            node.range,
            Expr::If(fold_node(cond), body.iter().map(fold_node).collect()),
        ),
        Expr::For(binding, collection, body) => Node::new(
            node.range,
            Expr::For(
                binding.clone(),
                fold_node(collection),
                body.iter().map(fold_node).collect(),
            ),
        ),
        Expr::Literal(_) | Expr::Ident(_) => Arc::clone(node),
    }
}

fn value_literal(value: &Value) -> Option<Literal> {
    match value {
        Value::Null => Some(Literal::None),
        Value::Bool(b) => Some(Literal::Bool(*b)),
        Value::Number(n) => Some(Literal::Number(*n)),
        Value::String(s) => Some(Literal::String(s.clone())),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Dead-code elimination. Two conservative rewrites per block: nothing
/// survives after an unconditional `Return`, and a provably
/// side-effect-free expression statement is dropped unless it is the
/// block's final statement (whose value may be the program result).
fn eliminate_in_block(block: &Program, _top_level: bool) -> Program {
    let mut truncated: Vec<_> = Vec::with_capacity(block.len());
    for node in block {
        let is_return = matches!(&*node.expr, Expr::Return(_));
        truncated.push(Arc::clone(node));
        if is_return {
            break;
        }
    }

    let last = truncated.len().saturating_sub(1);
    truncated
        .iter()
        .enumerate()
        .filter(|(i, node)| *i == last || !is_pure_expression(node))
        .map(|(_, node)| eliminate_in_node(node))
        .collect()
}

fn eliminate_in_node(node: &Arc<Node>) -> Arc<Node> {
    match &*node.expr {
        Expr::Func(ident, params, body) => Node::new(
            node.range,
            Expr::Func(ident.clone(), params.clone(), eliminate_in_block(body, false)),
        ),
        Expr::If(cond, body) => Node::new(
            node.range,
            Expr::If(Arc::clone(cond), eliminate_in_block(body, false)),
        ),
        Expr::For(binding, collection, body) => Node::new(
            node.range,
            Expr::For(
                binding.clone(),
                Arc::clone(collection),
                eliminate_in_block(body, false),
            ),
        ),
        _ => Arc::clone(node),
    }
}

/// An expression statement is droppable when evaluating it can neither
/// fail nor observe anything: a runtime error is an observable result,
/// so only literals and literal-only composites qualify. Identifiers
/// can be undefined, binary ops and indexing can raise, and calls have
/// effects; all of those always survive, as do statements proper
/// (`Set`, `Func`, `Return`, `If`, `For`).
fn is_pure_expression(node: &Arc<Node>) -> bool {
    if node.expr.is_statement() {
        return false;
    }
    is_pure(node)
}

fn is_pure(node: &Arc<Node>) -> bool {
    match &*node.expr {
        Expr::Literal(_) => true,
        Expr::Array(elements) => elements.iter().all(is_pure),
        Expr::Object(entries) => entries.iter().all(|(_, value)| is_pure(value)),
        _ => false,
    }
}

/// Marks `Return F(..)` as a tail call inside the body of `F` when the
/// argument count matches the parameter count. Any `Return` exits the
/// function, so returns nested under `If`/`For` are tail positions too.
fn mark_node(node: &Arc<Node>) -> Arc<Node> {
    match &*node.expr {
        Expr::Func(ident, params, body) => Node::new(
            node.range,
            Expr::Func(
                ident.clone(),
                params.clone(),
                mark_body(&ident.name, params.len(), body),
            ),
        ),
        _ => Arc::clone(node),
    }
}

fn mark_body(func: &IdentName, arity: usize, body: &Program) -> Program {
    body.iter()
        .map(|node| match &*node.expr {
            Expr::Return(inner) => {
                if let Expr::Call(ident, args, _) = &*inner.expr
                    && ident.name == *func
                    && args.len() == arity
                {
                    let call = Node::new(
                        inner.range,
                        Expr::Call(ident.clone(), args.clone(), true),
                    );
                    return Node::new(node.range, Expr::Return(call));
                }
                Arc::clone(node)
            }
            Expr::If(cond, if_body) => Node::new(
                node.range,
                Expr::If(Arc::clone(cond), mark_body(func, arity, if_body)),
            ),
            Expr::For(binding, collection, for_body) => Node::new(
                node.range,
                Expr::For(
                    binding.clone(),
                    Arc::clone(collection),
                    mark_body(func, arity, for_body),
                ),
            ),
            // A nested function gets its own marking pass under its own name.
            Expr::Func(_, _, _) => mark_node(node),
            _ => Arc::clone(node),
        })
        .collect()
}
