use std::sync::{Arc, RwLock};

use crate::ast::Program;
use crate::ast::parser::Parser;
use crate::cache::{Cache, CacheStats, Fingerprint};
use crate::error::{Error, InnerError};
use crate::eval::Evaluator;
use crate::eval::env::{Binding, Env, SharedEnv};
use crate::lexer::Lexer;
use crate::limits::{Governor, Limits};
use crate::optimizer::{Optimization, Optimizer};
use crate::trace::{TraceBuffer, TraceRecord, TraceStats};
use crate::value::Value;

/// An isolated execution engine: global environment, compilation
/// cache, trace buffer, and execution limits behind one lock.
///
/// All methods take `&self`; the engine is `Send + Sync` and can be
/// shared behind an `Arc`. Evaluations are serialized.
///
/// ```rust
/// use aether_lang::{Engine, Value};
///
/// let engine = Engine::new();
/// let result = engine.eval("Set X 10\nSet Y 20\n(X + Y)").unwrap();
/// assert_eq!(result, Value::Number(30.into()));
/// ```
pub struct Engine {
    state: RwLock<EngineState>,
    permissive: bool,
}

struct EngineState {
    env: SharedEnv,
    cache: Cache,
    trace: TraceBuffer,
    limits: Limits,
    optimization: Optimization,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Creates an engine with IO builtins disabled. This is the safe
    /// default for embedding untrusted scripts.
    pub fn new() -> Self {
        Self::with_permissive(false)
    }

    /// Creates an engine whose scripts may use the IO builtins.
    pub fn with_permissions() -> Self {
        Self::with_permissive(true)
    }

    fn with_permissive(permissive: bool) -> Self {
        Self {
            state: RwLock::new(EngineState {
                env: Env::new(),
                cache: Cache::default(),
                trace: TraceBuffer::default(),
                limits: Limits::default(),
                optimization: Optimization::default(),
            }),
            permissive,
        }
    }

    pub const fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Compiles and runs a program against the engine's global
    /// environment, reusing a cached compilation when the same source
    /// was previously run under the same optimization flags.
    pub fn eval(&self, code: &str) -> Result<Value, Error> {
        let mut state = self.state.write().unwrap();

        let fingerprint = Fingerprint::compute(code, &state.optimization);
        let program = match state.cache.lookup(&fingerprint) {
            Some(program) => program,
            None => {
                let program = Arc::new(compile(code, state.optimization)?);
                state.cache.insert(fingerprint, Arc::clone(&program));
                program
            }
        };

        let EngineState {
            env, trace, limits, ..
        } = &mut *state;

        Evaluator::new(
            Arc::clone(env),
            Governor::new(*limits),
            trace,
            self.permissive,
        )
        .eval_program(&program)
        .map_err(|e| Error::from_error(code, InnerError::Eval(e)))
    }

    /// Binds `name` in the global environment. The binding is visible
    /// to every subsequent `eval`.
    pub fn set_global(&self, name: &str, value: Value) {
        let state = self.state.write().unwrap();
        state
            .env
            .write()
            .unwrap()
            .define(name.into(), Binding::Value(value));
    }

    /// Reads a variable from the global environment. Returns `None`
    /// for unbound names and for function definitions.
    pub fn get_global(&self, name: &str) -> Option<Value> {
        let state = self.state.read().unwrap();
        match crate::eval::env::resolve(&state.env, name) {
            Some(Binding::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Drops every global variable and function definition. The cache,
    /// trace buffer, and limits are unaffected.
    pub fn reset_env(&self) {
        let state = self.state.write().unwrap();
        state.env.write().unwrap().clear();
    }

    /// Renders the buffered trace records to display strings, oldest
    /// first. The buffer is left intact.
    pub fn take_trace(&self) -> Vec<String> {
        self.state.read().unwrap().trace.take()
    }

    pub fn trace_records(&self) -> Vec<TraceRecord> {
        self.state.read().unwrap().trace.records()
    }

    pub fn trace_stats(&self) -> TraceStats {
        self.state.read().unwrap().trace.stats()
    }

    pub fn clear_trace(&self) {
        self.state.write().unwrap().trace.clear();
    }

    /// Replaces the execution limits applied to subsequent `eval`
    /// calls. In-flight evaluations keep the limits they started with.
    pub fn set_limits(&self, limits: Limits) {
        self.state.write().unwrap().limits = limits;
    }

    pub fn limits(&self) -> Limits {
        self.state.read().unwrap().limits
    }

    /// Evicts all cached compilations. Hit and miss counters are
    /// cumulative and survive the clear.
    pub fn clear_cache(&self) {
        self.state.write().unwrap().cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.state.read().unwrap().cache.stats()
    }

    /// Replaces the optimization flags. Programs compiled under other
    /// flag combinations stay in the cache but will not be reused.
    pub fn set_optimization(&self, optimization: Optimization) {
        self.state.write().unwrap().optimization = optimization;
    }

    pub fn optimization(&self) -> Optimization {
        self.state.read().unwrap().optimization
    }
}

fn compile(code: &str, optimization: Optimization) -> Result<Program, Error> {
    let tokens = Lexer::new()
        .tokenize(code)
        .map_err(|e| Error::from_error(code, InnerError::Lexer(e)))?;
    let program = Parser::new(tokens.iter())
        .parse()
        .map_err(|e| Error::from_error(code, InnerError::Parse(e)))?;

    Ok(Optimizer::new(optimization).optimize(&program))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, LimitKind};
    use crate::number::Number;

    fn num(n: i64) -> Value {
        Value::Number(Number::from(n))
    }

    #[test]
    fn test_eval_basic_program() {
        let engine = Engine::new();
        assert_eq!(engine.eval("Set X 10\nSet Y 20\n(X + Y)"), Ok(num(30)));
    }

    #[test]
    fn test_globals_persist_across_evals() {
        let engine = Engine::new();
        engine.eval("Set COUNTER 0").unwrap();
        engine.eval("Set COUNTER (COUNTER + 1)").unwrap();
        engine.eval("Set COUNTER (COUNTER + 1)").unwrap();
        assert_eq!(engine.eval("COUNTER"), Ok(num(2)));
    }

    #[test]
    fn test_set_and_get_global() {
        let engine = Engine::new();
        engine.set_global("LIMIT", num(5));

        assert_eq!(engine.eval("(LIMIT * 2)"), Ok(num(10)));
        engine.eval("Set LIMIT 7").unwrap();
        assert_eq!(engine.get_global("LIMIT"), Some(num(7)));
        assert_eq!(engine.get_global("MISSING"), None);
    }

    #[test]
    fn test_reset_env_drops_globals() {
        let engine = Engine::new();
        engine.eval("Set X 1").unwrap();
        engine.reset_env();

        assert_eq!(engine.get_global("X"), None);
        let error = engine.eval("X").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::UndefinedReference);
    }

    #[test]
    fn test_cache_hit_on_repeat_eval() {
        let engine = Engine::new();
        engine.eval("Set X 1\n(X + 1)").unwrap();
        engine.eval("Set X 1\n(X + 1)").unwrap();
        engine.eval("Set X 1\n(X + 1)").unwrap();

        let stats = engine.cache_stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_cached_program_result_identical() {
        let engine = Engine::new();
        let first = engine.eval("((2 + 3) * 4)").unwrap();
        let second = engine.eval("((2 + 3) * 4)").unwrap();
        assert_eq!(first, second);
        assert_eq!(first, num(20));
    }

    #[test]
    fn test_optimization_change_recompiles() {
        let engine = Engine::new();
        engine.eval("(1 + 2)").unwrap();

        engine.set_optimization(Optimization {
            constant_folding: false,
            ..Default::default()
        });
        assert_eq!(engine.eval("(1 + 2)"), Ok(num(3)));

        let stats = engine.cache_stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.size, 2);
    }

    #[test]
    fn test_clear_cache_preserves_counters() {
        let engine = Engine::new();
        engine.eval("1").unwrap();
        engine.eval("1").unwrap();
        engine.clear_cache();

        let stats = engine.cache_stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);

        engine.eval("1").unwrap();
        assert_eq!(engine.cache_stats().misses, 2);
    }

    #[test]
    fn test_step_limit_enforced() {
        let engine = Engine::new();
        engine.set_limits(Limits {
            max_steps: Some(50),
            ..Default::default()
        });

        let error = engine
            .eval("Func LOOP (N) {\n    Return (LOOP(N))\n}\nLOOP(0)")
            .unwrap_err();
        assert_eq!(
            error.kind(),
            ErrorKind::ResourceExceeded(LimitKind::Steps)
        );
    }

    #[test]
    fn test_tail_recursion_survives_depth_limit() {
        let engine = Engine::new();
        engine.set_limits(Limits {
            max_recursion_depth: Some(10),
            ..Default::default()
        });

        // 1000 self-calls in tail position run in a single frame.
        let code = "Func COUNT (N) {\n    If ((N >= 1000)) {\n        Return (N)\n    }\n    Return (COUNT((N + 1)))\n}\nCOUNT(0)";
        assert_eq!(engine.eval(code), Ok(num(1000)));

        // The same program overflows the depth limit once the rewrite
        // is disabled.
        engine.set_optimization(Optimization {
            tail_recursion: false,
            ..Default::default()
        });
        let error = engine.eval(code).unwrap_err();
        assert_eq!(
            error.kind(),
            ErrorKind::ResourceExceeded(LimitKind::Recursion)
        );
    }

    #[test]
    fn test_failing_statements_survive_dead_code_pass() {
        // A runtime error is an observable result, so a failing
        // statement must still fail under default flags even when its
        // value is unused.
        let engine = Engine::new();
        let error = engine.eval("X\n1").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::UndefinedReference);

        let error = engine.eval("(1 / 0)\n42").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_self_call_after_runtime_shadowing() {
        let engine = Engine::new();
        engine.set_limits(Limits {
            max_steps: Some(1000),
            ..Default::default()
        });

        // A nested definition rebinds the name before the self-call
        // runs, so the call must reach the inner function rather than
        // loop the outer body.
        let code = "Func F (N) {\n    Func F (N) {\n        Return (0)\n    }\n    Return (F(N))\n}\nF(7)";
        assert_eq!(engine.eval(code), Ok(num(0)));

        // A `Set` that rebinds the name fails the same way it would
        // without the rewrite.
        let error = engine
            .eval("Func G (N) {\n    Set G 1\n    Return (G(N))\n}\nG(1)")
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_trace_accumulates_across_evals() {
        let engine = Engine::new();
        engine.eval("TRACE_INFO(\"auth\", \"login\")").unwrap();
        engine.eval("TRACE_WARN(\"auth\", \"retry\")").unwrap();

        let trace = engine.take_trace();
        assert_eq!(
            trace,
            vec![
                "[info] auth: login".to_string(),
                "[warn] auth: retry".to_string()
            ]
        );
        // Non-destructive read.
        assert_eq!(engine.take_trace().len(), 2);

        let stats = engine.trace_stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.by_category.get("auth"), Some(&2));

        engine.clear_trace();
        assert!(engine.take_trace().is_empty());
    }

    #[test]
    fn test_io_gated_by_permissions() {
        let engine = Engine::new();
        let error = engine.eval("READ_FILE(\"/tmp/nope\")").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_permissive_engine_allows_io() {
        let engine = Engine::with_permissions();
        let dir = std::env::temp_dir().join("aether-engine-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("data.txt");
        std::fs::write(&path, "payload").unwrap();

        let code = format!("READ_FILE(\"{}\")", path.display());
        assert_eq!(
            engine.eval(&code),
            Ok(Value::String("payload".to_string()))
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_syntax_error_kind() {
        let engine = Engine::new();
        let error = engine.eval("Set").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Syntax);
    }

    #[test]
    fn test_length_builtin() {
        let engine = Engine::new();
        assert_eq!(engine.eval("LENGTH([1, 2, 3])"), Ok(num(3)));
    }

    #[test]
    fn test_version_matches_package() {
        assert_eq!(Engine::version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }

    #[test]
    fn test_shared_engine_across_threads() {
        let engine = std::sync::Arc::new(Engine::new());
        engine.eval("Set BASE 10").unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = std::sync::Arc::clone(&engine);
                std::thread::spawn(move || engine.eval("(BASE + 1)"))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Ok(num(11)));
        }
    }
}
