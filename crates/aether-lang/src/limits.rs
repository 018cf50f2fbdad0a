use std::time::{Duration, Instant};

use crate::eval::error::EvalError;

/// Execution ceilings applied to every subsequent `eval` call.
///
/// `None` means unbounded for that specific check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Limits {
    pub max_steps: Option<u64>,
    pub max_recursion_depth: Option<u32>,
    pub max_duration: Option<Duration>,
}

/// Elapsed time is only read every `TIME_CHECK_INTERVAL` steps so the
/// governor does not pay a clock read per AST node.
const TIME_CHECK_INTERVAL: u64 = 256;

/// Inline accounting consulted by the evaluator on every node visit and
/// every call-frame push.
#[derive(Debug)]
pub(crate) struct Governor {
    limits: Limits,
    steps: u64,
    depth: u32,
    started: Instant,
}

impl Governor {
    pub(crate) fn new(limits: Limits) -> Self {
        Self {
            limits,
            steps: 0,
            depth: 0,
            started: Instant::now(),
        }
    }

    #[inline(always)]
    pub(crate) fn step(&mut self) -> Result<(), EvalError> {
        self.steps += 1;

        if let Some(max_steps) = self.limits.max_steps
            && self.steps > max_steps
        {
            return Err(EvalError::StepLimitExceeded(max_steps));
        }

        if self.steps % TIME_CHECK_INTERVAL == 0
            && let Some(max_duration) = self.limits.max_duration
            && self.started.elapsed() > max_duration
        {
            return Err(EvalError::TimeLimitExceeded(max_duration.as_millis() as u64));
        }

        Ok(())
    }

    /// Pushes a call frame. Tail-position self-calls iterate inside an
    /// already-pushed frame and never reach this.
    #[inline(always)]
    pub(crate) fn enter_call(&mut self) -> Result<(), EvalError> {
        self.depth += 1;

        if let Some(max_depth) = self.limits.max_recursion_depth
            && self.depth > max_depth
        {
            return Err(EvalError::RecursionLimitExceeded(max_depth));
        }

        Ok(())
    }

    #[inline(always)]
    pub(crate) fn exit_call(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}
