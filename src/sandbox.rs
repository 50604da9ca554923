//! Execution limits for untrusted templates.
//!
//! Rendering is a cooperative walk over the AST: the interpreter reports a
//! step at every node boundary and every filter or function call, and the
//! limiter aborts the walk with a fatal error once the budget or the wall
//! clock runs out.

use std::cell::Cell;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Limits for one sandboxed render call.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Maximum number of evaluation steps; `0` disables the step budget.
    pub max_steps: usize,
    /// Wall-clock ceiling for the whole render; `None` disables it.
    pub timeout: Option<Duration>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions { max_steps: 100_000, timeout: Some(Duration::from_secs(5)) }
    }
}

/// Step and deadline accounting for one render call. Lives on the caller's
/// stack; a fresh render starts from zero.
pub(crate) struct Limiter {
    steps: Cell<usize>,
    max_steps: usize,
    deadline: Option<Instant>,
}

impl Limiter {
    pub(crate) fn new(opts: &RenderOptions) -> Self {
        Limiter {
            steps: Cell::new(0),
            max_steps: opts.max_steps,
            deadline: opts.timeout.map(|t| Instant::now() + t),
        }
    }

    /// Counts one step without checking.
    pub(crate) fn bump(&self) {
        self.steps.set(self.steps.get() + 1);
    }

    /// Counts one step and fails once a limit is exceeded.
    pub(crate) fn check(&self) -> Result<()> {
        self.bump();
        if self.max_steps > 0 && self.steps.get() > self.max_steps {
            return Err(Error::StepLimitExceeded);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() > deadline {
                return Err(Error::Timeout);
            }
        }
        Ok(())
    }
}
