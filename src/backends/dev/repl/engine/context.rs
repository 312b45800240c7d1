//! REPL Execution Context
//!
//! Pending input, the log of accepted units, the engine state and statistics
//! of one session. Global bindings live in the executor.

use std::fmt;
use std::time::Duration;

use tracing::trace;

use super::input::InputBuffer;
use crate::backends::dev::repl::backend_trait::ExecutionStats;

/// Engine state.
///
/// `Idle -> Accumulating -> Compiling -> Evaluating -> Idle`; a front-end
/// failure passes through `Error` back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplState {
    #[default]
    Idle,
    Accumulating,
    Compiling,
    Evaluating,
    Error,
}

impl fmt::Display for ReplState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            ReplState::Idle => "idle",
            ReplState::Accumulating => "accumulating",
            ReplState::Compiling => "compiling",
            ReplState::Evaluating => "evaluating",
            ReplState::Error => "error",
        };
        f.write_str(name)
    }
}

/// REPL Execution Context
#[derive(Debug, Default)]
pub struct REPLContext {
    input: InputBuffer,
    units: Vec<String>,
    state: ReplState,
    stats: ExecutionStats,
}

impl REPLContext {
    /// Create a new context
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn input(&self) -> &InputBuffer {
        &self.input
    }

    #[inline]
    pub fn input_mut(&mut self) -> &mut InputBuffer {
        &mut self.input
    }

    #[inline]
    pub fn state(&self) -> ReplState {
        self.state
    }

    pub fn set_state(
        &mut self,
        state: ReplState,
    ) {
        if self.state != state {
            trace!(from = %self.state, to = %state, "repl state");
            self.state = state;
        }
    }

    /// Units the front end accepted, oldest first.
    #[inline]
    pub fn units(&self) -> &[String] {
        &self.units
    }

    pub fn record_unit(
        &mut self,
        source: &str,
    ) {
        self.units.push(source.trim_end().to_string());
    }

    /// Count one evaluated unit.
    pub fn record_eval(
        &mut self,
        duration: Duration,
        failed: bool,
    ) {
        self.stats.eval_count += 1;
        self.stats.total_time += duration;
        if failed {
            self.stats.error_count += 1;
        }
    }

    /// Drop pending input.
    pub fn reset(&mut self) {
        self.input.clear();
        self.set_state(ReplState::Idle);
    }

    /// Get statistics
    pub fn stats(&self) -> ExecutionStats {
        self.stats.clone()
    }
}
