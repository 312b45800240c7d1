//! REPL Evaluation Engine
//!
//! Feeds lines into the input buffer, compiles each finished unit with the
//! front end, runs it on the executor and settles background work before the
//! echo is printed.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::context::{REPLContext, ReplState};
use super::input::InputLine;
use crate::backends::dev::repl::backend_trait::{EvalResult, ExecutionStats, REPLBackend};
use crate::backends::interpreter::Interpreter;
use crate::backends::Executor;
use crate::frontend::{Frontend, HolyCFrontend};
use crate::runtime::Runtime;

/// Evaluation Engine
pub struct Evaluator {
    runtime: Arc<Runtime>,
    frontend: Box<dyn Frontend>,
    executor: Box<dyn Executor>,
    context: REPLContext,
}

impl std::fmt::Debug for Evaluator {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("runtime", &self.runtime)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl Evaluator {
    /// HolyC front end and tree-walking interpreter on `runtime`.
    pub fn new(runtime: Arc<Runtime>) -> Self {
        let interpreter = Interpreter::new(runtime.clone());
        Self::with_backends(runtime, Box::new(HolyCFrontend::new()), Box::new(interpreter))
    }

    pub fn with_backends(
        runtime: Arc<Runtime>,
        frontend: Box<dyn Frontend>,
        executor: Box<dyn Executor>,
    ) -> Self {
        Self {
            runtime,
            frontend,
            executor,
            context: REPLContext::new(),
        }
    }

    #[inline]
    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    #[inline]
    pub fn state(&self) -> ReplState {
        self.context.state()
    }

    /// Get context reference
    pub fn context(&self) -> &REPLContext {
        &self.context
    }

    /// Feed one line; runs the buffered unit once it is complete.
    pub fn feed_line(
        &mut self,
        line: &str,
    ) -> EvalResult {
        match self.context.input_mut().push(line) {
            InputLine::Blank => EvalResult::Ok,
            InputLine::Command(command) => EvalResult::Command(command),
            InputLine::Open => {
                self.context.set_state(ReplState::Accumulating);
                EvalResult::Incomplete
            }
            InputLine::Block(text) => self.evaluate(&text),
            InputLine::Balanced => {
                if self.frontend.is_complete_item(self.context.input().text()) {
                    let text = self.context.input_mut().take();
                    self.evaluate(&text)
                } else {
                    self.context.set_state(ReplState::Accumulating);
                    EvalResult::Incomplete
                }
            }
        }
    }

    /// Compile and run one unit.
    ///
    /// Background work started by the unit is waited for before the echo, so
    /// its output always precedes the value.
    pub fn evaluate(
        &mut self,
        code: &str,
    ) -> EvalResult {
        let start = Instant::now();
        self.context.set_state(ReplState::Compiling);
        let unit = match self.frontend.compile(code) {
            Ok(unit) => unit,
            Err(err) => {
                self.context.set_state(ReplState::Error);
                debug!(error = %err, "unit discarded");
                self.context.record_eval(start.elapsed(), true);
                self.context.set_state(ReplState::Idle);
                return EvalResult::Error(err.to_string());
            }
        };

        self.context.record_unit(code);
        self.context.set_state(ReplState::Evaluating);
        let result = self.executor.execute(&unit);
        let settled = self.runtime.spawn_wait_all();

        let outcome = match (result, settled) {
            (Err(err), _) | (Ok(_), Err(err)) => {
                debug!(error = %err, "unit failed");
                EvalResult::Error(err.to_string())
            }
            (Ok(Some(value)), Ok(())) => {
                self.runtime.print_string(&format!("{}\n", value));
                EvalResult::Value(value)
            }
            (Ok(None), Ok(())) => EvalResult::Ok,
        };
        self.runtime.flush();
        self.context
            .record_eval(start.elapsed(), matches!(outcome, EvalResult::Error(_)));
        self.context.set_state(ReplState::Idle);
        outcome
    }
}

impl REPLBackend for Evaluator {
    fn feed_line(
        &mut self,
        line: &str,
    ) -> EvalResult {
        Evaluator::feed_line(self, line)
    }

    fn is_pending(&self) -> bool {
        self.context.input().is_pending()
    }

    fn symbols(&self) -> Vec<String> {
        self.executor.symbols()
    }

    fn history(&self) -> Vec<String> {
        self.context.units().to_vec()
    }

    fn reset(&mut self) {
        self.context.reset();
    }

    fn stats(&self) -> ExecutionStats {
        self.context.stats()
    }
}
