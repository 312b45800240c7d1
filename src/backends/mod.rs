//! Backend abstraction layer
//!
//! A backend executes compiled units against a [`Runtime`](crate::runtime::Runtime).
//! The tree-walking [`interpreter`] is the only backend; [`dev`] holds the
//! interactive tooling built on top of it.
//!
//! ```text
//! CompiledUnit (from the frontend)
//!         |
//!         v
//!    Interpreter ----> Runtime (scheduler, heap, reflection, ...)
//!         |
//!         v
//!   echo value (REPL)
//! ```

pub mod dev;
pub mod interpreter;

use crate::frontend::CompiledUnit;
use crate::runtime::RuntimeResult;

/// Executor trait - all backends must implement this
pub trait Executor: Send + Sync {
    /// Install the unit's declarations and run its statements in a root
    /// context.
    ///
    /// Returns the value to echo: the result of the unit's final item when it
    /// is an expression statement with a non-void result.
    fn execute(
        &self,
        unit: &CompiledUnit,
    ) -> RuntimeResult<Option<i64>>;

    /// Names currently bound in the global symbol mapping.
    fn symbols(&self) -> Vec<String>;
}
