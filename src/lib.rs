//! HolyC execution substrate
//!
//! The runtime pieces a HolyC-family language needs to run dynamically: an
//! exception frame stack, the reflection registry, a stack-growth trampoline,
//! the task and job scheduler and the incremental REPL engine. A reference
//! front end and tree-walking interpreter drive them.
//!
//! # Example
//!
//! ```no_run
//! use holyc::{run, Result};
//!
//! fn main() -> Result<()> {
//!     run(r#"
//!         U0 Hello(I64 n = 3) { "Hello %d\n", n; }
//!         Hello();
//!     "#)?;
//!     Ok(())
//! }
//! ```

#![warn(rust_2018_idioms)]

pub mod backends;
pub mod frontend;
pub mod runtime;
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};

use ::std::fs;
use ::std::path::Path;
use ::std::sync::Arc;

use tracing::debug;

use crate::backends::interpreter::Interpreter;
use crate::backends::Executor;
use crate::frontend::{CompiledUnit, Frontend, HolyCFrontend};
use crate::runtime::{Runtime, RuntimeConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Language name
pub const NAME: &str = "HolyC";

/// Compile `source` without running it.
pub fn check(source: &str) -> Result<CompiledUnit> {
    Ok(HolyCFrontend::new().compile(source)?)
}

/// Compile and run `source` in the root context of `runtime`, then wait for
/// the tasks and jobs it started.
///
/// Returns the value of a trailing expression statement, if any.
pub fn run_on(
    runtime: &Arc<Runtime>,
    source: &str,
) -> Result<Option<i64>> {
    let unit = check(source)?;
    debug!(items = unit.items().len(), "unit compiled");
    let interpreter = Interpreter::new(runtime.clone());
    let value = interpreter.execute(&unit);
    runtime.spawn_wait_all()?;
    runtime.flush();
    Ok(value?)
}

/// Run source code on a fresh runtime with `config`.
pub fn run_with(
    source: &str,
    config: RuntimeConfig,
) -> Result<()> {
    let runtime = Arc::new(Runtime::new(config)?);
    let result = run_on(&runtime, source);
    runtime.shutdown();
    result.map(|_| ())
}

/// Run source code on a fresh runtime with default settings.
pub fn run(source: &str) -> Result<()> {
    run_with(source, RuntimeConfig::default())
}

/// Read a source file.
pub fn read_source(path: &Path) -> Result<String> {
    debug!(path = %path.display(), "reading source");
    fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Compile a file without running it.
pub fn check_file(path: &Path) -> Result<CompiledUnit> {
    let source = read_source(path)?;
    check(&source).with_context(|| format!("{}", path.display()))
}

/// Run a file on a fresh runtime with `config`.
pub fn run_file(
    path: &Path,
    config: RuntimeConfig,
) -> Result<()> {
    let source = read_source(path)?;
    run_with(&source, config).with_context(|| format!("{}", path.display()))
}
