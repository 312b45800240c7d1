//! REPL Module
//!
//! This module contains:
//! - [`backend_trait::REPLBackend`] - Abstract interface for REPL backends
//! - [`engine::Evaluator`] - Incremental unit engine
//! - [`engine::REPLContext`] - Input buffer, state and statistics
//! - [`line::LineREPL`] - Line-based REPL with rustyline
//! - [`commands::CommandHandler`] - Command processor

pub mod backend_trait;
pub mod commands;
pub mod engine;
pub mod line;

pub use backend_trait::{EvalResult, ExecutionStats, REPLBackend};
pub use commands::{CommandHandler, CommandResult};
pub use engine::{bracket_depth, Evaluator, InputBuffer, InputLine, REPLContext, ReplState};
pub use line::{LineREPL, LineREPLConfig};
