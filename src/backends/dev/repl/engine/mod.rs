//! REPL Engine Module
//!
//! Core evaluation engine for REPL sessions.

pub mod context;
pub mod evaluator;
pub mod input;

pub use context::{REPLContext, ReplState};
pub use evaluator::Evaluator;
pub use input::{bracket_depth, InputBuffer, InputLine};

#[cfg(test)]
mod tests;
