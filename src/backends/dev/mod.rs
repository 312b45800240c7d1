//! Development tools
//!
//! The interactive REPL: incremental unit accumulation, evaluation through a
//! [`Frontend`](crate::frontend::Frontend) and an
//! [`Executor`](crate::backends::Executor), and a rustyline line editor.

pub mod repl;

pub use repl::{Evaluator, LineREPL, LineREPLConfig};
