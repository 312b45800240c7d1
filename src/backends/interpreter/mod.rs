//! Interpreter backend
//!
//! Walks the items of a [`CompiledUnit`](crate::frontend::CompiledUnit)
//! directly. Function calls pass through the runtime's stack-growth prologue;
//! builtins call straight into the runtime ABI.

pub mod eval;
pub mod executor;
pub mod ffi;
pub mod frames;

#[cfg(test)]
mod tests;

pub use eval::Flow;
pub use executor::Interpreter;
pub use frames::Frame;
