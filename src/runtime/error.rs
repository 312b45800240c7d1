//! Runtime error taxonomy
//!
//! Front-end failures live in [`crate::frontend::FrontEndError`]; everything that
//! can go wrong once a unit is loaded is a [`RuntimeError`].

use thiserror::Error;

use crate::runtime::memory::MemoryError;
use crate::runtime::scheduler::SchedulerError;
use crate::runtime::AbiVersion;

/// Errors raised by the execution substrate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// A throw unwound past the bottom of its context's frame stack.
    #[error("unhandled exception (payload {payload})")]
    UnhandledException { payload: i64 },

    /// A required stack segment or memory block could not be provided.
    #[error("resource exhaustion: {what}")]
    ResourceExhaustion { what: String },

    /// A compiled unit was built against an incompatible runtime.
    #[error("ABI version mismatch: runtime is {runtime}, unit expects {expected}")]
    AbiVersionMismatch {
        runtime: AbiVersion,
        expected: AbiVersion,
    },

    #[error(transparent)]
    Scheduling(#[from] SchedulerError),

    /// Misuse of the heap. Exhaustion is reported as `ResourceExhaustion`.
    #[error(transparent)]
    Memory(MemoryError),

    /// Fault raised by the executor (division by zero, unknown symbol, ...).
    #[error("{0}")]
    Eval(String),

    /// A host panic escaped compiled code.
    #[error("context panicked: {0}")]
    Panicked(String),
}

impl RuntimeError {
    /// Shorthand for an executor fault.
    pub fn eval(msg: impl Into<String>) -> Self {
        RuntimeError::Eval(msg.into())
    }

    /// Whether the error terminates the context it was raised in.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RuntimeError::Scheduling(_))
    }
}

impl From<MemoryError> for RuntimeError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::OutOfMemory { .. } => RuntimeError::ResourceExhaustion {
                what: err.to_string(),
            },
            other => RuntimeError::Memory(other),
        }
    }
}

/// Result alias used across the runtime.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
