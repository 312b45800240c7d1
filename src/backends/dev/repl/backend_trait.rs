//! REPL Backend Trait
//!
//! Defines the abstract interface for REPL backends.

use std::time::Duration;

/// Result of feeding one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalResult {
    /// A unit ran and its final expression produced a value (already echoed)
    Value(i64),
    /// A unit ran without a value, or the line was blank
    Ok,
    /// The unit was discarded or failed
    Error(String),
    /// More input needed
    Incomplete,
    /// A `:command` line, left to the command handler
    Command(String),
}

/// Execution statistics
#[derive(Debug, Default, Clone)]
pub struct ExecutionStats {
    /// Units evaluated, failed ones included
    pub eval_count: usize,
    /// Units rejected by the front end or failed at run time
    pub error_count: usize,
    /// Total compile and execution time
    pub total_time: Duration,
}

/// REPL Backend Trait
pub trait REPLBackend {
    /// Feed one input line
    fn feed_line(
        &mut self,
        line: &str,
    ) -> EvalResult;

    /// Whether a unit is partially entered
    fn is_pending(&self) -> bool;

    /// Names of user-defined globals and functions
    fn symbols(&self) -> Vec<String>;

    /// Accepted units, oldest first
    fn history(&self) -> Vec<String>;

    /// Drop pending input
    fn reset(&mut self);

    /// Get execution statistics
    fn stats(&self) -> ExecutionStats;
}
