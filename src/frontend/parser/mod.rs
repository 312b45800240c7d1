//! Parser module
//!
//! A Pratt parser for the HolyC subset. Statements may appear at the top level
//! next to functions, classes and globals; each becomes one [`ast::Item`].

pub mod ast;
mod expr;
mod item;
mod state;
mod stmt;

pub use state::{ParserState, BP_LOWEST};

use thiserror::Error;
use tracing::trace;

use crate::frontend::lexer::tokens::*;
use crate::util::span::Span;
use ast::*;

/// Parse tokens into a module. Stops at the first error.
pub fn parse(tokens: &[Token]) -> Result<Module, ParseError> {
    let mut state = ParserState::new(tokens);
    let mut items = Vec::new();
    while !state.at_end() {
        items.push(state.parse_item()?);
    }
    trace!(items = items.len(), "parsed");
    Ok(Module { items })
}

/// Parse a single expression spanning the whole token stream.
pub fn parse_expression(tokens: &[Token]) -> Result<Expr, ParseError> {
    let mut state = ParserState::new(tokens);
    let expr = state.parse_expression(BP_LOWEST)?;
    if !state.at_end() {
        return Err(state.unexpected("end of input"));
    }
    Ok(expr)
}

/// Parse error types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        found: TokenKind,
        expected: String,
        span: Span,
    },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String, span: Span },

    #[error("cannot apply {op} to this expression")]
    InvalidAssignTarget { op: TokenKind, span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { span, .. }
            | ParseError::UnexpectedEof { span, .. }
            | ParseError::InvalidAssignTarget { span, .. } => *span,
        }
    }

    /// The input ended before the item was complete.
    pub fn is_eof(&self) -> bool {
        matches!(self, ParseError::UnexpectedEof { .. })
    }
}
