//! Frontend compilation pipeline
//!
//! Source text goes through the lexer, the parser and a structural check and
//! comes out as a [`CompiledUnit`]. The runtime only sees the unit through
//! [`CompiledUnit::expected_abi`] and [`CompiledUnit::classes`]; executors walk
//! its items.

pub mod lexer;
pub mod parser;
pub mod semantic;

use thiserror::Error;
use tracing::debug;

use crate::runtime::AbiVersion;
use crate::util::span::Span;
use parser::ast::{ClassDef, FunctionDef, Item, Module};

/// Front-end collaborator: turns source text into executable units.
pub trait Frontend: Send + Sync {
    /// Compile `source` into one unit.
    fn compile(
        &self,
        source: &str,
    ) -> Result<CompiledUnit, FrontEndError>;

    /// Whether `source` forms complete items, i.e. more input cannot help.
    ///
    /// Text with a genuine error counts as complete so the error gets reported.
    fn is_complete_item(
        &self,
        source: &str,
    ) -> bool;
}

/// Result of compiling one piece of source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledUnit {
    items: Vec<Item>,
    expected_abi: AbiVersion,
}

impl CompiledUnit {
    pub fn new(
        module: Module,
        expected_abi: AbiVersion,
    ) -> Self {
        Self {
            items: module.items,
            expected_abi,
        }
    }

    #[inline]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Runtime interface version the unit was built against.
    #[inline]
    pub fn expected_abi(&self) -> AbiVersion {
        self.expected_abi
    }

    pub fn with_expected_abi(
        mut self,
        abi: AbiVersion,
    ) -> Self {
        self.expected_abi = abi;
        self
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.items.iter().filter_map(|item| match item {
            Item::Class(class) => Some(class),
            _ => None,
        })
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.items.iter().filter_map(|item| match item {
            Item::Function(function) => Some(function.as_ref()),
            _ => None,
        })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Compilation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrontEndError {
    #[error("{span}: lexical error: {message}")]
    Lex { message: String, span: Span },

    #[error("{span}: syntax error: {message}")]
    Parse { message: String, span: Span },

    #[error("{span}: {message}")]
    Semantic { message: String, span: Span },
}

impl FrontEndError {
    pub fn span(&self) -> Span {
        match self {
            FrontEndError::Lex { span, .. }
            | FrontEndError::Parse { span, .. }
            | FrontEndError::Semantic { span, .. } => *span,
        }
    }

    /// The message without its location.
    pub fn message(&self) -> &str {
        match self {
            FrontEndError::Lex { message, .. }
            | FrontEndError::Parse { message, .. }
            | FrontEndError::Semantic { message, .. } => message,
        }
    }
}

impl From<lexer::LexError> for FrontEndError {
    fn from(err: lexer::LexError) -> Self {
        FrontEndError::Lex {
            message: err.to_string(),
            span: err.span(),
        }
    }
}

impl From<parser::ParseError> for FrontEndError {
    fn from(err: parser::ParseError) -> Self {
        FrontEndError::Parse {
            message: err.to_string(),
            span: err.span(),
        }
    }
}

impl From<semantic::SemanticError> for FrontEndError {
    fn from(err: semantic::SemanticError) -> Self {
        FrontEndError::Semantic {
            message: err.message,
            span: err.span,
        }
    }
}

/// Front end for the HolyC subset.
#[derive(Debug, Clone)]
pub struct HolyCFrontend {
    abi: AbiVersion,
}

impl Default for HolyCFrontend {
    fn default() -> Self {
        Self {
            abi: AbiVersion::CURRENT,
        }
    }
}

impl HolyCFrontend {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp units with `abi` instead of the current version.
    pub fn targeting(abi: AbiVersion) -> Self {
        Self { abi }
    }
}

impl Frontend for HolyCFrontend {
    fn compile(
        &self,
        source: &str,
    ) -> Result<CompiledUnit, FrontEndError> {
        debug!("Compiling source code ({} bytes)", source.len());
        let tokens = lexer::tokenize(source)?;
        let module = parser::parse(&tokens)?;
        semantic::check_module(&module)?;
        debug!(items = module.items.len(), "compiled unit");
        Ok(CompiledUnit::new(module, self.abi))
    }

    fn is_complete_item(
        &self,
        source: &str,
    ) -> bool {
        match lexer::tokenize(source) {
            Ok(tokens) => match parser::parse(&tokens) {
                Ok(_) => true,
                Err(err) => !err.is_eof(),
            },
            Err(err) => !err.is_truncation(),
        }
    }
}
