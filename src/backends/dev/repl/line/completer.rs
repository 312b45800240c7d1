//! REPL Completer
//!
//! Completes keywords, type names, builtins and the session's symbols.

use std::sync::Arc;

use parking_lot::RwLock;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::Helper;

const KEYWORDS: &[&str] = &[
    "if", "else", "while", "do", "for", "return", "break", "continue", "try", "catch", "class",
    "TRUE", "FALSE", "NULL", "U0", "I8", "U8", "I16", "U16", "I32", "U32", "I64", "U64", "Bool",
];

/// REPL Completer
///
/// `symbols` is refreshed by the line REPL after every unit.
#[derive(Debug, Clone)]
pub struct REPLCompleter {
    builtins: Vec<&'static str>,
    symbols: Arc<RwLock<Vec<String>>>,
}

impl REPLCompleter {
    /// Create a new completer
    pub fn new(builtins: Vec<&'static str>) -> Self {
        Self {
            builtins,
            symbols: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn set_symbols(
        &self,
        symbols: Vec<String>,
    ) {
        *self.symbols.write() = symbols;
    }

    /// Candidates starting with `word`, sorted and deduplicated.
    pub fn candidates(
        &self,
        word: &str,
    ) -> Vec<String> {
        let symbols = self.symbols.read();
        let mut candidates: Vec<String> = KEYWORDS
            .iter()
            .chain(self.builtins.iter())
            .map(|name| name.to_string())
            .chain(symbols.iter().cloned())
            .filter(|name| name.starts_with(word))
            .collect();
        candidates.sort();
        candidates.dedup();
        candidates
    }
}

impl Completer for REPLCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        let start = line[..pos]
            .rfind(|c: char| !c.is_alphanumeric() && c != '_')
            .map_or(0, |i| i + 1);
        let word = &line[start..pos];
        if word.is_empty() {
            return Ok((start, Vec::new()));
        }

        let pairs = self
            .candidates(word)
            .into_iter()
            .map(|name| Pair {
                display: name.clone(),
                replacement: name,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for REPLCompleter {
    type Hint = String;
}

impl Highlighter for REPLCompleter {}

impl Validator for REPLCompleter {}

impl Helper for REPLCompleter {}
