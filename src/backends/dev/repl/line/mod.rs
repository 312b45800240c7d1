//! Line-based REPL with rustyline
//!
//! Provides a REPL using rustyline for editing, completion and history.

use std::path::PathBuf;

use owo_colors::OwoColorize;
use rustyline::config::Config;
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::{CompletionType, Editor};
use tracing::warn;

use crate::backends::dev::repl::backend_trait::{EvalResult, REPLBackend};
use crate::backends::dev::repl::commands::{CommandHandler, CommandResult};
use crate::backends::interpreter::ffi;
use crate::util::config::ReplConfig;

mod completer;
pub use completer::REPLCompleter;

/// Line REPL configuration
#[derive(Debug, Clone)]
pub struct LineREPLConfig {
    /// Prompt to display
    pub prompt: String,
    /// Multi-line prompt
    pub continuation_prompt: String,
    /// History file path
    pub history_file: Option<PathBuf>,
    /// Maximum history size
    pub history_size: usize,
}

impl Default for LineREPLConfig {
    fn default() -> Self {
        ReplConfig::default().into()
    }
}

impl From<ReplConfig> for LineREPLConfig {
    fn from(config: ReplConfig) -> Self {
        Self {
            prompt: config.prompt,
            continuation_prompt: config.continuation_prompt,
            history_file: config.history_file,
            history_size: config.history_size,
        }
    }
}

/// Line REPL
pub struct LineREPL<B: REPLBackend> {
    config: LineREPLConfig,
    editor: Editor<REPLCompleter, FileHistory>,
    completer: REPLCompleter,
    backend: B,
}

impl<B: REPLBackend> LineREPL<B> {
    /// Create a new line REPL
    pub fn new(backend: B) -> rustyline::Result<Self> {
        Self::with_config(backend, LineREPLConfig::default())
    }

    /// Create with custom config
    pub fn with_config(
        backend: B,
        config: LineREPLConfig,
    ) -> rustyline::Result<Self> {
        let rl_config = Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .max_history_size(config.history_size)?
            .build();

        let mut editor = Editor::with_config(rl_config)?;
        let completer = REPLCompleter::new(ffi::names());
        editor.set_helper(Some(completer.clone()));

        if let Some(ref history_file) = config.history_file {
            if history_file.exists() {
                if let Err(err) = editor.load_history(history_file) {
                    warn!(path = %history_file.display(), error = %err, "history not loaded");
                }
            }
        }

        Ok(Self {
            config,
            editor,
            completer,
            backend,
        })
    }

    /// Run the REPL
    pub fn run(&mut self) -> rustyline::Result<()> {
        println!("HolyC REPL - Type :help for assistance");
        println!("Press Ctrl+D or :quit to exit\n");

        loop {
            let prompt = if self.backend.is_pending() {
                self.config.continuation_prompt.clone()
            } else {
                self.config.prompt.clone()
            };

            let line = match self.editor.readline(&prompt) {
                Ok(line) => line,
                Err(ReadlineError::Eof) => break,
                Err(ReadlineError::Interrupted) => {
                    // Ctrl-C drops the pending unit
                    self.backend.reset();
                    println!("(Interrupted)");
                    continue;
                }
                Err(err) => return Err(err),
            };
            if !line.trim().is_empty() {
                self.editor.add_history_entry(line.as_str())?;
            }

            match self.backend.feed_line(&line) {
                EvalResult::Command(command) => {
                    match CommandHandler::new(&mut self.backend).handle(&command) {
                        CommandResult::Exit => break,
                        CommandResult::Continue => {}
                        CommandResult::Output(message) => println!("{}", message),
                    }
                }
                EvalResult::Error(message) => {
                    eprintln!("{} {}", "error:".red().bold(), message);
                }
                EvalResult::Value(_) | EvalResult::Ok => {
                    self.completer.set_symbols(self.backend.symbols());
                }
                EvalResult::Incomplete => {}
            }
        }

        if let Some(ref history_file) = self.config.history_file {
            if let Err(err) = self.editor.save_history(history_file) {
                warn!(path = %history_file.display(), error = %err, "history not saved");
            }
        }

        Ok(())
    }

    /// Get the backend reference
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Get the backend mut reference
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
