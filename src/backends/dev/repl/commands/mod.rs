//! REPL Command Handler
//!
//! Handles special commands starting with ':'.

use super::backend_trait::REPLBackend;

/// Command result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Exit the REPL
    Exit,
    /// Continue to next input
    Continue,
    /// Output a message
    Output(String),
}

const HELP: &str = "\
Available commands:
  :quit, :q       - Exit the REPL
  :help, :h       - Show this help
  :symbols, :i    - List user-defined globals and functions
  :reset, :r      - Reset the input state (Ctrl-C drops a partial unit)
  :history, :hist - Show accepted units
  :stats          - Show execution statistics
  :{ ... :}       - Enter a multi-line unit verbatim";

/// Command handler for REPL
pub struct CommandHandler<'a, B: REPLBackend> {
    backend: &'a mut B,
}

impl<'a, B: REPLBackend> CommandHandler<'a, B> {
    /// Create a new command handler
    pub fn new(backend: &'a mut B) -> Self {
        Self { backend }
    }

    /// Handle a command
    pub fn handle(
        &mut self,
        line: &str,
    ) -> CommandResult {
        let command = line.trim().trim_start_matches(':').trim();
        let name = command.split_whitespace().next().unwrap_or("");

        match name {
            "quit" | "q" => CommandResult::Exit,
            "help" | "h" => CommandResult::Output(HELP.to_string()),
            "symbols" | "info" | "i" => {
                let symbols = self.backend.symbols();
                if symbols.is_empty() {
                    CommandResult::Output("(no symbols)".to_string())
                } else {
                    CommandResult::Output(symbols.join("\n"))
                }
            }
            "reset" | "r" => {
                let dropped = self.backend.is_pending();
                self.backend.reset();
                if dropped {
                    CommandResult::Output("pending input dropped".to_string())
                } else {
                    CommandResult::Continue
                }
            }
            "history" | "hist" => {
                let units = self.backend.history();
                let listing: Vec<String> = units
                    .iter()
                    .enumerate()
                    .map(|(index, unit)| format!("[{}] {}", index + 1, unit))
                    .collect();
                CommandResult::Output(listing.join("\n"))
            }
            "stats" => {
                let stats = self.backend.stats();
                CommandResult::Output(format!(
                    "units: {}\nerrors: {}\ntime: {:?}",
                    stats.eval_count, stats.error_count, stats.total_time
                ))
            }
            "" => CommandResult::Continue,
            _ => CommandResult::Output(format!("unknown command `{}`, try :help", line.trim())),
        }
    }
}
