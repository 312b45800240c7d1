//! Unit accumulation across input lines.

/// What a line did to the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    /// Nothing buffered and nothing entered
    Blank,
    /// A `:command` line; the buffer is untouched
    Command(String),
    /// Brackets are still open, or an explicit block is running
    Open,
    /// Brackets balance; the buffered text may be a complete unit
    Balanced,
    /// An explicit `:{ ... :}` block was closed; its text is the unit
    Block(String),
}

/// Lines entered since the last unit.
#[derive(Debug, Default)]
pub struct InputBuffer {
    text: String,
    explicit: bool,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether a unit is partially entered.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.explicit || !self.text.is_empty()
    }

    /// Hand out the buffered text and start over.
    pub fn take(&mut self) -> String {
        self.explicit = false;
        std::mem::take(&mut self.text)
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.explicit = false;
    }

    /// Add one line.
    ///
    /// Inside an explicit block every line is kept verbatim until `:}`.
    /// Between units, a line starting with `:` is a command; once a unit is
    /// partially entered it is ordinary text (`c ? 10` then `: 20;`).
    pub fn push(
        &mut self,
        line: &str,
    ) -> InputLine {
        let trimmed = line.trim();
        if self.explicit {
            if trimmed == ":}" {
                return InputLine::Block(self.take());
            }
            self.append(line);
            return InputLine::Open;
        }
        if self.text.is_empty() {
            if trimmed == ":{" {
                self.explicit = true;
                return InputLine::Open;
            }
            if trimmed.starts_with(':') {
                return InputLine::Command(trimmed.to_string());
            }
            if trimmed.is_empty() {
                return InputLine::Blank;
            }
        }

        self.append(line);
        if bracket_depth(&self.text) > 0 {
            InputLine::Open
        } else {
            InputLine::Balanced
        }
    }

    fn append(
        &mut self,
        line: &str,
    ) {
        self.text.push_str(line);
        self.text.push('\n');
    }
}

/// Net count of open `(`, `[` and `{`.
///
/// Brackets inside string and character literals, line comments and block
/// comments do not count.
pub fn bracket_depth(text: &str) -> i64 {
    let mut depth = 0;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => {
                while let Some(c2) = chars.next() {
                    if c2 == '\\' {
                        chars.next();
                    } else if c2 == c {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                for c2 in chars.by_ref() {
                    if c2 == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c2 in chars.by_ref() {
                    if prev == '*' && c2 == '/' {
                        break;
                    }
                    prev = c2;
                }
            }
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }

    depth
}
