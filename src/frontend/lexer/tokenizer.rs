//! Tokenizer implementation

use std::iter::Peekable;
use std::str::Chars;

use super::tokens::{LexError, Token, TokenKind};
use crate::runtime::reflect::{HTT_CLASS, HTT_FUNCTION};
use crate::util::span::{Position, Span};

/// Main lexer structure
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    offset: usize,
    line: usize,
    column: usize,
    start: Position,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            offset: 0,
            line: 1,
            column: 1,
            start: Position::with_offset(1, 1, 0),
        }
    }

    /// Get current position
    pub fn position(&self) -> Position {
        Position::with_offset(self.line, self.column, self.offset)
    }

    /// Get span of current token
    fn span(&self) -> Span {
        Span::new(self.start, self.position())
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.clone().nth(1)
    }

    /// Consume `expected` if it is next.
    fn eat(
        &mut self,
        expected: char,
    ) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Skip whitespace and comments
    fn skip_trivia(&mut self) -> Result<(), LexError> {
        while let Some(c) = self.peek() {
            match c {
                c if c.is_whitespace() => {
                    self.advance();
                }
                '/' if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                '/' if self.peek_next() == Some('*') => {
                    self.start = self.position();
                    self.advance();
                    self.advance();
                    loop {
                        match self.advance() {
                            Some('*') if self.eat('/') => break,
                            Some(_) => {}
                            None => {
                                return Err(LexError::UnterminatedComment { span: self.span() })
                            }
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// Generate next token; `Eof` once the input is exhausted.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia()?;
        self.start = self.position();

        let Some(c) = self.advance() else {
            return Ok(self.make_token(TokenKind::Eof));
        };

        let kind = match c {
            c if c.is_ascii_alphabetic() || c == '_' => return Ok(self.scan_identifier(c)),
            c if c.is_ascii_digit() => return self.scan_number(c),
            '"' => return self.scan_string(),
            '\'' => return self.scan_char(),
            '+' => {
                if self.eat('+') {
                    TokenKind::PlusPlus
                } else if self.eat('=') {
                    TokenKind::PlusEq
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.eat('-') {
                    TokenKind::MinusMinus
                } else if self.eat('=') {
                    TokenKind::MinusEq
                } else {
                    TokenKind::Minus
                }
            }
            '*' => self.with_eq(TokenKind::Star, TokenKind::StarEq),
            '/' => self.with_eq(TokenKind::Slash, TokenKind::SlashEq),
            '%' => self.with_eq(TokenKind::Percent, TokenKind::PercentEq),
            '^' => self.with_eq(TokenKind::Caret, TokenKind::CaretEq),
            '=' => self.with_eq(TokenKind::Eq, TokenKind::EqEq),
            '!' => self.with_eq(TokenKind::Not, TokenKind::Neq),
            '&' => {
                if self.eat('&') {
                    TokenKind::AndAnd
                } else {
                    self.with_eq(TokenKind::Amp, TokenKind::AmpEq)
                }
            }
            '|' => {
                if self.eat('|') {
                    TokenKind::OrOr
                } else {
                    self.with_eq(TokenKind::Pipe, TokenKind::PipeEq)
                }
            }
            '<' => {
                if self.eat('<') {
                    self.with_eq(TokenKind::Shl, TokenKind::ShlEq)
                } else {
                    self.with_eq(TokenKind::Lt, TokenKind::Le)
                }
            }
            '>' => {
                if self.eat('>') {
                    self.with_eq(TokenKind::Shr, TokenKind::ShrEq)
                } else {
                    self.with_eq(TokenKind::Gt, TokenKind::Ge)
                }
            }
            '~' => TokenKind::Tilde,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '?' => TokenKind::Question,
            ch => {
                return Err(LexError::UnexpectedChar {
                    ch,
                    span: self.span(),
                })
            }
        };
        Ok(self.make_token(kind))
    }

    fn with_eq(
        &mut self,
        plain: TokenKind,
        with_eq: TokenKind,
    ) -> TokenKind {
        if self.eat('=') {
            with_eq
        } else {
            plain
        }
    }

    fn scan_identifier(
        &mut self,
        first: char,
    ) -> Token {
        let mut value = String::from(first);
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                value.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let kind = match value.as_str() {
            "if" => TokenKind::KwIf,
            "else" => TokenKind::KwElse,
            "while" => TokenKind::KwWhile,
            "do" => TokenKind::KwDo,
            "for" => TokenKind::KwFor,
            "return" => TokenKind::KwReturn,
            "break" => TokenKind::KwBreak,
            "continue" => TokenKind::KwContinue,
            "try" => TokenKind::KwTry,
            "catch" => TokenKind::KwCatch,
            "class" => TokenKind::KwClass,
            "TRUE" => TokenKind::IntLiteral(1),
            "FALSE" | "NULL" => TokenKind::IntLiteral(0),
            "HTT_CLASS" => TokenKind::IntLiteral(HTT_CLASS),
            "HTT_FUNCTION" => TokenKind::IntLiteral(HTT_FUNCTION),
            _ => TokenKind::Identifier(value),
        };
        self.make_token(kind)
    }

    fn scan_number(
        &mut self,
        first: char,
    ) -> Result<Token, LexError> {
        let mut text = String::from(first);
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let digits = text.replace('_', "");
        let parsed = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
            u64::from_str_radix(hex, 16)
        } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
            u64::from_str_radix(bin, 2)
        } else {
            digits.parse::<u64>()
        };

        match parsed {
            Ok(value) => Ok(self.make_token(TokenKind::IntLiteral(value as i64))),
            Err(_) => Err(LexError::InvalidNumber {
                text,
                span: self.span(),
            }),
        }
    }

    /// Decode one escape after the backslash.
    fn scan_escape(&mut self) -> Result<char, LexError> {
        let Some(c) = self.advance() else {
            return Err(LexError::UnterminatedString { span: self.span() });
        };
        let decoded = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            'd' => '$',
            ch => {
                return Err(LexError::InvalidEscape {
                    ch,
                    span: self.span(),
                })
            }
        };
        Ok(decoded)
    }

    fn scan_string(&mut self) -> Result<Token, LexError> {
        let mut value = String::new();
        loop {
            match self.advance() {
                Some('"') => break,
                Some('\\') => value.push(self.scan_escape()?),
                Some('\n') | None => {
                    return Err(LexError::UnterminatedString { span: self.span() })
                }
                Some(c) => value.push(c),
            }
        }
        Ok(self.make_token(TokenKind::StringLiteral(value)))
    }

    fn scan_char(&mut self) -> Result<Token, LexError> {
        let mut bytes = Vec::new();
        loop {
            let c = match self.advance() {
                Some('\'') => break,
                Some('\\') => self.scan_escape()?,
                Some('\n') | None => {
                    return Err(LexError::UnterminatedChar { span: self.span() })
                }
                Some(c) => c,
            };
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
        if bytes.len() > 8 {
            return Err(LexError::CharTooLong { span: self.span() });
        }
        let mut packed = [0u8; 8];
        packed[..bytes.len()].copy_from_slice(&bytes);
        Ok(self.make_token(TokenKind::CharLiteral(i64::from_le_bytes(packed))))
    }

    fn make_token(
        &self,
        kind: TokenKind,
    ) -> Token {
        Token {
            kind,
            span: self.span(),
        }
    }
}
