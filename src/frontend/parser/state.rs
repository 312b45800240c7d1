//! Parser state and token stream management

use super::super::lexer::tokens::*;
use super::ast::{TypeName, TypeRef};
use super::ParseError;
use crate::util::span::Span;

/// Binding power levels for the Pratt parser.
///
/// HolyC ordering: shifts bind tighter than multiplication, and the bitwise
/// operators sit between multiplication and addition.
pub const BP_LOWEST: u8 = 0;
pub const BP_ASSIGN: u8 = 10;
pub const BP_COND: u8 = 15;
pub const BP_OR: u8 = 20;
pub const BP_AND: u8 = 30;
pub const BP_EQ: u8 = 40;
pub const BP_CMP: u8 = 50;
pub const BP_ADD: u8 = 60;
pub const BP_BIT_OR: u8 = 62;
pub const BP_BIT_XOR: u8 = 64;
pub const BP_BIT_AND: u8 = 66;
pub const BP_MUL: u8 = 70;
pub const BP_SHIFT: u8 = 75;
pub const BP_UNARY: u8 = 80;
pub const BP_POSTFIX: u8 = 90;

/// Parser state: a cursor over a token stream ending in `Eof`.
#[derive(Debug)]
pub struct ParserState<'a> {
    tokens: &'a [Token],
    pos: usize,
    eof: Token,
}

impl<'a> ParserState<'a> {
    /// Create a new parser state
    #[inline]
    pub fn new(tokens: &'a [Token]) -> Self {
        let end = tokens.last().map(|t| t.span).unwrap_or_else(Span::dummy);
        Self {
            tokens,
            pos: 0,
            eof: Token {
                kind: TokenKind::Eof,
                span: end,
            },
        }
    }

    /// Check if at end of token stream
    #[inline]
    pub fn at_end(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    /// Get current token
    #[inline]
    pub fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    #[inline]
    pub fn kind(&self) -> &TokenKind {
        &self.current().kind
    }

    /// Kind of the token `n` positions ahead.
    #[inline]
    pub fn peek_kind(
        &self,
        n: usize,
    ) -> &TokenKind {
        self.tokens.get(self.pos + n).map(|t| &t.kind).unwrap_or(&TokenKind::Eof)
    }

    #[inline]
    pub fn at(
        &self,
        kind: &TokenKind,
    ) -> bool {
        self.kind() == kind
    }

    #[inline]
    pub fn span(&self) -> Span {
        self.current().span
    }

    /// Advance to next token, returning the one passed over.
    #[inline]
    pub fn bump(&mut self) -> Token {
        let token = self.current().clone();
        if !self.at_end() {
            self.pos += 1;
        }
        token
    }

    /// Skip a specific token
    #[inline]
    pub fn skip(
        &mut self,
        kind: &TokenKind,
    ) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Expect a specific token
    pub fn expect(
        &mut self,
        kind: &TokenKind,
    ) -> Result<Span, ParseError> {
        if self.at(kind) {
            Ok(self.bump().span)
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    pub fn expect_ident(&mut self) -> Result<(String, Span), ParseError> {
        match self.kind() {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                Ok((name, self.bump().span))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// Error for the current token, which did not match `expected`.
    pub fn unexpected(
        &self,
        expected: &str,
    ) -> ParseError {
        let token = self.current();
        match token.kind {
            TokenKind::Eof => ParseError::UnexpectedEof {
                expected: expected.to_string(),
                span: token.span,
            },
            _ => ParseError::UnexpectedToken {
                found: token.kind.clone(),
                expected: expected.to_string(),
                span: token.span,
            },
        }
    }

    /// Primitive type named by the current token, if any.
    #[inline]
    pub fn at_type(&self) -> Option<TypeName> {
        match self.kind() {
            TokenKind::Identifier(name) => TypeName::from_name(name),
            _ => None,
        }
    }

    /// Parse `Type` without pointer stars.
    pub fn parse_base_type(&mut self) -> Result<TypeName, ParseError> {
        match self.at_type() {
            Some(ty) => {
                self.bump();
                Ok(ty)
            }
            None => Err(self.unexpected("type name")),
        }
    }

    /// Parse any `*` following a base type.
    pub fn parse_pointers(
        &mut self,
        base: TypeName,
    ) -> TypeRef {
        let mut ty = TypeRef::new(base);
        while self.skip(&TokenKind::Star) {
            ty.pointers += 1;
        }
        ty
    }

    /// Check if current token can start an expression
    #[inline]
    pub fn can_start_expr(&self) -> bool {
        matches!(
            self.kind(),
            TokenKind::IntLiteral(_)
                | TokenKind::CharLiteral(_)
                | TokenKind::StringLiteral(_)
                | TokenKind::Identifier(_)
                | TokenKind::Minus
                | TokenKind::Plus
                | TokenKind::Not
                | TokenKind::Tilde
                | TokenKind::Amp
                | TokenKind::PlusPlus
                | TokenKind::MinusMinus
                | TokenKind::LParen
        )
    }
}
