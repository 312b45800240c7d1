//! Statement parsing

use super::super::lexer::tokens::*;
use super::ast::*;
use super::state::*;
use super::ParseError;

impl<'a> ParserState<'a> {
    /// Parse a statement
    pub fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.kind() {
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::Semicolon => {
                self.bump();
                Ok(Stmt::Empty)
            }
            TokenKind::KwIf => self.parse_if(),
            TokenKind::KwWhile => {
                self.bump();
                let cond = self.parse_condition()?;
                let body = Box::new(self.parse_stmt()?);
                Ok(Stmt::While { cond, body })
            }
            TokenKind::KwDo => {
                self.bump();
                let body = Box::new(self.parse_stmt()?);
                self.expect(&TokenKind::KwWhile)?;
                let cond = self.parse_condition()?;
                self.expect(&TokenKind::Semicolon)?;
                Ok(Stmt::DoWhile { body, cond })
            }
            TokenKind::KwFor => self.parse_for(),
            TokenKind::KwReturn => {
                let span = self.bump().span;
                let value = if self.at(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression(BP_LOWEST)?)
                };
                self.expect(&TokenKind::Semicolon)?;
                Ok(Stmt::Return { value, span })
            }
            TokenKind::KwBreak => {
                let span = self.bump().span;
                self.expect(&TokenKind::Semicolon)?;
                Ok(Stmt::Break(span))
            }
            TokenKind::KwContinue => {
                let span = self.bump().span;
                self.expect(&TokenKind::Semicolon)?;
                Ok(Stmt::Continue(span))
            }
            TokenKind::KwTry => {
                self.bump();
                let body = self.parse_block()?;
                self.expect(&TokenKind::KwCatch)?;
                let handler = self.parse_block()?;
                Ok(Stmt::Try { body, handler })
            }
            TokenKind::StringLiteral(_)
                if matches!(self.peek_kind(1), TokenKind::Comma | TokenKind::Semicolon) =>
            {
                self.parse_print()
            }
            _ if self.at_type().is_some() => {
                let base = self.parse_base_type()?;
                Ok(Stmt::Decl(self.parse_declarators(base)?))
            }
            _ => {
                let expr = self.parse_expression(BP_LOWEST)?;
                self.expect(&TokenKind::Semicolon)?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    /// `{ stmt* }`
    pub fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.skip(&TokenKind::RBrace) {
            if self.at_end() {
                return Err(self.unexpected(&TokenKind::RBrace.to_string()));
            }
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    /// `( expr )`
    fn parse_condition(&mut self) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let cond = self.parse_expression(BP_LOWEST)?;
        self.expect(&TokenKind::RParen)?;
        Ok(cond)
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&TokenKind::KwIf)?;
        let cond = self.parse_condition()?;
        let then = Box::new(self.parse_stmt()?);
        let otherwise = if self.skip(&TokenKind::KwElse) {
            Some(Box::new(self.parse_stmt()?))
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then,
            otherwise,
        })
    }

    /// `for (init; cond; step) body`, every clause optional.
    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&TokenKind::KwFor)?;
        self.expect(&TokenKind::LParen)?;

        let init = if self.skip(&TokenKind::Semicolon) {
            None
        } else if self.at_type().is_some() {
            let base = self.parse_base_type()?;
            Some(Box::new(Stmt::Decl(self.parse_declarators(base)?)))
        } else {
            let expr = self.parse_expression(BP_LOWEST)?;
            self.expect(&TokenKind::Semicolon)?;
            Some(Box::new(Stmt::Expr(expr)))
        };

        let cond = if self.at(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression(BP_LOWEST)?)
        };
        self.expect(&TokenKind::Semicolon)?;

        let step = if self.at(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression(BP_LOWEST)?)
        };
        self.expect(&TokenKind::RParen)?;

        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt::For {
            init,
            cond,
            step,
            body,
        })
    }

    /// `"format" {, arg} ;`
    fn parse_print(&mut self) -> Result<Stmt, ParseError> {
        let format = match self.bump().kind {
            TokenKind::StringLiteral(text) => text,
            _ => return Err(self.unexpected("string literal")),
        };
        let mut args = Vec::new();
        while self.skip(&TokenKind::Comma) {
            args.push(self.parse_expression(BP_ASSIGN)?);
        }
        self.expect(&TokenKind::Semicolon)?;
        Ok(Stmt::Print { format, args })
    }

    /// Declarators after the base type: `*a = 1, b;`
    pub fn parse_declarators(
        &mut self,
        base: TypeName,
    ) -> Result<Vec<VarDecl>, ParseError> {
        let mut decls = Vec::new();
        loop {
            let ty = self.parse_pointers(base);
            let (name, span) = self.expect_ident()?;
            decls.push(self.parse_declarator_rest(name, ty, span)?);
            if !self.skip(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::Semicolon)?;
        Ok(decls)
    }

    /// Optional `= init` of a declarator whose name was already read.
    pub fn parse_declarator_rest(
        &mut self,
        name: String,
        ty: TypeRef,
        span: crate::util::span::Span,
    ) -> Result<VarDecl, ParseError> {
        let init = if self.skip(&TokenKind::Eq) {
            Some(self.parse_expression(BP_ASSIGN)?)
        } else {
            None
        };
        Ok(VarDecl {
            name,
            ty,
            init,
            span,
        })
    }
}
