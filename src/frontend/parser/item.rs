//! Top-level item parsing: functions, classes and globals

use std::sync::Arc;

use super::super::lexer::tokens::*;
use super::ast::*;
use super::state::*;
use super::ParseError;

impl<'a> ParserState<'a> {
    /// Parse one top-level item.
    pub fn parse_item(&mut self) -> Result<Item, ParseError> {
        if self.at(&TokenKind::KwClass) {
            return Ok(Item::Class(self.parse_class()?));
        }
        let Some(base) = self.at_type() else {
            return Ok(Item::Stmt(self.parse_stmt()?));
        };

        self.bump();
        let ty = self.parse_pointers(base);
        let (name, span) = self.expect_ident()?;
        if self.at(&TokenKind::LParen) {
            let params = self.parse_params()?;
            let body = self.parse_block()?;
            return Ok(Item::Function(Arc::new(FunctionDef {
                name,
                ret: ty,
                params,
                body,
                span,
            })));
        }

        let mut decls = vec![self.parse_declarator_rest(name, ty, span)?];
        while self.skip(&TokenKind::Comma) {
            let ty = self.parse_pointers(base);
            let (name, span) = self.expect_ident()?;
            decls.push(self.parse_declarator_rest(name, ty, span)?);
        }
        self.expect(&TokenKind::Semicolon)?;
        Ok(Item::Global(decls))
    }

    /// `( [Type name [= default]] {, ...} )`; `(U0)` means no parameters.
    fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if self.skip(&TokenKind::RParen) {
            return Ok(params);
        }
        if self.at_type() == Some(TypeName::U0) && self.peek_kind(1) == &TokenKind::RParen {
            self.bump();
            self.bump();
            return Ok(params);
        }
        loop {
            let base = self.parse_base_type()?;
            let ty = self.parse_pointers(base);
            let (name, _) = self.expect_ident()?;
            let default = if self.skip(&TokenKind::Eq) {
                Some(self.parse_expression(BP_ASSIGN)?)
            } else {
                None
            };
            params.push(Param { name, ty, default });
            if !self.skip(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(params)
    }

    /// `class Name { Type field annotations...; ... };`
    fn parse_class(&mut self) -> Result<ClassDef, ParseError> {
        let span = self.expect(&TokenKind::KwClass)?;
        let (name, _) = self.expect_ident()?;
        self.expect(&TokenKind::LBrace)?;

        let mut fields = Vec::new();
        while !self.skip(&TokenKind::RBrace) {
            let base = self.parse_base_type()?;
            loop {
                let ty = self.parse_pointers(base);
                let (field, _) = self.expect_ident()?;
                let annotations = self.parse_annotations()?;
                fields.push(FieldDef {
                    name: field,
                    ty,
                    annotations,
                });
                if !self.skip(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::Semicolon)?;
        }
        self.skip(&TokenKind::Semicolon);

        Ok(ClassDef { name, fields, span })
    }

    /// Annotation tokens after a member name, re-joined into source form.
    fn parse_annotations(&mut self) -> Result<String, ParseError> {
        let mut parts: Vec<String> = Vec::new();
        loop {
            let part = match self.kind() {
                TokenKind::Semicolon | TokenKind::Comma => break,
                TokenKind::Identifier(word) => word.clone(),
                TokenKind::IntLiteral(n) | TokenKind::CharLiteral(n) => n.to_string(),
                TokenKind::Minus => "-".to_string(),
                TokenKind::StringLiteral(text) => quote(text),
                _ => return Err(self.unexpected("member annotation")),
            };
            self.bump();
            match parts.last_mut() {
                Some(last) if last == "-" => last.push_str(&part),
                _ => parts.push(part),
            }
        }
        Ok(parts.join(" "))
    }
}

fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
