//! Pratt parser expression parsing

use super::super::lexer::tokens::*;
use super::ast::*;
use super::state::*;
use super::ParseError;

/// What an infix token does once the left operand is parsed.
#[derive(Debug, Clone, Copy)]
enum Infix {
    Binary(BinOp),
    Logical { and: bool },
    Assign(Option<BinOp>),
    Conditional,
    Postfix { increment: bool },
}

/// Left binding power and meaning of an infix token.
fn infix_info(kind: &TokenKind) -> Option<(u8, Infix)> {
    let info = match kind {
        TokenKind::Eq => (BP_ASSIGN, Infix::Assign(None)),
        TokenKind::PlusEq => (BP_ASSIGN, Infix::Assign(Some(BinOp::Add))),
        TokenKind::MinusEq => (BP_ASSIGN, Infix::Assign(Some(BinOp::Sub))),
        TokenKind::StarEq => (BP_ASSIGN, Infix::Assign(Some(BinOp::Mul))),
        TokenKind::SlashEq => (BP_ASSIGN, Infix::Assign(Some(BinOp::Div))),
        TokenKind::PercentEq => (BP_ASSIGN, Infix::Assign(Some(BinOp::Rem))),
        TokenKind::AmpEq => (BP_ASSIGN, Infix::Assign(Some(BinOp::BitAnd))),
        TokenKind::PipeEq => (BP_ASSIGN, Infix::Assign(Some(BinOp::BitOr))),
        TokenKind::CaretEq => (BP_ASSIGN, Infix::Assign(Some(BinOp::BitXor))),
        TokenKind::ShlEq => (BP_ASSIGN, Infix::Assign(Some(BinOp::Shl))),
        TokenKind::ShrEq => (BP_ASSIGN, Infix::Assign(Some(BinOp::Shr))),
        TokenKind::Question => (BP_COND, Infix::Conditional),
        TokenKind::OrOr => (BP_OR, Infix::Logical { and: false }),
        TokenKind::AndAnd => (BP_AND, Infix::Logical { and: true }),
        TokenKind::EqEq => (BP_EQ, Infix::Binary(BinOp::Eq)),
        TokenKind::Neq => (BP_EQ, Infix::Binary(BinOp::Ne)),
        TokenKind::Lt => (BP_CMP, Infix::Binary(BinOp::Lt)),
        TokenKind::Le => (BP_CMP, Infix::Binary(BinOp::Le)),
        TokenKind::Gt => (BP_CMP, Infix::Binary(BinOp::Gt)),
        TokenKind::Ge => (BP_CMP, Infix::Binary(BinOp::Ge)),
        TokenKind::Plus => (BP_ADD, Infix::Binary(BinOp::Add)),
        TokenKind::Minus => (BP_ADD, Infix::Binary(BinOp::Sub)),
        TokenKind::Pipe => (BP_BIT_OR, Infix::Binary(BinOp::BitOr)),
        TokenKind::Caret => (BP_BIT_XOR, Infix::Binary(BinOp::BitXor)),
        TokenKind::Amp => (BP_BIT_AND, Infix::Binary(BinOp::BitAnd)),
        TokenKind::Star => (BP_MUL, Infix::Binary(BinOp::Mul)),
        TokenKind::Slash => (BP_MUL, Infix::Binary(BinOp::Div)),
        TokenKind::Percent => (BP_MUL, Infix::Binary(BinOp::Rem)),
        TokenKind::Shl => (BP_SHIFT, Infix::Binary(BinOp::Shl)),
        TokenKind::Shr => (BP_SHIFT, Infix::Binary(BinOp::Shr)),
        TokenKind::PlusPlus => (BP_POSTFIX, Infix::Postfix { increment: true }),
        TokenKind::MinusMinus => (BP_POSTFIX, Infix::Postfix { increment: false }),
        _ => return None,
    };
    Some(info)
}

impl<'a> ParserState<'a> {
    /// Parse an expression whose operators bind at least as tightly as `min_bp`.
    ///
    /// Binary operators are left associative; assignment and `?:` are right
    /// associative.
    pub fn parse_expression(
        &mut self,
        min_bp: u8,
    ) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_prefix()?;

        while let Some((left_bp, infix)) = infix_info(self.kind()) {
            if left_bp < min_bp {
                break;
            }
            let op = self.bump();
            lhs = match infix {
                Infix::Binary(op_kind) => {
                    let rhs = self.parse_expression(left_bp + 1)?;
                    Expr::Binary {
                        op: op_kind,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                        span: op.span,
                    }
                }
                Infix::Logical { and } => {
                    let rhs = self.parse_expression(left_bp + 1)?;
                    Expr::Logical {
                        and,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    }
                }
                Infix::Assign(compound) => {
                    let target = assign_target(lhs, &op)?;
                    let value = self.parse_expression(left_bp)?;
                    Expr::Assign {
                        target,
                        op: compound,
                        value: Box::new(value),
                        span: op.span,
                    }
                }
                Infix::Conditional => {
                    let then = self.parse_expression(BP_LOWEST)?;
                    self.expect(&TokenKind::Colon)?;
                    let otherwise = self.parse_expression(left_bp)?;
                    Expr::Conditional {
                        cond: Box::new(lhs),
                        then: Box::new(then),
                        otherwise: Box::new(otherwise),
                    }
                }
                Infix::Postfix { increment } => Expr::Step {
                    target: assign_target(lhs, &op)?,
                    increment,
                    prefix: false,
                    span: op.span,
                },
            };
        }

        Ok(lhs)
    }

    /// Prefix position (nud): literals, names, calls, unary operators.
    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::IntLiteral(value) | TokenKind::CharLiteral(value) => {
                self.bump();
                Ok(Expr::Int(value))
            }
            TokenKind::StringLiteral(text) => {
                self.bump();
                Ok(Expr::Str(text))
            }
            TokenKind::Identifier(name) => {
                self.bump();
                if self.at(&TokenKind::LParen) {
                    let args = self.parse_call_args()?;
                    Ok(Expr::Call {
                        callee: name,
                        args,
                        span: token.span,
                    })
                } else {
                    Ok(Expr::Var {
                        name,
                        span: token.span,
                    })
                }
            }
            TokenKind::Amp => {
                self.bump();
                let (name, span) = self.expect_ident()?;
                Ok(Expr::FuncRef { name, span })
            }
            TokenKind::LParen => {
                self.bump();
                let expr = self.parse_expression(BP_LOWEST)?;
                self.expect(&TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::Plus => {
                self.bump();
                self.parse_expression(BP_UNARY)
            }
            TokenKind::Minus | TokenKind::Not | TokenKind::Tilde => {
                self.bump();
                let op = match token.kind {
                    TokenKind::Minus => UnOp::Neg,
                    TokenKind::Not => UnOp::Not,
                    _ => UnOp::BitNot,
                };
                let expr = self.parse_expression(BP_UNARY)?;
                Ok(Expr::Unary {
                    op,
                    expr: Box::new(expr),
                })
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                self.bump();
                let (target, span) = self.expect_ident()?;
                Ok(Expr::Step {
                    target,
                    increment: token.kind == TokenKind::PlusPlus,
                    prefix: true,
                    span,
                })
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    /// `( [arg] {, [arg]} )`; an empty slot takes the parameter's default.
    fn parse_call_args(&mut self) -> Result<Vec<Option<Expr>>, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if self.skip(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            if self.at(&TokenKind::Comma) || self.at(&TokenKind::RParen) {
                args.push(None);
            } else {
                args.push(Some(self.parse_expression(BP_ASSIGN)?));
            }
            if self.skip(&TokenKind::Comma) {
                continue;
            }
            self.expect(&TokenKind::RParen)?;
            return Ok(args);
        }
    }
}

fn assign_target(
    lhs: Expr,
    op: &Token,
) -> Result<String, ParseError> {
    match lhs {
        Expr::Var { name, .. } => Ok(name),
        _ => Err(ParseError::InvalidAssignTarget {
            op: op.kind.clone(),
            span: op.span,
        }),
    }
}
