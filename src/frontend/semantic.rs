//! Structural checks run after parsing

use std::collections::HashSet;

use super::parser::ast::*;
use crate::util::span::Span;

/// A construct that parsed but cannot be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticError {
    pub message: String,
    pub span: Span,
}

impl SemanticError {
    fn new(
        message: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

#[derive(Default)]
struct Checker<'a> {
    loop_depth: usize,
    function: Option<&'a FunctionDef>,
}

/// Check every item of `module`; reports the first problem found.
pub fn check_module(module: &Module) -> Result<(), SemanticError> {
    for item in &module.items {
        match item {
            Item::Function(function) => check_function(function)?,
            Item::Class(class) => check_class(class)?,
            Item::Global(decls) => check_decls(decls)?,
            Item::Stmt(stmt) => Checker::default().stmt(stmt)?,
        }
    }
    Ok(())
}

fn check_function(function: &FunctionDef) -> Result<(), SemanticError> {
    let mut seen = HashSet::new();
    for param in &function.params {
        if !seen.insert(param.name.as_str()) {
            return Err(SemanticError::new(
                format!("duplicate parameter `{}` in `{}`", param.name, function.name),
                function.span,
            ));
        }
        if param.ty.is_void() {
            return Err(SemanticError::new(
                format!("parameter `{}` has type U0", param.name),
                function.span,
            ));
        }
    }

    let mut checker = Checker {
        loop_depth: 0,
        function: Some(function),
    };
    for stmt in &function.body {
        checker.stmt(stmt)?;
    }
    Ok(())
}

fn check_decls(decls: &[VarDecl]) -> Result<(), SemanticError> {
    match decls.iter().find(|decl| decl.ty.is_void()) {
        Some(decl) => Err(SemanticError::new(
            format!("variable `{}` has type U0", decl.name),
            decl.span,
        )),
        None => Ok(()),
    }
}

fn check_class(class: &ClassDef) -> Result<(), SemanticError> {
    let mut seen = HashSet::new();
    for field in &class.fields {
        if !seen.insert(field.name.as_str()) {
            return Err(SemanticError::new(
                format!("duplicate member `{}` in class `{}`", field.name, class.name),
                class.span,
            ));
        }
        if field.ty.is_void() {
            return Err(SemanticError::new(
                format!("member `{}` has type U0", field.name),
                class.span,
            ));
        }
    }
    Ok(())
}

impl<'a> Checker<'a> {
    fn stmt(
        &mut self,
        stmt: &Stmt,
    ) -> Result<(), SemanticError> {
        match stmt {
            Stmt::Block(stmts) => stmts.iter().try_for_each(|s| self.stmt(s)),
            Stmt::Try { body, handler } => body
                .iter()
                .chain(handler.iter())
                .try_for_each(|s| self.stmt(s)),
            Stmt::If {
                then, otherwise, ..
            } => {
                self.stmt(then)?;
                match otherwise {
                    Some(otherwise) => self.stmt(otherwise),
                    None => Ok(()),
                }
            }
            Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => self.in_loop(body),
            Stmt::For { init, body, .. } => {
                if let Some(init) = init {
                    self.stmt(init)?;
                }
                self.in_loop(body)
            }
            Stmt::Decl(decls) => check_decls(decls),
            Stmt::Break(span) if self.loop_depth == 0 => {
                Err(SemanticError::new("`break` outside of a loop", *span))
            }
            Stmt::Continue(span) if self.loop_depth == 0 => {
                Err(SemanticError::new("`continue` outside of a loop", *span))
            }
            Stmt::Return { value, span } => match self.function {
                None => Err(SemanticError::new("`return` outside of a function", *span)),
                Some(function) if function.ret.is_void() && value.is_some() => {
                    Err(SemanticError::new(
                        format!("U0 function `{}` returns a value", function.name),
                        *span,
                    ))
                }
                Some(_) => Ok(()),
            },
            _ => Ok(()),
        }
    }

    fn in_loop(
        &mut self,
        body: &Stmt,
    ) -> Result<(), SemanticError> {
        self.loop_depth += 1;
        let result = self.stmt(body);
        self.loop_depth -= 1;
        result
    }
}
