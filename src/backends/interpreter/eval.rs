//! Statement execution and expression evaluation

use std::sync::Arc;

use super::executor::Shared;
use super::ffi;
use super::frames::Frame;
use crate::frontend::parser::ast::{BinOp, Expr, Stmt, UnOp, VarDecl};
use crate::runtime::except;
use crate::runtime::{RuntimeError, RuntimeResult};

/// How a statement finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(i64),
}

impl Shared {
    /// Run `stmts` in a new scope.
    pub(crate) fn exec_block(
        self: &Arc<Self>,
        frame: &Frame,
        stmts: &[Stmt],
    ) -> RuntimeResult<Flow> {
        let depth = frame.depth();
        frame.push_scope();
        let mut flow = Ok(Flow::Normal);
        for stmt in stmts {
            flow = self.exec(frame, stmt);
            if !matches!(flow, Ok(Flow::Normal)) {
                break;
            }
        }
        frame.truncate(depth);
        flow
    }

    pub(crate) fn exec(
        self: &Arc<Self>,
        frame: &Frame,
        stmt: &Stmt,
    ) -> RuntimeResult<Flow> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(frame, expr)?;
                Ok(Flow::Normal)
            }
            Stmt::Print { format, args } => {
                let values = args
                    .iter()
                    .map(|arg| self.eval(frame, arg))
                    .collect::<RuntimeResult<Vec<_>>>()?;
                self.runtime().print_formatted(format, &values);
                Ok(Flow::Normal)
            }
            Stmt::Block(stmts) => self.exec_block(frame, stmts),
            Stmt::Decl(decls) => {
                self.declare(frame, decls)?;
                Ok(Flow::Normal)
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(frame, cond)? != 0 {
                    self.exec(frame, then)
                } else if let Some(otherwise) = otherwise {
                    self.exec(frame, otherwise)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { cond, body } => {
                while self.eval(frame, cond)? != 0 {
                    match self.exec(frame, body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::DoWhile { body, cond } => {
                loop {
                    match self.exec(frame, body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if self.eval(frame, cond)? == 0 {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                let depth = frame.depth();
                frame.push_scope();
                let flow = self.exec_for(frame, init.as_deref(), cond.as_ref(), step.as_ref(), body);
                frame.truncate(depth);
                flow
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval(frame, expr)?,
                    None => 0,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Break(_) => Ok(Flow::Break),
            Stmt::Continue(_) => Ok(Flow::Continue),
            Stmt::Try { body, handler } => {
                let depth = frame.depth();
                except::try_catch(
                    || {
                        let flow = self.exec_block(frame, body);
                        frame.truncate(depth);
                        flow
                    },
                    |_payload| {
                        frame.truncate(depth);
                        self.exec_block(frame, handler)
                    },
                )
            }
            Stmt::Empty => Ok(Flow::Normal),
        }
    }

    fn exec_for(
        self: &Arc<Self>,
        frame: &Frame,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        step: Option<&Expr>,
        body: &Stmt,
    ) -> RuntimeResult<Flow> {
        if let Some(init) = init {
            self.exec(frame, init)?;
        }
        loop {
            if let Some(cond) = cond {
                if self.eval(frame, cond)? == 0 {
                    break;
                }
            }
            match self.exec(frame, body)? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
            if let Some(step) = step {
                self.eval(frame, step)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn declare(
        self: &Arc<Self>,
        frame: &Frame,
        decls: &[VarDecl],
    ) -> RuntimeResult<()> {
        for decl in decls {
            let value = match &decl.init {
                Some(init) => self.eval(frame, init)?,
                None => 0,
            };
            frame.declare(&decl.name, decl.ty, value);
        }
        Ok(())
    }

    /// Whether `expr` is a call producing no value.
    pub(crate) fn is_void(
        &self,
        expr: &Expr,
    ) -> bool {
        match expr {
            Expr::Call { callee, .. } => match self.function(callee) {
                Some(def) => def.ret.is_void(),
                None => ffi::lookup(callee).is_some_and(|builtin| builtin.void),
            },
            _ => false,
        }
    }

    pub(crate) fn eval(
        self: &Arc<Self>,
        frame: &Frame,
        expr: &Expr,
    ) -> RuntimeResult<i64> {
        match expr {
            Expr::Int(value) => Ok(*value),
            Expr::Str(text) => self.intern(text),
            Expr::Var { name, .. } => self.load(frame, name),
            Expr::FuncRef { name, .. } => {
                if self.function(name).is_none() {
                    return Err(RuntimeError::eval(format!("unknown function `{}`", name)));
                }
                self.intern(name)
            }
            Expr::Call { callee, args, .. } => self.eval_call(frame, callee, args),
            Expr::Unary { op, expr } => {
                let value = self.eval(frame, expr)?;
                Ok(match op {
                    UnOp::Neg => value.wrapping_neg(),
                    UnOp::Not => (value == 0) as i64,
                    UnOp::BitNot => !value,
                })
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                let lhs = self.eval(frame, lhs)?;
                let rhs = self.eval(frame, rhs)?;
                binary(*op, lhs, rhs)
            }
            Expr::Logical { and, lhs, rhs } => {
                let lhs = self.eval(frame, lhs)? != 0;
                if lhs != *and {
                    return Ok(lhs as i64);
                }
                Ok((self.eval(frame, rhs)? != 0) as i64)
            }
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(frame, cond)? != 0 {
                    self.eval(frame, then)
                } else {
                    self.eval(frame, otherwise)
                }
            }
            Expr::Assign {
                target, op, value, ..
            } => {
                let value = self.eval(frame, value)?;
                let value = match op {
                    Some(op) => binary(*op, self.load(frame, target)?, value)?,
                    None => value,
                };
                self.store(frame, target, value)
            }
            Expr::Step {
                target,
                increment,
                prefix,
                ..
            } => {
                let old = self.load(frame, target)?;
                let delta = if *increment { 1 } else { -1 };
                let new = self.store(frame, target, old.wrapping_add(delta))?;
                Ok(if *prefix { new } else { old })
            }
        }
    }

    fn load(
        &self,
        frame: &Frame,
        name: &str,
    ) -> RuntimeResult<i64> {
        if let Some(value) = frame.get(name) {
            return Ok(value);
        }
        self.global(name)
            .map(|var| var.load())
            .ok_or_else(|| RuntimeError::eval(format!("unknown variable `{}`", name)))
    }

    fn store(
        &self,
        frame: &Frame,
        name: &str,
        value: i64,
    ) -> RuntimeResult<i64> {
        if let Some(stored) = frame.set(name, value) {
            return Ok(stored);
        }
        self.global(name)
            .map(|var| var.store(value))
            .ok_or_else(|| RuntimeError::eval(format!("unknown variable `{}`", name)))
    }

    fn eval_call(
        self: &Arc<Self>,
        frame: &Frame,
        callee: &str,
        args: &[Option<Expr>],
    ) -> RuntimeResult<i64> {
        if let Some(def) = self.function(callee) {
            if args.len() > def.params.len() {
                return Err(RuntimeError::eval(format!(
                    "`{}` takes {} arguments, {} given",
                    callee,
                    def.params.len(),
                    args.len()
                )));
            }
            let mut values = Vec::with_capacity(def.params.len());
            for (index, param) in def.params.iter().enumerate() {
                let value = match (args.get(index).and_then(Option::as_ref), &param.default) {
                    (Some(arg), _) => self.eval(frame, arg)?,
                    (None, Some(default)) => self.eval_default(default)?,
                    (None, None) => {
                        return Err(RuntimeError::eval(format!(
                            "missing argument `{}` of `{}`",
                            param.name, callee
                        )))
                    }
                };
                values.push(value);
            }
            return self.call_function(&def, &values);
        }

        let Some(builtin) = ffi::lookup(callee) else {
            return Err(RuntimeError::eval(format!("unknown function `{}`", callee)));
        };
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(match arg {
                Some(arg) => Some(self.eval(frame, arg)?),
                None => None,
            });
        }
        let values = builtin.bind(&values)?;
        (builtin.handler)(self, &values)
    }
}

fn binary(
    op: BinOp,
    lhs: i64,
    rhs: i64,
) -> RuntimeResult<i64> {
    let value = match op {
        BinOp::Add => lhs.wrapping_add(rhs),
        BinOp::Sub => lhs.wrapping_sub(rhs),
        BinOp::Mul => lhs.wrapping_mul(rhs),
        BinOp::Div | BinOp::Rem if rhs == 0 => {
            return Err(RuntimeError::eval("division by zero"));
        }
        BinOp::Div => lhs.wrapping_div(rhs),
        BinOp::Rem => lhs.wrapping_rem(rhs),
        BinOp::Shl => lhs.wrapping_shl(rhs as u32),
        BinOp::Shr => lhs.wrapping_shr(rhs as u32),
        BinOp::BitAnd => lhs & rhs,
        BinOp::BitOr => lhs | rhs,
        BinOp::BitXor => lhs ^ rhs,
        BinOp::Lt => (lhs < rhs) as i64,
        BinOp::Le => (lhs <= rhs) as i64,
        BinOp::Gt => (lhs > rhs) as i64,
        BinOp::Ge => (lhs >= rhs) as i64,
        BinOp::Eq => (lhs == rhs) as i64,
        BinOp::Ne => (lhs != rhs) as i64,
    };
    Ok(value)
}
