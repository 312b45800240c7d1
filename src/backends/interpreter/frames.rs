//! Call frames for the interpreter
//!
//! A frame holds the lexical scopes of one function activation (or of one
//! top-level unit). Scopes sit behind a `RefCell` so a `try` body and its
//! handler can both reach the frame; borrows never outlive a single lookup.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::frontend::parser::ast::{FunctionDef, TypeRef};

#[derive(Debug, Clone, Copy)]
struct Local {
    ty: TypeRef,
    value: i64,
}

/// One activation.
#[derive(Debug)]
pub struct Frame {
    function: Option<Arc<FunctionDef>>,
    scopes: RefCell<Vec<HashMap<String, Local>>>,
}

impl Frame {
    /// Frame for statements outside any function.
    pub fn top_level() -> Self {
        Self {
            function: None,
            scopes: RefCell::new(vec![HashMap::new()]),
        }
    }

    /// Frame for a call, with parameters bound in the outermost scope.
    pub fn for_call(
        function: Arc<FunctionDef>,
        args: &[i64],
    ) -> Self {
        let params = function
            .params
            .iter()
            .zip(args)
            .map(|(param, &value)| {
                let local = Local {
                    ty: param.ty,
                    value: param.ty.narrow(value),
                };
                (param.name.clone(), local)
            })
            .collect();
        Self {
            function: Some(function),
            scopes: RefCell::new(vec![params]),
        }
    }

    /// Function being executed, `None` at top level.
    #[inline]
    pub fn function(&self) -> Option<&Arc<FunctionDef>> {
        self.function.as_ref()
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.scopes.borrow().len()
    }

    pub fn push_scope(&self) {
        self.scopes.borrow_mut().push(HashMap::new());
    }

    /// Drop scopes until `depth` remain.
    pub fn truncate(
        &self,
        depth: usize,
    ) {
        self.scopes.borrow_mut().truncate(depth.max(1));
    }

    /// Declare `name` in the innermost scope, shadowing outer ones.
    pub fn declare(
        &self,
        name: &str,
        ty: TypeRef,
        value: i64,
    ) {
        let local = Local {
            ty,
            value: ty.narrow(value),
        };
        if let Some(scope) = self.scopes.borrow_mut().last_mut() {
            scope.insert(name.to_string(), local);
        }
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<i64> {
        self.scopes
            .borrow()
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .map(|local| local.value)
    }

    /// Store into the innermost visible `name`; returns the narrowed value.
    pub fn set(
        &self,
        name: &str,
        value: i64,
    ) -> Option<i64> {
        let mut scopes = self.scopes.borrow_mut();
        let local = scopes.iter_mut().rev().find_map(|scope| scope.get_mut(name))?;
        local.value = local.ty.narrow(value);
        Some(local.value)
    }
}
