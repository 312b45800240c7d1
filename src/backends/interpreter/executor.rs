//! Tree-walking executor for compiled HolyC units
//!
//! All mutable session state lives in [`Shared`]: the global symbol mapping,
//! interned string literals and job handles. Tasks and jobs hold a weak
//! reference to it and resolve functions by name when they run, so every call
//! sees the binding current at the time it executes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::eval::Flow;
use super::ffi;
use super::frames::Frame;
use crate::backends::Executor;
use crate::frontend::parser::ast::{FunctionDef, Item, Stmt, TypeRef};
use crate::frontend::CompiledUnit;
use crate::runtime::context::{run_in_context, ExecContext};
use crate::runtime::except;
use crate::runtime::reflect::{FunctionEntry, HashEntry, HashTables};
use crate::runtime::scheduler::{EntryFn, JobHandle};
use crate::runtime::{Runtime, RuntimeError, RuntimeResult};

/// A global variable; readable and writable from any context.
#[derive(Debug)]
pub(crate) struct GlobalVar {
    ty: TypeRef,
    value: AtomicI64,
}

impl GlobalVar {
    fn new(
        ty: TypeRef,
        value: i64,
    ) -> Self {
        Self {
            ty,
            value: AtomicI64::new(ty.narrow(value)),
        }
    }

    #[inline]
    pub(crate) fn load(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    #[inline]
    pub(crate) fn store(
        &self,
        value: i64,
    ) -> i64 {
        let value = self.ty.narrow(value);
        self.value.store(value, Ordering::SeqCst);
        value
    }
}

/// The session's global symbol mapping.
#[derive(Debug, Default)]
struct Globals {
    functions: HashMap<String, Arc<FunctionDef>>,
    vars: HashMap<String, Arc<GlobalVar>>,
}

/// State shared by every context executing code of one interpreter.
#[derive(Debug)]
pub(crate) struct Shared {
    runtime: Arc<Runtime>,
    globals: RwLock<Globals>,
    strings: Mutex<HashMap<String, i64>>,
    /// Jobs by id. Once read, a handle is replaced by its result so the job
    /// itself is dropped while `JobResGet` stays repeatable.
    jobs: Mutex<HashMap<i64, JobRecord>>,
}

#[derive(Debug, Clone)]
enum JobRecord {
    Queued(JobHandle),
    Done(RuntimeResult<i64>),
}

impl Shared {
    #[inline]
    pub(crate) fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub(crate) fn function(
        &self,
        name: &str,
    ) -> Option<Arc<FunctionDef>> {
        self.globals.read().functions.get(name).cloned()
    }

    pub(crate) fn global(
        &self,
        name: &str,
    ) -> Option<Arc<GlobalVar>> {
        self.globals.read().vars.get(name).cloned()
    }

    /// Heap address of the interned string literal `text`.
    pub(crate) fn intern(
        &self,
        text: &str,
    ) -> RuntimeResult<i64> {
        let mut strings = self.strings.lock();
        if let Some(&addr) = strings.get(text) {
            return Ok(addr);
        }
        let addr = self.runtime.alloc_string(text)? as i64;
        strings.insert(text.to_string(), addr);
        Ok(addr)
    }

    pub(crate) fn remember_job(
        &self,
        handle: JobHandle,
    ) -> i64 {
        let id = handle.id().0 as i64;
        self.jobs.lock().insert(id, JobRecord::Queued(handle));
        id
    }

    /// `JobResGet` on the job with `id`.
    pub(crate) fn job_result(
        &self,
        id: i64,
    ) -> RuntimeResult<i64> {
        let record = self
            .jobs
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| RuntimeError::eval(format!("JobResGet: no job {}", id)))?;
        match record {
            JobRecord::Done(result) => result,
            JobRecord::Queued(handle) => {
                let result = self.runtime.job_res_get(&handle);
                self.jobs.lock().insert(id, JobRecord::Done(result.clone()));
                result
            }
        }
    }

    /// Jobs whose result has not been read yet.
    pub(crate) fn unread_jobs(&self) -> usize {
        self.jobs
            .lock()
            .values()
            .filter(|record| matches!(record, JobRecord::Queued(_)))
            .count()
    }

    fn install_function(
        self: &Arc<Self>,
        def: &Arc<FunctionDef>,
    ) {
        let replaced = self
            .globals
            .write()
            .functions
            .insert(def.name.clone(), Arc::clone(def));
        if replaced.is_some() {
            debug!(function = %def.name, "function redefined");
        }

        let weak = Arc::downgrade(self);
        let name = def.name.clone();
        self.runtime.hash().add(
            HashTables::GLOBAL,
            HashEntry::Function(FunctionEntry {
                name: Arc::from(def.name.as_str()),
                arity: def.params.len(),
                call: Arc::new(move |args: &[i64]| call_or_fatal(&weak, &name, args)),
            }),
        );
    }

    fn install_global(
        &self,
        name: &str,
        ty: TypeRef,
        value: i64,
    ) {
        self.globals
            .write()
            .vars
            .insert(name.to_string(), Arc::new(GlobalVar::new(ty, value)));
    }

    /// Call the global function currently bound to `name`.
    ///
    /// Arguments beyond the parameter list are dropped; missing ones take the
    /// parameter default, or zero without one.
    pub(crate) fn call_by_name(
        self: &Arc<Self>,
        name: &str,
        args: &[i64],
    ) -> RuntimeResult<i64> {
        let def = self
            .function(name)
            .ok_or_else(|| RuntimeError::eval(format!("unknown function `{}`", name)))?;
        let mut values = Vec::with_capacity(def.params.len());
        for (index, param) in def.params.iter().enumerate() {
            let value = match (args.get(index), &param.default) {
                (Some(&value), _) => value,
                (None, Some(default)) => self.eval_default(default)?,
                (None, None) => 0,
            };
            values.push(value);
        }
        self.call_function(&def, &values)
    }

    /// Run `def` with bound argument values, behind the stack-growth prologue.
    pub(crate) fn call_function(
        self: &Arc<Self>,
        def: &Arc<FunctionDef>,
        args: &[i64],
    ) -> RuntimeResult<i64> {
        self.runtime.trampoline().maybe_grow(|| {
            let frame = Frame::for_call(Arc::clone(def), args);
            match self.exec_block(&frame, &def.body)? {
                Flow::Return(value) => Ok(def.ret.narrow(value)),
                _ => Ok(0),
            }
        })
    }

    /// Default argument expressions see globals only.
    pub(crate) fn eval_default(
        self: &Arc<Self>,
        expr: &crate::frontend::parser::ast::Expr,
    ) -> RuntimeResult<i64> {
        self.eval(&Frame::top_level(), expr)
    }

    /// Entry point running the function bound to `name` when the work starts.
    pub(crate) fn entry_for(
        self: &Arc<Self>,
        name: String,
    ) -> EntryFn {
        let weak = Arc::downgrade(self);
        Arc::new(move |data| call_or_fatal(&weak, &name, &[data]))
    }

    fn run_items(
        self: &Arc<Self>,
        items: &[Item],
    ) -> RuntimeResult<Option<i64>> {
        for item in items {
            if let Item::Function(def) = item {
                self.install_function(def);
            }
        }

        let frame = Frame::top_level();
        let mut echo = None;
        for item in items {
            echo = None;
            match item {
                Item::Function(_) | Item::Class(_) => {}
                Item::Global(decls) => {
                    for decl in decls {
                        let value = match &decl.init {
                            Some(init) => self.eval(&frame, init)?,
                            None => 0,
                        };
                        self.install_global(&decl.name, decl.ty, value);
                    }
                }
                Item::Stmt(Stmt::Expr(expr)) => {
                    let value = self.eval(&frame, expr)?;
                    if !self.is_void(expr) {
                        echo = Some(value);
                    }
                }
                Item::Stmt(stmt) => {
                    self.exec(&frame, stmt)?;
                }
            }
        }
        Ok(echo)
    }
}

/// Call `name` through a weak session reference; errors terminate the context.
fn call_or_fatal(
    shared: &Weak<Shared>,
    name: &str,
    args: &[i64],
) -> i64 {
    let Some(shared) = shared.upgrade() else {
        except::fatal(RuntimeError::eval(format!(
            "`{}` outlived its interpreter",
            name
        )));
    };
    match shared.call_by_name(name, args) {
        Ok(value) => value,
        Err(err) => except::fatal(err),
    }
}

/// The HolyC tree-walking interpreter.
#[derive(Debug, Clone)]
pub struct Interpreter {
    shared: Arc<Shared>,
}

impl Interpreter {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            shared: Arc::new(Shared {
                runtime,
                globals: RwLock::new(Globals::default()),
                strings: Mutex::new(HashMap::new()),
                jobs: Mutex::new(HashMap::new()),
            }),
        }
    }

    #[inline]
    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.shared.runtime
    }

    /// Call the global function `name` in a fresh root context.
    pub fn call(
        &self,
        name: &str,
        args: &[i64],
    ) -> RuntimeResult<i64> {
        run_in_context(ExecContext::root(), || self.shared.call_by_name(name, args))?
    }

    /// Queued jobs whose result no `JobResGet` has read yet.
    pub fn unread_jobs(&self) -> usize {
        self.shared.unread_jobs()
    }

    /// Current value of the global variable `name`.
    pub fn global(
        &self,
        name: &str,
    ) -> Option<i64> {
        self.shared.global(name).map(|var| var.load())
    }

    /// Names of all global functions and variables, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let globals = self.shared.globals.read();
        let mut names: Vec<String> = globals
            .functions
            .keys()
            .chain(globals.vars.keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Names of the builtins bound to the runtime.
    pub fn builtins(&self) -> Vec<&'static str> {
        ffi::names()
    }
}

impl Executor for Interpreter {
    fn execute(
        &self,
        unit: &CompiledUnit,
    ) -> RuntimeResult<Option<i64>> {
        self.shared.runtime.load_unit(unit)?;
        debug!(items = unit.items().len(), "executing unit");
        run_in_context(ExecContext::root(), || self.shared.run_items(unit.items()))?
    }

    fn symbols(&self) -> Vec<String> {
        Interpreter::symbols(self)
    }
}
