//! Execution contexts
//!
//! Every task, every job execution and every root evaluation runs inside exactly
//! one [`ExecContext`]. The context owns the exception frame stack of that unit
//! of execution and remembers which lineage any work it creates belongs to.
//!
//! The current context is kept in a thread-local slot. Tasks own their thread, job
//! workers swap a fresh context in for every job, and the root (REPL / `run`)
//! installs one per evaluated unit. Nothing here is ever shared across threads.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::except::{FatalSignal, FrameStack, ThrowSignal};
use crate::runtime::scheduler::{JobId, TaskId};

/// What kind of execution a context belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// Host-driven evaluation (REPL unit, `run` invocation, tests).
    Root,
    /// A spawned task.
    Task(TaskId),
    /// A job being executed by a CPU worker.
    Job(JobId),
}

/// Task-local execution state.
#[derive(Debug)]
pub struct ExecContext {
    kind: ContextKind,
    lineage: Option<u64>,
    frames: RefCell<FrameStack>,
}

impl ExecContext {
    /// Context for host-driven evaluation.
    pub fn root() -> Self {
        Self::new(ContextKind::Root, None)
    }

    /// Context for a spawned task.
    pub fn for_task(
        id: TaskId,
        lineage: u64,
    ) -> Self {
        Self::new(ContextKind::Task(id), Some(lineage))
    }

    /// Context for one job execution.
    pub fn for_job(
        id: JobId,
        lineage: u64,
    ) -> Self {
        Self::new(ContextKind::Job(id), Some(lineage))
    }

    fn new(
        kind: ContextKind,
        lineage: Option<u64>,
    ) -> Self {
        Self {
            kind,
            lineage,
            frames: RefCell::new(FrameStack::new()),
        }
    }

    #[inline]
    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    /// Lineage inherited by work created from this context (`None` at the root).
    #[inline]
    pub fn lineage(&self) -> Option<u64> {
        self.lineage
    }

    /// The task this context runs, if any.
    pub fn task(&self) -> Option<TaskId> {
        match self.kind {
            ContextKind::Task(id) => Some(id),
            _ => None,
        }
    }

    /// Whether this context is executing scheduled work.
    #[inline]
    pub fn is_worker(&self) -> bool {
        !matches!(self.kind, ContextKind::Root)
    }

    /// Run `f` with the frame stack borrowed mutably.
    ///
    /// The borrow must not outlive `f`; compiled code never runs inside it.
    pub(crate) fn with_frames<R>(
        &self,
        f: impl FnOnce(&mut FrameStack) -> R,
    ) -> R {
        f(&mut self.frames.borrow_mut())
    }
}

thread_local! {
    static CURRENT: RefCell<Rc<ExecContext>> = RefCell::new(Rc::new(ExecContext::root()));
}

/// The context active on this thread.
pub fn current() -> Rc<ExecContext> {
    CURRENT.with(|slot| slot.borrow().clone())
}

/// Run `f` against the current context's frame stack.
pub(crate) fn with_frames<R>(f: impl FnOnce(&mut FrameStack) -> R) -> R {
    current().with_frames(f)
}

/// Restores the previously active context when dropped.
#[must_use = "the context is left as soon as the guard is dropped"]
pub struct ContextGuard {
    previous: Option<Rc<ExecContext>>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            CURRENT.with(|slot| {
                slot.replace(previous);
            });
        }
    }
}

/// Make `ctx` the current context until the guard is dropped.
pub fn enter(ctx: ExecContext) -> ContextGuard {
    let previous = CURRENT.with(|slot| slot.replace(Rc::new(ctx)));
    ContextGuard {
        previous: Some(previous),
    }
}

/// Run `body` as the whole lifetime of `ctx`.
///
/// This is the context boundary: a throw that finds no frame, a fatal runtime
/// error and any host panic all stop here and come back as an error.
pub fn run_in_context<R>(
    ctx: ExecContext,
    body: impl FnOnce() -> R,
) -> RuntimeResult<R> {
    let _guard = enter(ctx);
    panic::catch_unwind(AssertUnwindSafe(body)).map_err(classify_unwind)
}

/// Turn an unwind payload that reached a context boundary into an error.
pub(crate) fn classify_unwind(payload: Box<dyn Any + Send>) -> RuntimeError {
    let payload = match payload.downcast::<ThrowSignal>() {
        Ok(signal) => {
            return RuntimeError::UnhandledException {
                payload: signal.payload,
            }
        }
        Err(other) => other,
    };
    let payload = match payload.downcast::<FatalSignal>() {
        Ok(fatal) => return fatal.0,
        Err(other) => other,
    };
    if let Some(msg) = payload.downcast_ref::<&str>() {
        RuntimeError::Panicked((*msg).to_string())
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        RuntimeError::Panicked(msg.clone())
    } else {
        RuntimeError::Panicked("non-string panic payload".to_string())
    }
}
