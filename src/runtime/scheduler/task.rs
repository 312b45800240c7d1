//! Task definitions for the scheduler.
//!
//! A task is an independently running unit bound to a compiled entry point. It
//! owns an OS thread (sized up front from its requested stack size) and its own
//! execution context, and hangs under its parent in the scheduler-wide task tree.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use crate::runtime::error::RuntimeError;

/// Entry point of a task or job: one integer in, one integer out.
pub type EntryFn = Arc<dyn Fn(i64) -> i64 + Send + Sync>;

/// Unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub usize);

impl TaskId {
    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Created, thread not yet running the entry point.
    Ready,
    /// Entry point executing.
    Running,
    /// Entry point returned.
    Finished,
    /// Terminated by an unhandled exception or fatal error.
    Failed,
}

impl TaskState {
    /// Convert from u8 (for atomic storage).
    #[inline]
    pub fn from_u8(val: u8) -> Self {
        match val {
            1 => TaskState::Running,
            2 => TaskState::Finished,
            3 => TaskState::Failed,
            _ => TaskState::Ready,
        }
    }

    /// Convert to u8 (for atomic storage).
    #[inline]
    pub fn as_u8(&self) -> u8 {
        match self {
            TaskState::Ready => 0,
            TaskState::Running => 1,
            TaskState::Finished => 2,
            TaskState::Failed => 3,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Finished | TaskState::Failed)
    }
}

/// Task flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskFlags(pub u32);

impl TaskFlags {
    pub const NONE: TaskFlags = TaskFlags(0);
    /// Reap the task from the task table as soon as it terminates.
    pub const DAEMON: TaskFlags = TaskFlags(1 << 0);

    #[inline]
    pub fn contains(
        self,
        other: TaskFlags,
    ) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for TaskFlags {
    type Output = TaskFlags;

    fn bitor(
        self,
        rhs: TaskFlags,
    ) -> TaskFlags {
        TaskFlags(self.0 | rhs.0)
    }
}

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed(i64),
    Failed(RuntimeError),
}

/// Arguments of `Spawn`.
#[derive(Clone)]
pub struct SpawnRequest {
    pub entry: EntryFn,
    /// Opaque payload handed to the entry point.
    pub data: i64,
    pub name: Option<String>,
    /// Target CPU; `None` lets the scheduler pick.
    pub cpu: Option<usize>,
    /// Parent task; `None` means the spawning context's task.
    pub parent: Option<TaskId>,
    /// Stack size in bytes; `None` uses the configured default.
    pub stack_size: Option<usize>,
    pub flags: TaskFlags,
}

impl fmt::Debug for SpawnRequest {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("SpawnRequest")
            .field("data", &self.data)
            .field("name", &self.name)
            .field("cpu", &self.cpu)
            .field("parent", &self.parent)
            .field("stack_size", &self.stack_size)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl SpawnRequest {
    /// Request with default placement, stack and flags.
    pub fn new(entry: EntryFn) -> Self {
        Self {
            entry,
            data: 0,
            name: None,
            cpu: None,
            parent: None,
            stack_size: None,
            flags: TaskFlags::NONE,
        }
    }

    /// Request for a plain closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(i64) -> i64 + Send + Sync + 'static,
    {
        Self::new(Arc::new(f))
    }

    pub fn data(
        mut self,
        data: i64,
    ) -> Self {
        self.data = data;
        self
    }

    pub fn name(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn cpu(
        mut self,
        cpu: usize,
    ) -> Self {
        self.cpu = Some(cpu);
        self
    }

    pub fn parent(
        mut self,
        parent: TaskId,
    ) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn stack_size(
        mut self,
        size: usize,
    ) -> Self {
        self.stack_size = Some(size);
        self
    }

    pub fn flags(
        mut self,
        flags: TaskFlags,
    ) -> Self {
        self.flags = flags;
        self
    }
}

/// A spawned task.
pub struct Task {
    id: TaskId,
    name: String,
    cpu: Option<usize>,
    parent: Option<TaskId>,
    stack_size: usize,
    flags: TaskFlags,
    lineage: u64,
    state: AtomicU8,
    outcome: Mutex<Option<TaskOutcome>>,
    done: Condvar,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Task {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("cpu", &self.cpu)
            .field("parent", &self.parent)
            .field("stack_size", &self.stack_size)
            .finish()
    }
}

impl Task {
    pub(crate) fn new(
        id: TaskId,
        name: String,
        cpu: Option<usize>,
        parent: Option<TaskId>,
        stack_size: usize,
        flags: TaskFlags,
        lineage: u64,
    ) -> Self {
        Self {
            id,
            name,
            cpu,
            parent,
            stack_size,
            flags,
            lineage,
            state: AtomicU8::new(TaskState::Ready.as_u8()),
            outcome: Mutex::new(None),
            done: Condvar::new(),
            thread: Mutex::new(None),
        }
    }

    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn cpu(&self) -> Option<usize> {
        self.cpu
    }

    #[inline]
    pub fn parent(&self) -> Option<TaskId> {
        self.parent
    }

    #[inline]
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    #[inline]
    pub fn flags(&self) -> TaskFlags {
        self.flags
    }

    #[inline]
    pub(crate) fn lineage(&self) -> u64 {
        self.lineage
    }

    #[inline]
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::SeqCst))
    }

    #[inline]
    pub(crate) fn set_state(
        &self,
        state: TaskState,
    ) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    pub(crate) fn attach_thread(
        &self,
        handle: JoinHandle<()>,
    ) {
        *self.thread.lock() = Some(handle);
    }

    /// Record the outcome and wake joiners.
    pub(crate) fn finish(
        &self,
        outcome: TaskOutcome,
    ) {
        let state = match outcome {
            TaskOutcome::Completed(_) => TaskState::Finished,
            TaskOutcome::Failed(_) => TaskState::Failed,
        };
        let mut slot = self.outcome.lock();
        *slot = Some(outcome);
        self.set_state(state);
        self.done.notify_all();
    }

    /// Outcome if the task already terminated.
    pub fn try_outcome(&self) -> Option<TaskOutcome> {
        self.outcome.lock().clone()
    }

    /// Block until the task terminates.
    pub fn wait(&self) -> TaskOutcome {
        let mut slot = self.outcome.lock();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            self.done.wait(&mut slot);
        }
    }

    fn take_thread(&self) -> Option<JoinHandle<()>> {
        self.thread.lock().take()
    }
}

/// The scheduler-wide task tree.
///
/// Tasks refer to their parent by id only; the table owns every live task.
#[derive(Debug, Default)]
pub struct TaskTable {
    tasks: Mutex<HashMap<TaskId, Arc<Task>>>,
}

impl TaskTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(
        &self,
        task: Arc<Task>,
    ) {
        self.tasks.lock().insert(task.id(), task);
    }

    pub(crate) fn remove(
        &self,
        id: TaskId,
    ) -> Option<Arc<Task>> {
        self.tasks.lock().remove(&id)
    }

    pub fn get(
        &self,
        id: TaskId,
    ) -> Option<Arc<Task>> {
        self.tasks.lock().get(&id).cloned()
    }

    /// Live children of `parent`, in id order.
    pub fn children(
        &self,
        parent: TaskId,
    ) -> Vec<TaskId> {
        let mut children: Vec<TaskId> = self
            .tasks
            .lock()
            .values()
            .filter(|task| task.parent() == Some(parent))
            .map(|task| task.id())
            .collect();
        children.sort();
        children
    }

    /// Number of tasks not yet reaped.
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

/// Handle returned by `Spawn`.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    task: Arc<Task>,
    table: Arc<TaskTable>,
}

impl TaskHandle {
    pub(crate) fn new(
        task: Arc<Task>,
        table: Arc<TaskTable>,
    ) -> Self {
        Self { task, table }
    }

    #[inline]
    pub fn id(&self) -> TaskId {
        self.task.id()
    }

    #[inline]
    pub fn task(&self) -> &Arc<Task> {
        &self.task
    }

    #[inline]
    pub fn state(&self) -> TaskState {
        self.task.state()
    }

    /// Wait for termination, join the thread and reap the task.
    pub fn join(self) -> TaskOutcome {
        let outcome = self.task.wait();
        if let Some(thread) = self.task.take_thread() {
            // The outcome is already recorded; a panic past it has nowhere to go.
            let _ = thread.join();
        }
        self.table.remove(self.task.id());
        outcome
    }
}
