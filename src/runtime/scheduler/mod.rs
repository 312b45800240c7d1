//! Task and job scheduler
//!
//! Tasks are independently running units, one OS thread each, with their own
//! execution context and a place in the task tree. Jobs are queued to a logical
//! CPU and run in FIFO order by that CPU's worker; their result is collected
//! with [`Scheduler::job_res_get`]. [`Scheduler::spawn_wait_all`] is the barrier
//! the REPL uses after every unit.

pub mod barrier;
pub mod job;
pub mod queue;
pub mod task;

pub use barrier::LineageTracker;
pub use job::{Job, JobFlags, JobHandle, JobId, JobSlot};
pub use queue::{JobQueue, JobReceiver};
pub use task::{
    EntryFn, SpawnRequest, Task, TaskFlags, TaskHandle, TaskId, TaskOutcome, TaskState,
    TaskTable,
};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

use crate::runtime::context::{self, run_in_context, ContextKind, ExecContext};
use crate::runtime::error::RuntimeError;
use crate::runtime::stack::register_thread_stack;

/// Smallest stack a task may request.
pub const MIN_TASK_STACK: usize = 16 * 1024;

/// Scheduling errors. Reported to compiled code as a null handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("CPU {cpu} is out of range (this runtime has {cpus})")]
    InvalidCpu { cpu: usize, cpus: usize },
    #[error("stack size {0} is below the minimum of {MIN_TASK_STACK} bytes")]
    InvalidStackSize(usize),
    #[error("failed to start thread: {0}")]
    ThreadSpawn(String),
    #[error("SpawnWaitAll cannot be called from inside a task or job")]
    BarrierInsideWorker,
    #[error("no global function named `{0}`")]
    UnknownEntry(String),
    #[error("scheduler is shut down")]
    ShutDown,
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of logical CPUs (one job worker each).
    pub cpus: usize,
    /// Stack size of tasks that do not request one.
    pub default_stack_size: usize,
    /// Stack size of job worker threads.
    pub worker_stack_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let cpus = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Self {
            cpus,
            default_stack_size: 2 * 1024 * 1024,
            worker_stack_size: 2 * 1024 * 1024,
        }
    }
}

/// Scheduler statistics.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    pub tasks_spawned: AtomicUsize,
    pub tasks_completed: AtomicUsize,
    pub tasks_failed: AtomicUsize,
    pub jobs_queued: AtomicUsize,
    pub jobs_completed: AtomicUsize,
    pub jobs_failed: AtomicUsize,
}

impl SchedulerStats {
    /// Tasks and jobs that have not terminated yet.
    pub fn in_flight(&self) -> usize {
        let started = self.tasks_spawned.load(Ordering::SeqCst) + self.jobs_queued.load(Ordering::SeqCst);
        let ended = self.tasks_completed.load(Ordering::SeqCst)
            + self.tasks_failed.load(Ordering::SeqCst)
            + self.jobs_completed.load(Ordering::SeqCst)
            + self.jobs_failed.load(Ordering::SeqCst);
        started.saturating_sub(ended)
    }
}

/// The task and job scheduler of one runtime.
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    stats: Arc<SchedulerStats>,
    tasks: Arc<TaskTable>,
    lineages: Arc<LineageTracker>,
    queues: RwLock<Vec<JobQueue>>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    next_task: AtomicUsize,
    next_job: AtomicUsize,
    running: AtomicBool,
}

impl Scheduler {
    /// Create a scheduler and start one job worker per CPU.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        let config = SchedulerConfig {
            cpus: config.cpus.max(1),
            ..config
        };
        let stats = Arc::new(SchedulerStats::default());
        let lineages = Arc::new(LineageTracker::new());

        let mut queues = Vec::with_capacity(config.cpus);
        let mut workers = Vec::with_capacity(config.cpus);
        for cpu in 0..config.cpus {
            let (queue, receiver) = JobQueue::new(cpu);
            let worker = queue::spawn_worker(
                cpu,
                receiver,
                config.worker_stack_size,
                stats.clone(),
                lineages.clone(),
            )
            .map_err(|err| SchedulerError::ThreadSpawn(err.to_string()))?;
            queues.push(queue);
            workers.push(worker);
        }
        debug!(cpus = config.cpus, "scheduler started");

        Ok(Self {
            config,
            stats,
            tasks: Arc::new(TaskTable::new()),
            lineages,
            queues: RwLock::new(queues),
            workers: Mutex::new(workers),
            next_task: AtomicUsize::new(1),
            next_job: AtomicUsize::new(1),
            running: AtomicBool::new(true),
        })
    }

    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    #[inline]
    pub fn cpus(&self) -> usize {
        self.config.cpus
    }

    #[inline]
    pub fn stats(&self) -> &Arc<SchedulerStats> {
        &self.stats
    }

    /// The task tree.
    #[inline]
    pub fn tasks(&self) -> &Arc<TaskTable> {
        &self.tasks
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn check_cpu(
        &self,
        cpu: Option<usize>,
    ) -> Result<(), SchedulerError> {
        match cpu {
            Some(cpu) if cpu >= self.config.cpus => Err(SchedulerError::InvalidCpu {
                cpu,
                cpus: self.config.cpus,
            }),
            _ => Ok(()),
        }
    }

    /// `Spawn`: start a task. Never blocks.
    pub fn spawn(
        &self,
        request: SpawnRequest,
    ) -> Result<TaskHandle, SchedulerError> {
        if !self.is_running() {
            return Err(SchedulerError::ShutDown);
        }
        self.check_cpu(request.cpu)?;
        let stack_size = request.stack_size.unwrap_or(self.config.default_stack_size);
        if stack_size < MIN_TASK_STACK {
            return Err(SchedulerError::InvalidStackSize(stack_size));
        }

        let creator = context::current();
        let id = TaskId(self.next_task.fetch_add(1, Ordering::SeqCst));
        let name = request.name.unwrap_or_else(|| id.to_string());
        let parent = request.parent.or_else(|| creator.task());
        let lineage = self.lineages.open(creator.lineage());

        let task = Arc::new(Task::new(
            id,
            name.clone(),
            request.cpu,
            parent,
            stack_size,
            request.flags,
            lineage,
        ));
        self.tasks.insert(task.clone());

        let body = {
            let task = task.clone();
            let tasks = self.tasks.clone();
            let stats = self.stats.clone();
            let lineages = self.lineages.clone();
            let entry = request.entry;
            let data = request.data;
            move || {
                register_thread_stack(stack_size);
                task.set_state(TaskState::Running);
                let outcome = match run_in_context(ExecContext::for_task(id, lineage), || entry(data)) {
                    Ok(value) => {
                        stats.tasks_completed.fetch_add(1, Ordering::SeqCst);
                        TaskOutcome::Completed(value)
                    }
                    Err(err) => {
                        warn!(task = %id, name = task.name(), error = %err, "task terminated");
                        stats.tasks_failed.fetch_add(1, Ordering::SeqCst);
                        TaskOutcome::Failed(err)
                    }
                };
                task.finish(outcome);
                if task.flags().contains(TaskFlags::DAEMON) {
                    tasks.remove(id);
                }
                lineages.close(lineage);
            }
        };

        match thread::Builder::new()
            .name(name)
            .stack_size(stack_size)
            .spawn(body)
        {
            Ok(thread) => {
                task.attach_thread(thread);
                self.stats.tasks_spawned.fetch_add(1, Ordering::SeqCst);
                debug!(task = %id, ?parent, stack_size, "task spawned");
                Ok(TaskHandle::new(task, self.tasks.clone()))
            }
            Err(err) => {
                self.tasks.remove(id);
                self.lineages.close(lineage);
                Err(SchedulerError::ThreadSpawn(err.to_string()))
            }
        }
    }

    /// `JobQue`: append a job to a CPU's queue. Never blocks.
    ///
    /// `cpu = None` picks a CPU round-robin.
    pub fn job_que(
        &self,
        entry: EntryFn,
        arg: i64,
        cpu: Option<usize>,
        flags: JobFlags,
    ) -> Result<JobHandle, SchedulerError> {
        self.check_cpu(cpu)?;
        let id = JobId(self.next_job.fetch_add(1, Ordering::SeqCst));
        let cpu = cpu.unwrap_or(id.0 % self.config.cpus);

        let queues = self.queues.read();
        let queue = queues.get(cpu).ok_or(SchedulerError::ShutDown)?;
        let lineage = self.lineages.open(context::current().lineage());
        let job = Arc::new(Job::new(id, cpu, entry, arg, flags, lineage));
        if queue.push(job.clone()).is_err() {
            self.lineages.close(lineage);
            return Err(SchedulerError::ShutDown);
        }
        self.stats.jobs_queued.fetch_add(1, Ordering::SeqCst);
        debug!(job = %id, cpu, "job queued");
        Ok(JobHandle::new(job))
    }

    /// `JobResGet`: block until the job has run, then return its result.
    pub fn job_res_get(
        &self,
        handle: &JobHandle,
    ) -> Result<i64, RuntimeError> {
        // A job must not block on work that may be queued behind it: claim the
        // awaited job and run it here if no worker has started it yet.
        if matches!(context::current().kind(), ContextKind::Job(_)) && !handle.is_done() {
            queue::execute_job(handle.cpu(), handle.job(), &self.stats);
        }
        handle.result()
    }

    /// `SpawnWaitAll`: block until all work created before the call, and all
    /// work it created in turn, has terminated.
    pub fn spawn_wait_all(&self) -> Result<(), SchedulerError> {
        if context::current().is_worker() {
            return Err(SchedulerError::BarrierInsideWorker);
        }
        self.lineages.wait_all();
        Ok(())
    }

    /// Queued jobs per CPU.
    pub fn queue_depths(&self) -> Vec<usize> {
        self.queues.read().iter().map(JobQueue::len).collect()
    }

    /// Stop accepting work, drain the job queues and join the workers.
    ///
    /// Running tasks are not interrupted.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.queues.write().clear();

        let current = thread::current().id();
        for worker in self.workers.lock().drain(..) {
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                warn!("job worker panicked");
            }
        }
        debug!("scheduler shut down");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests;
