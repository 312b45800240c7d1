//! Per-CPU job queues and their workers.
//!
//! Each logical CPU owns one FIFO queue with a single consuming worker thread,
//! so jobs queued to the same CPU start in submission order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, warn};

use super::barrier::LineageTracker;
use super::job::Job;
use super::SchedulerStats;
use crate::runtime::context::{run_in_context, ExecContext};
use crate::runtime::stack::register_thread_stack;

/// Producer side of one CPU's queue.
#[derive(Debug, Clone)]
pub struct JobQueue {
    cpu: usize,
    sender: Sender<Arc<Job>>,
    depth: Arc<AtomicUsize>,
}

impl JobQueue {
    /// Create the queue for `cpu` and return its consumer end.
    pub fn new(cpu: usize) -> (Self, JobReceiver) {
        let (sender, receiver) = channel::unbounded();
        let depth = Arc::new(AtomicUsize::new(0));
        (
            Self {
                cpu,
                sender,
                depth: depth.clone(),
            },
            JobReceiver { receiver, depth },
        )
    }

    #[inline]
    pub fn cpu(&self) -> usize {
        self.cpu
    }

    /// Append a job. Fails only when the worker is gone.
    pub fn push(
        &self,
        job: Arc<Job>,
    ) -> Result<(), Arc<Job>> {
        self.depth.fetch_add(1, Ordering::SeqCst);
        self.sender.send(job).map_err(|err| {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            err.into_inner()
        })
    }

    /// Jobs queued and not yet picked up.
    #[inline]
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Consumer side of one CPU's queue.
#[derive(Debug)]
pub struct JobReceiver {
    receiver: Receiver<Arc<Job>>,
    depth: Arc<AtomicUsize>,
}

impl JobReceiver {
    /// Next job in FIFO order; `None` once every producer is dropped and the
    /// queue is drained.
    pub fn next(&self) -> Option<Arc<Job>> {
        let job = self.receiver.recv().ok()?;
        self.depth.fetch_sub(1, Ordering::SeqCst);
        Some(job)
    }
}

/// Start the worker thread of one CPU.
pub(crate) fn spawn_worker(
    cpu: usize,
    receiver: JobReceiver,
    stack_size: usize,
    stats: Arc<SchedulerStats>,
    lineages: Arc<LineageTracker>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("hc-cpu-{}", cpu))
        .stack_size(stack_size)
        .spawn(move || {
            register_thread_stack(stack_size);
            debug!(cpu, "job worker started");
            while let Some(job) = receiver.next() {
                execute_job(cpu, &job, &stats);
                lineages.close(job.lineage());
            }
            debug!(cpu, "job worker stopped");
        })
}

/// Run one job in a fresh context and publish its result.
///
/// Does nothing if the job was already claimed by another caller.
pub(crate) fn execute_job(
    cpu: usize,
    job: &Arc<Job>,
    stats: &SchedulerStats,
) {
    let Some(entry) = job.begin() else {
        return;
    };
    let arg = job.arg();
    let result = run_in_context(ExecContext::for_job(job.id(), job.lineage()), || entry(arg));
    match &result {
        Ok(_) => {
            stats.jobs_completed.fetch_add(1, Ordering::SeqCst);
        }
        Err(err) => {
            warn!(job = %job.id(), cpu, error = %err, "job terminated");
            stats.jobs_failed.fetch_add(1, Ordering::SeqCst);
        }
    }
    job.slot().complete(result);
}
