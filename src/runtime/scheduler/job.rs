//! Jobs: queued units of work executed by per-CPU workers.
//!
//! A job runs its entry point exactly once, on the worker of its CPU or inline in
//! another job that awaits it before it started. The result lands in a
//! [`JobSlot`], which any number of callers may block on.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::task::EntryFn;
use crate::runtime::error::RuntimeError;

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub usize);

impl fmt::Display for JobId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Job({})", self.0)
    }
}

/// Job flags. Carried through to the job; the scheduler does not interpret them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobFlags(pub u32);

/// Write-once result cell of a job.
#[derive(Debug, Default)]
pub struct JobSlot {
    result: Mutex<Option<Result<i64, RuntimeError>>>,
    ready: Condvar,
}

impl JobSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the result and wake every waiter. Later stores are ignored.
    pub(crate) fn complete(
        &self,
        result: Result<i64, RuntimeError>,
    ) {
        let mut slot = self.result.lock();
        if slot.is_none() {
            *slot = Some(result);
            self.ready.notify_all();
        }
    }

    /// Block until the result is available.
    pub fn wait(&self) -> Result<i64, RuntimeError> {
        let mut slot = self.result.lock();
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            self.ready.wait(&mut slot);
        }
    }

    /// Result if already available.
    pub fn try_get(&self) -> Option<Result<i64, RuntimeError>> {
        self.result.lock().clone()
    }

    pub fn is_complete(&self) -> bool {
        self.result.lock().is_some()
    }
}

/// A queued job.
pub struct Job {
    id: JobId,
    cpu: usize,
    arg: i64,
    flags: JobFlags,
    lineage: u64,
    entry: EntryFn,
    started: AtomicBool,
    slot: JobSlot,
}

impl fmt::Debug for Job {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("cpu", &self.cpu)
            .field("arg", &self.arg)
            .field("flags", &self.flags)
            .field("complete", &self.slot.is_complete())
            .finish()
    }
}

impl Job {
    pub(crate) fn new(
        id: JobId,
        cpu: usize,
        entry: EntryFn,
        arg: i64,
        flags: JobFlags,
        lineage: u64,
    ) -> Self {
        Self {
            id,
            cpu,
            arg,
            flags,
            lineage,
            entry,
            started: AtomicBool::new(false),
            slot: JobSlot::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> JobId {
        self.id
    }

    #[inline]
    pub fn cpu(&self) -> usize {
        self.cpu
    }

    #[inline]
    pub fn arg(&self) -> i64 {
        self.arg
    }

    #[inline]
    pub fn flags(&self) -> JobFlags {
        self.flags
    }

    #[inline]
    pub(crate) fn lineage(&self) -> u64 {
        self.lineage
    }

    #[inline]
    pub fn slot(&self) -> &JobSlot {
        &self.slot
    }

    /// Claim the single execution of this job.
    pub(crate) fn begin(&self) -> Option<&EntryFn> {
        if self.started.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(&self.entry)
        }
    }
}

/// Handle returned by `JobQue`.
#[derive(Debug, Clone)]
pub struct JobHandle {
    job: Arc<Job>,
}

impl JobHandle {
    pub(crate) fn new(job: Arc<Job>) -> Self {
        Self { job }
    }

    #[inline]
    pub fn id(&self) -> JobId {
        self.job.id()
    }

    #[inline]
    pub fn cpu(&self) -> usize {
        self.job.cpu()
    }

    #[inline]
    pub(crate) fn job(&self) -> &Arc<Job> {
        &self.job
    }

    /// `JobResGet`: block until the job has run and return its result.
    ///
    /// Safe to call from several callers; all observe the same value.
    pub fn result(&self) -> Result<i64, RuntimeError> {
        self.job.slot().wait()
    }

    pub fn try_result(&self) -> Option<Result<i64, RuntimeError>> {
        self.job.slot().try_get()
    }

    pub fn is_done(&self) -> bool {
        self.job.slot().is_complete()
    }
}
