//! Runtime system
//!
//! The execution substrate compiled code runs on: exception frames, the
//! reflection registry, the stack-growth trampoline, the task and job
//! scheduler, the heap and program output. All of it hangs off one explicit
//! [`Runtime`] object; the only per-thread state is the current
//! [`context::ExecContext`].

pub mod context;
pub mod error;
pub mod except;
pub mod memory;
pub mod output;
pub mod reflect;
pub mod scheduler;
pub mod stack;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

pub use error::{RuntimeError, RuntimeResult};

use crate::frontend::CompiledUnit;
use memory::MemoryManager;
use output::{format_holyc, packed_chars, OutputSink, StdoutSink};
use reflect::{ClassEntry, FieldDescriptor, HashEntry, HashKind, HashTables, ReflectionRegistry};
use scheduler::{
    EntryFn, JobFlags, JobHandle, Scheduler, SchedulerConfig, SchedulerError, SpawnRequest,
    TaskHandle,
};
use stack::{StackFn, Trampoline, TrampolineConfig};

/// Version of the interface between compiled units and the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AbiVersion {
    pub major: u16,
    pub minor: u16,
}

impl AbiVersion {
    pub const CURRENT: AbiVersion = AbiVersion { major: 1, minor: 2 };

    /// Units are compatible when the major versions agree.
    #[inline]
    pub fn accepts(
        self,
        expected: AbiVersion,
    ) -> bool {
        self.major == expected.major
    }
}

impl fmt::Display for AbiVersion {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub scheduler: SchedulerConfig,
    pub trampoline: TrampolineConfig,
    /// Maximum bytes of live heap blocks.
    pub heap_limit: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            trampoline: TrampolineConfig::default(),
            heap_limit: 1 << 30,
        }
    }
}

/// The runtime context object.
pub struct Runtime {
    config: RuntimeConfig,
    output: Arc<dyn OutputSink>,
    memory: MemoryManager,
    reflection: ReflectionRegistry,
    hash: HashTables,
    scheduler: Scheduler,
    trampoline: Trampoline,
}

impl fmt::Debug for Runtime {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Start a runtime printing to stdout.
    pub fn new(config: RuntimeConfig) -> RuntimeResult<Self> {
        Self::with_output(config, Arc::new(StdoutSink))
    }

    /// Start a runtime printing to `output`.
    pub fn with_output(
        config: RuntimeConfig,
        output: Arc<dyn OutputSink>,
    ) -> RuntimeResult<Self> {
        let scheduler = Scheduler::new(config.scheduler.clone())?;
        debug!(abi = %AbiVersion::CURRENT, cpus = scheduler.cpus(), "runtime started");
        Ok(Self {
            memory: MemoryManager::new(config.heap_limit),
            reflection: ReflectionRegistry::new(),
            hash: HashTables::new(),
            trampoline: Trampoline::new(config.trampoline.clone()),
            scheduler,
            output,
            config,
        })
    }

    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Version
    // ------------------------------------------------------------------

    #[inline]
    pub fn abi_version(&self) -> AbiVersion {
        AbiVersion::CURRENT
    }

    /// Reject units built against a different major version.
    pub fn check_abi(
        &self,
        expected: AbiVersion,
    ) -> RuntimeResult<()> {
        if self.abi_version().accepts(expected) {
            Ok(())
        } else {
            Err(RuntimeError::AbiVersionMismatch {
                runtime: self.abi_version(),
                expected,
            })
        }
    }

    /// Load a compiled unit: check its ABI and publish its aggregates.
    ///
    /// Each class gets one reflection table and a `Class` entry in the global
    /// symbol table, replacing an earlier class of the same name.
    pub fn load_unit(
        &self,
        unit: &CompiledUnit,
    ) -> RuntimeResult<()> {
        self.check_abi(unit.expected_abi())?;
        for class in unit.classes() {
            let fields = class.fields.iter().map(|field| {
                FieldDescriptor::new(
                    class.name.as_str(),
                    field.name.as_str(),
                    field.ty.name(),
                    field.annotations.as_str(),
                )
            });
            let range = self.reflection.register_table(fields);
            let members = range.filter_map(|index| self.reflection.field(index)).collect();
            self.hash.add(
                HashTables::GLOBAL,
                HashEntry::Class(ClassEntry {
                    name: Arc::from(class.name.as_str()),
                    members,
                }),
            );
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    #[inline]
    pub fn output(&self) -> &Arc<dyn OutputSink> {
        &self.output
    }

    pub fn print_string(
        &self,
        text: &str,
    ) {
        self.output.write_str(text);
    }

    /// `PutChars`: print the characters packed into `value`.
    pub fn put_chars(
        &self,
        value: i64,
    ) {
        self.output.write_str(&packed_chars(value));
    }

    /// `Print`: expand `format` against `args` and print it.
    ///
    /// `%s` arguments are heap addresses of NUL-terminated strings.
    pub fn print_formatted(
        &self,
        format: &str,
        args: &[i64],
    ) {
        let text = format_holyc(format, args, |addr| self.read_c_string(addr));
        self.output.write_str(&text);
    }

    pub fn flush(&self) {
        self.output.flush();
    }

    // ------------------------------------------------------------------
    // Memory
    // ------------------------------------------------------------------

    #[inline]
    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    /// `MAlloc`
    pub fn allocate(
        &self,
        size: usize,
    ) -> RuntimeResult<usize> {
        Ok(self.memory.allocate(size)?)
    }

    /// `Free`
    pub fn release(
        &self,
        addr: usize,
    ) -> RuntimeResult<()> {
        Ok(self.memory.release(addr)?)
    }

    /// `MemCpy`
    pub fn copy(
        &self,
        dst: usize,
        src: usize,
        size: usize,
    ) -> RuntimeResult<()> {
        Ok(self.memory.copy(dst, src, size)?)
    }

    /// `MemSet`
    pub fn fill(
        &self,
        dst: usize,
        value: u8,
        size: usize,
    ) -> RuntimeResult<()> {
        Ok(self.memory.fill(dst, value, size)?)
    }

    /// Store `text` as a NUL-terminated heap string.
    pub fn alloc_string(
        &self,
        text: &str,
    ) -> RuntimeResult<usize> {
        let addr = self.memory.allocate(text.len() + 1)?;
        self.memory.write(addr, text.as_bytes())?;
        Ok(addr)
    }

    /// Read the NUL-terminated string at `addr`, up to the end of its block.
    pub fn read_c_string(
        &self,
        addr: i64,
    ) -> Option<String> {
        let addr = usize::try_from(addr).ok()?;
        let mut bytes = Vec::new();
        while let Ok(chunk) = self.memory.read(addr + bytes.len(), 1) {
            match chunk[0] {
                0 => return Some(String::from_utf8_lossy(&bytes).into_owned()),
                b => bytes.push(b),
            }
        }
        (!bytes.is_empty()).then(|| String::from_utf8_lossy(&bytes).into_owned())
    }

    // ------------------------------------------------------------------
    // Reflection
    // ------------------------------------------------------------------

    #[inline]
    pub fn reflection(&self) -> &ReflectionRegistry {
        &self.reflection
    }

    #[inline]
    pub fn hash(&self) -> &HashTables {
        &self.hash
    }

    /// `HashFind`
    pub fn hash_find(
        &self,
        name: &str,
        table: &str,
        kind: HashKind,
    ) -> Option<HashEntry> {
        self.hash.find(name, table, kind)
    }

    // ------------------------------------------------------------------
    // Stack growth
    // ------------------------------------------------------------------

    #[inline]
    pub fn trampoline(&self) -> &Trampoline {
        &self.trampoline
    }

    /// `CallStkGrow`
    pub fn call_stack_grow(
        &self,
        min: usize,
        max: usize,
        f: &StackFn<'_>,
        a0: i64,
        a1: i64,
        a2: i64,
    ) -> i64 {
        self.trampoline.call_stack_grow(min, max, f, a0, a1, a2)
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    #[inline]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// `Spawn`: a null handle (with a warning) on invalid parameters.
    pub fn spawn(
        &self,
        request: SpawnRequest,
    ) -> Option<TaskHandle> {
        self.scheduler
            .spawn(request)
            .map_err(|err| warn!(error = %err, "Spawn rejected"))
            .ok()
    }

    /// `JobQue`: a null handle (with a warning) on invalid parameters.
    pub fn job_que(
        &self,
        entry: EntryFn,
        arg: i64,
        cpu: Option<usize>,
        flags: JobFlags,
    ) -> Option<JobHandle> {
        self.scheduler
            .job_que(entry, arg, cpu, flags)
            .map_err(|err| warn!(error = %err, "JobQue rejected"))
            .ok()
    }

    /// `JobResGet`
    pub fn job_res_get(
        &self,
        handle: &JobHandle,
    ) -> RuntimeResult<i64> {
        self.scheduler.job_res_get(handle)
    }

    /// Spawn a task running the global function `name` with default settings.
    pub fn hc_task_spawn(
        &self,
        name: &str,
    ) -> Option<TaskHandle> {
        let entry = self
            .hash_find(name, HashTables::GLOBAL, HashKind::Function)
            .and_then(|entry| entry.as_function().map(|function| function.call.clone()));
        let Some(call) = entry else {
            warn!(error = %SchedulerError::UnknownEntry(name.to_string()), "Spawn rejected");
            return None;
        };
        self.spawn(SpawnRequest::from_fn(move |data| call(&[data])).name(name))
    }

    /// `SpawnWaitAll`
    pub fn spawn_wait_all(&self) -> RuntimeResult<()> {
        Ok(self.scheduler.spawn_wait_all()?)
    }

    /// Stop the job workers and flush output.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        self.output.flush();
    }
}

#[cfg(test)]
mod tests;
