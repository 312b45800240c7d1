//! Builtins bound to the runtime ABI
//!
//! Each builtin takes integer arguments and returns an integer. Trailing
//! parameters may carry defaults, which omitted (`F(a,,c)`) or missing
//! arguments take. Function pointers are passed as `&Name`, which evaluates to
//! the address of the interned name; the callee is resolved when the pointer is
//! used.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use tracing::warn;

use super::executor::Shared;
use crate::runtime::except;
use crate::runtime::reflect::{self, FieldDescriptor, HashKind, HashTables, HTT_CLASS};
use crate::runtime::scheduler::{JobFlags, SchedulerError, SpawnRequest, TaskFlags};
use crate::runtime::{RuntimeError, RuntimeResult};

pub(crate) type BuiltinFn = fn(&Arc<Shared>, &[i64]) -> RuntimeResult<i64>;

/// Native function callable from HolyC code.
pub(crate) struct Builtin {
    pub name: &'static str,
    /// Leading parameters without a default.
    pub required: usize,
    /// Defaults of the parameters after the required ones.
    pub defaults: &'static [i64],
    /// Accepts any number of extra arguments.
    pub variadic: bool,
    /// Produces no value; never echoed.
    pub void: bool,
    pub handler: BuiltinFn,
}

impl Builtin {
    fn new(
        name: &'static str,
        required: usize,
        defaults: &'static [i64],
        handler: BuiltinFn,
    ) -> Self {
        Self {
            name,
            required,
            defaults,
            variadic: false,
            void: false,
            handler,
        }
    }

    fn void(mut self) -> Self {
        self.void = true;
        self
    }

    fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// Fill omitted arguments from defaults and check the count.
    pub fn bind(
        &self,
        args: &[Option<i64>],
    ) -> RuntimeResult<Vec<i64>> {
        let declared = self.required + self.defaults.len();
        if args.len() > declared && !self.variadic {
            return Err(RuntimeError::eval(format!(
                "`{}` takes at most {} arguments, {} given",
                self.name,
                declared,
                args.len()
            )));
        }
        let mut values = Vec::with_capacity(declared.max(args.len()));
        for index in 0..declared.max(args.len()) {
            let value = match args.get(index).copied().flatten() {
                Some(value) => value,
                None if index < self.required => {
                    return Err(RuntimeError::eval(format!(
                        "missing argument {} of `{}`",
                        index + 1,
                        self.name
                    )))
                }
                None => self.defaults.get(index - self.required).copied().unwrap_or(0),
            };
            values.push(value);
        }
        Ok(values)
    }
}

static BUILTINS: Lazy<HashMap<&'static str, Builtin>> = Lazy::new(|| {
    [
        Builtin::new("Print", 1, &[], print).variadic().void(),
        Builtin::new("PutChars", 1, &[], put_chars).void(),
        Builtin::new("throw", 0, &[0], throw).void(),
        Builtin::new("ExceptPayload", 0, &[], |_, _| Ok(except::exception_payload())),
        Builtin::new("ExceptActive", 0, &[], |_, _| Ok(except::exception_active() as i64)),
        Builtin::new("TryDepth", 0, &[], |_, _| Ok(except::try_depth() as i64)),
        Builtin::new("MAlloc", 1, &[], malloc),
        Builtin::new("Free", 1, &[], free).void(),
        Builtin::new("MemSet", 3, &[], memset),
        Builtin::new("MemCpy", 3, &[], memcpy),
        Builtin::new("Spawn", 1, &[0, 0, -1, 0, 0], spawn),
        Builtin::new("JobQue", 1, &[0, -1, 0], job_que),
        Builtin::new("JobResGet", 1, &[], job_res_get),
        Builtin::new("SpawnWaitAll", 0, &[], spawn_wait_all).void(),
        Builtin::new("CallStkGrow", 3, &[0, 0, 0], call_stk_grow),
        Builtin::new("Sleep", 1, &[], sleep).void(),
        Builtin::new("HashFind", 1, &[0, HTT_CLASS], hash_find),
        Builtin::new("MemberCount", 1, &[], member_count),
        Builtin::new("MemberName", 2, &[], member_name),
        Builtin::new("MemberMetaData", 3, &[], member_meta_data),
        Builtin::new("MemberMetaFind", 3, &[], member_meta_find),
        Builtin::new("ReflFieldCount", 0, &[], |shared, _| {
            Ok(shared.runtime().reflection().field_count() as i64)
        }),
        Builtin::new("AbiMajor", 0, &[], |shared, _| {
            Ok(shared.runtime().abi_version().major as i64)
        }),
    ]
    .into_iter()
    .map(|builtin| (builtin.name, builtin))
    .collect()
});

pub(crate) fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.get(name)
}

/// Builtin names, sorted.
pub fn names() -> Vec<&'static str> {
    let mut names: Vec<_> = BUILTINS.keys().copied().collect();
    names.sort_unstable();
    names
}

fn non_negative(
    value: i64,
    what: &str,
) -> RuntimeResult<usize> {
    usize::try_from(value).map_err(|_| RuntimeError::eval(format!("negative {}: {}", what, value)))
}

/// Name of the function a `&Name` pointer refers to, if it is one.
fn function_name(
    shared: &Shared,
    ptr: i64,
) -> Option<String> {
    let name = shared.runtime().read_c_string(ptr)?;
    shared.function(&name).map(|_| name)
}

/// The string at `ptr`, or an error naming what was expected there.
fn string_arg(
    shared: &Shared,
    ptr: i64,
    what: &str,
) -> RuntimeResult<String> {
    shared
        .runtime()
        .read_c_string(ptr)
        .ok_or_else(|| RuntimeError::eval(format!("{} is not a string", what)))
}

/// Members of the class a `HashFind` handle names.
///
/// Handles hold the class name, so they follow redefinitions.
fn class_members(
    shared: &Shared,
    class: i64,
) -> Option<Vec<Arc<FieldDescriptor>>> {
    let name = shared.runtime().read_c_string(class)?;
    let entry = shared
        .runtime()
        .hash_find(&name, HashTables::GLOBAL, HashKind::Class)?;
    entry.as_class().map(|class| class.members.clone())
}

fn class_member(
    shared: &Shared,
    class: i64,
    member: i64,
) -> RuntimeResult<Option<Arc<FieldDescriptor>>> {
    let Some(members) = class_members(shared, class) else {
        return Ok(None);
    };
    let member = string_arg(shared, member, "member name")?;
    Ok(members.into_iter().find(|field| field.field() == member))
}

fn print(
    shared: &Arc<Shared>,
    args: &[i64],
) -> RuntimeResult<i64> {
    let format = shared
        .runtime()
        .read_c_string(args[0])
        .ok_or_else(|| RuntimeError::eval("Print: format is not a string"))?;
    shared.runtime().print_formatted(&format, &args[1..]);
    Ok(0)
}

fn put_chars(
    shared: &Arc<Shared>,
    args: &[i64],
) -> RuntimeResult<i64> {
    shared.runtime().put_chars(args[0]);
    Ok(0)
}

fn throw(
    _: &Arc<Shared>,
    args: &[i64],
) -> RuntimeResult<i64> {
    except::throw(args[0])
}

fn malloc(
    shared: &Arc<Shared>,
    args: &[i64],
) -> RuntimeResult<i64> {
    let size = non_negative(args[0], "allocation size")?;
    Ok(shared.runtime().allocate(size)? as i64)
}

fn free(
    shared: &Arc<Shared>,
    args: &[i64],
) -> RuntimeResult<i64> {
    if args[0] != 0 {
        shared.runtime().release(non_negative(args[0], "pointer")?)?;
    }
    Ok(0)
}

fn memset(
    shared: &Arc<Shared>,
    args: &[i64],
) -> RuntimeResult<i64> {
    let dst = non_negative(args[0], "pointer")?;
    let size = non_negative(args[2], "size")?;
    shared.runtime().fill(dst, args[1] as u8, size)?;
    Ok(args[0])
}

fn memcpy(
    shared: &Arc<Shared>,
    args: &[i64],
) -> RuntimeResult<i64> {
    let dst = non_negative(args[0], "pointer")?;
    let src = non_negative(args[1], "pointer")?;
    let size = non_negative(args[2], "size")?;
    shared.runtime().copy(dst, src, size)?;
    Ok(args[0])
}

/// `Spawn(&F, data = 0, name = 0, cpu = -1, stack = 0, flags = 0)`: task id or 0.
///
/// Tasks spawned from HolyC code are always reaped when they finish.
fn spawn(
    shared: &Arc<Shared>,
    args: &[i64],
) -> RuntimeResult<i64> {
    let Some(entry) = function_name(shared, args[0]) else {
        warn!(error = %SchedulerError::UnknownEntry(format!("{:#x}", args[0])), "Spawn rejected");
        return Ok(0);
    };
    let name = match args[2] {
        0 => entry.clone(),
        ptr => shared.runtime().read_c_string(ptr).unwrap_or_else(|| entry.clone()),
    };
    let mut request = SpawnRequest::new(shared.entry_for(entry))
        .data(args[1])
        .name(name)
        .flags(TaskFlags(args[5] as u32) | TaskFlags::DAEMON);
    if args[3] >= 0 {
        request = request.cpu(args[3] as usize);
    }
    if args[4] > 0 {
        request = request.stack_size(args[4] as usize);
    }
    Ok(shared
        .runtime()
        .spawn(request)
        .map_or(0, |handle| handle.id().0 as i64))
}

/// `JobQue(&F, arg = 0, cpu = -1, flags = 0)`: job id or 0.
fn job_que(
    shared: &Arc<Shared>,
    args: &[i64],
) -> RuntimeResult<i64> {
    let Some(entry) = function_name(shared, args[0]) else {
        warn!(error = %SchedulerError::UnknownEntry(format!("{:#x}", args[0])), "JobQue rejected");
        return Ok(0);
    };
    let cpu = usize::try_from(args[2]).ok();
    let handle = shared.runtime().job_que(
        shared.entry_for(entry),
        args[1],
        cpu,
        JobFlags(args[3] as u32),
    );
    Ok(handle.map_or(0, |handle| shared.remember_job(handle)))
}

/// A job that failed fails the caller too.
fn job_res_get(
    shared: &Arc<Shared>,
    args: &[i64],
) -> RuntimeResult<i64> {
    shared.job_result(args[0])
}

fn spawn_wait_all(
    shared: &Arc<Shared>,
    _: &[i64],
) -> RuntimeResult<i64> {
    match shared.runtime().spawn_wait_all() {
        Ok(()) => Ok(0),
        Err(err) if !err.is_fatal() => {
            warn!(error = %err, "SpawnWaitAll rejected");
            Ok(-1)
        }
        Err(err) => Err(err),
    }
}

/// `CallStkGrow(min, max, &F, a0 = 0, a1 = 0, a2 = 0)`
fn call_stk_grow(
    shared: &Arc<Shared>,
    args: &[i64],
) -> RuntimeResult<i64> {
    let min = non_negative(args[0], "stack size")?;
    let max = non_negative(args[1], "stack size")?;
    let name = function_name(shared, args[2])
        .ok_or_else(|| RuntimeError::eval("CallStkGrow: not a function pointer"))?;
    let f = |a0: i64, a1: i64, a2: i64| -> i64 {
        match shared.call_by_name(&name, &[a0, a1, a2]) {
            Ok(value) => value,
            Err(err) => except::fatal(err),
        }
    };
    Ok(shared
        .runtime()
        .call_stack_grow(min, max, &f, args[3], args[4], args[5]))
}

fn sleep(
    _: &Arc<Shared>,
    args: &[i64],
) -> RuntimeResult<i64> {
    std::thread::sleep(Duration::from_millis(args[0].max(0) as u64));
    Ok(0)
}

/// `HashFind(name, table = "global", kind = HTT_CLASS)`: the interned entry
/// name, or 0.
///
/// A function found this way is a function pointer, like `&Name`.
fn hash_find(
    shared: &Arc<Shared>,
    args: &[i64],
) -> RuntimeResult<i64> {
    let name = string_arg(shared, args[0], "HashFind name")?;
    let table = match args[1] {
        0 => HashTables::GLOBAL.to_string(),
        ptr => string_arg(shared, ptr, "HashFind table")?,
    };
    let kind = HashKind::from_code(args[2])
        .ok_or_else(|| RuntimeError::eval(format!("HashFind: unknown kind {}", args[2])))?;
    match shared.runtime().hash_find(&name, &table, kind) {
        Some(entry) => shared.intern(entry.name()),
        None => Ok(0),
    }
}

/// `MemberCount(class)`: 0 for a null or unknown class.
fn member_count(
    shared: &Arc<Shared>,
    args: &[i64],
) -> RuntimeResult<i64> {
    Ok(class_members(shared, args[0]).map_or(0, |members| members.len() as i64))
}

/// `MemberName(class, index)`: the interned member name, or 0.
fn member_name(
    shared: &Arc<Shared>,
    args: &[i64],
) -> RuntimeResult<i64> {
    let member = class_members(shared, args[0]).and_then(|members| {
        usize::try_from(args[1])
            .ok()
            .and_then(|index| members.get(index).cloned())
    });
    match member {
        Some(member) => shared.intern(member.field()),
        None => Ok(0),
    }
}

/// `MemberMetaData(key, class, member)`: the interned annotation value, or 0.
fn member_meta_data(
    shared: &Arc<Shared>,
    args: &[i64],
) -> RuntimeResult<i64> {
    let key = string_arg(shared, args[0], "annotation key")?;
    let Some(member) = class_member(shared, args[1], args[2])? else {
        return Ok(0);
    };
    match reflect::member_meta_data(&key, &member) {
        Some(value) => shared.intern(value),
        None => Ok(0),
    }
}

/// `MemberMetaFind(key, class, member)`: the interned key if the member carries
/// that annotation, or 0.
fn member_meta_find(
    shared: &Arc<Shared>,
    args: &[i64],
) -> RuntimeResult<i64> {
    let key = string_arg(shared, args[0], "annotation key")?;
    let Some(member) = class_member(shared, args[1], args[2])? else {
        return Ok(0);
    };
    match reflect::member_meta_find(&key, &member) {
        Some(entry) => shared.intern(&entry.key),
        None => Ok(0),
    }
}
