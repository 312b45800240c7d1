//! Stack-growth trampoline
//!
//! Compiled function prologues call [`Trampoline::call_stack_grow`] (or the
//! closure form [`Trampoline::grow`]) with the headroom they need. When the
//! current stack segment cannot provide it, a new segment is mapped, execution
//! continues on it via `corosensei::on_stack`, and the segment is released once
//! the callee returns or unwinds.
//!
//! Headroom is measured against per-thread bounds. Task threads and job workers
//! register their bounds when they start; a switched segment installs its own
//! bounds for the duration of the call. A thread with unknown bounds reports zero
//! headroom, so the first guarded call there always switches.

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

use corosensei::stack::{DefaultStack, Stack};
use tracing::trace;

use crate::runtime::error::RuntimeError;
use crate::runtime::except;

/// Granularity segment sizes are rounded to.
pub const PAGE_SIZE: usize = 4096;

/// Bytes assumed already in use when a thread registers its stack.
const ENTRY_SLACK: usize = 32 * 1024;

/// Signature of a trampolined entry point: three integer arguments, one result.
pub type StackFn<'a> = dyn Fn(i64, i64, i64) -> i64 + 'a;

/// Trampoline configuration.
#[derive(Debug, Clone)]
pub struct TrampolineConfig {
    /// Headroom guaranteed before each guarded call made by the interpreter.
    pub red_zone: usize,
    /// Preferred size of a freshly mapped segment.
    pub segment_size: usize,
}

impl Default for TrampolineConfig {
    fn default() -> Self {
        Self {
            red_zone: 64 * 1024,
            segment_size: 2 * 1024 * 1024,
        }
    }
}

/// Trampoline statistics.
#[derive(Debug, Default)]
pub struct TrampolineStats {
    /// Calls that had to switch to a new segment.
    pub switches: AtomicUsize,
    /// Calls that ran on the current segment.
    pub direct_calls: AtomicUsize,
    /// Bytes mapped for segments over the trampoline's lifetime.
    pub bytes_mapped: AtomicUsize,
}

#[derive(Debug, Clone, Copy)]
struct StackBounds {
    /// Lowest address still considered usable.
    limit: usize,
}

thread_local! {
    static BOUNDS: Cell<Option<StackBounds>> = const { Cell::new(None) };
}

#[inline(never)]
fn stack_pointer() -> usize {
    let marker = 0u8;
    std::hint::black_box(&marker) as *const u8 as usize
}

/// Record that the calling thread runs on a stack of `size` bytes.
///
/// Must be called near the thread's entry point.
pub fn register_thread_stack(size: usize) {
    let limit = stack_pointer().saturating_sub(size.saturating_sub(ENTRY_SLACK));
    BOUNDS.with(|bounds| bounds.set(Some(StackBounds { limit })));
}

/// Bytes available below the current stack pointer, if the bounds are known.
pub fn remaining_stack() -> Option<usize> {
    BOUNDS.with(|bounds| bounds.get()).map(|b| stack_pointer().saturating_sub(b.limit))
}

/// Reinstalls the bounds that were active before a switch.
struct RestoreBounds(Option<StackBounds>);

impl Drop for RestoreBounds {
    fn drop(&mut self) {
        let previous = self.0;
        BOUNDS.with(|bounds| bounds.set(previous));
    }
}

/// Pick a segment size within `[min, max]`, preferring `preferred`.
pub fn segment_size_for(
    min: usize,
    max: usize,
    preferred: usize,
) -> usize {
    let want = preferred.clamp(min, max);
    let rounded = want.div_ceil(PAGE_SIZE) * PAGE_SIZE;
    if rounded <= max {
        rounded
    } else {
        want
    }
}

/// Stack-space manager shared by every context of a runtime.
#[derive(Debug, Default)]
pub struct Trampoline {
    config: TrampolineConfig,
    stats: TrampolineStats,
}

impl Trampoline {
    pub fn new(config: TrampolineConfig) -> Self {
        Self {
            config,
            stats: TrampolineStats::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &TrampolineConfig {
        &self.config
    }

    #[inline]
    pub fn stats(&self) -> &TrampolineStats {
        &self.stats
    }

    /// `CallStkGrow`: ensure `min..=max` bytes of headroom, then call `f(a0, a1, a2)`.
    pub fn call_stack_grow(
        &self,
        min: usize,
        max: usize,
        f: &StackFn<'_>,
        a0: i64,
        a1: i64,
        a2: i64,
    ) -> i64 {
        self.grow(min, max, || f(a0, a1, a2))
    }

    /// Guarded call with the configured red zone, used by function prologues.
    #[inline]
    pub fn maybe_grow<R>(
        &self,
        f: impl FnOnce() -> R,
    ) -> R {
        let min = self.config.red_zone;
        let max = self.config.segment_size.max(min);
        self.grow(min, max, f)
    }

    /// Run `f` with at least `min` bytes of stack headroom.
    ///
    /// Return values and unwinding (including language throws) pass through a
    /// switch unchanged. `min > max` or a failed mapping is fatal to the caller.
    pub fn grow<R>(
        &self,
        min: usize,
        max: usize,
        f: impl FnOnce() -> R,
    ) -> R {
        if min > max {
            except::fatal(RuntimeError::ResourceExhaustion {
                what: format!("stack request min {} exceeds max {}", min, max),
            });
        }

        if remaining_stack().is_some_and(|remaining| remaining >= min) {
            self.stats.direct_calls.fetch_add(1, Ordering::Relaxed);
            return f();
        }

        let size = segment_size_for(min, max, self.config.segment_size);
        let stack = match DefaultStack::new(size) {
            Ok(stack) => stack,
            Err(err) => except::fatal(RuntimeError::ResourceExhaustion {
                what: format!("cannot map {} byte stack segment: {}", size, err),
            }),
        };

        self.stats.switches.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes_mapped.fetch_add(size, Ordering::Relaxed);
        trace!(size, "switching to new stack segment");

        let segment = StackBounds {
            limit: stack.limit().get(),
        };
        let _restore = RestoreBounds(BOUNDS.with(|bounds| bounds.replace(Some(segment))));
        corosensei::on_stack(stack, f)
    }
}
