//! Exception frame stack
//!
//! Each execution context owns a LIFO chain of recovery points. `throw` records
//! the payload in the context's [`ExceptionState`] and transfers control to the
//! nearest restore point, discarding every frame above it on the way.
//!
//! Restore points are the `catch_unwind` sites set up by [`try_catch`]; the
//! transfer itself is a `resume_unwind` carrying a private [`ThrowSignal`], so
//! host panics are never mistaken for language exceptions and vice versa.
//!
//! ```text
//!   try_catch ──push──► [f0]          body runs
//!     try_catch ─push─► [f0 f1]       body throws(7)
//!                        state = {active, 7}
//!     restore f1 ◄───── unwind        frames above f1 removed
//!     handler(7)                      state still observable
//!     pop(f1) ────────► [f0]          state cleared
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use smallvec::SmallVec;
use thiserror::Error;
use tracing::{debug, warn};

use crate::runtime::context;
use crate::runtime::error::RuntimeError;

/// Identity of a pushed frame, unique within its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(u64);

impl fmt::Display for FrameId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Exception state of one context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExceptionState {
    /// A thrown exception has not been handled yet.
    pub active: bool,
    /// Payload of the most recent throw.
    pub payload: i64,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    id: FrameId,
    /// Set once this frame's restore point claimed the active exception.
    handling: bool,
}

/// Frame stack usage errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExceptError {
    #[error("frame {popped} popped while frame {top} is on top")]
    OutOfOrder { popped: FrameId, top: FrameId },

    #[error("frame {0} popped from an empty frame stack")]
    Empty(FrameId),
}

/// LIFO chain of recovery points plus the exception state of one context.
#[derive(Debug, Default)]
pub struct FrameStack {
    frames: SmallVec<[Frame; 8]>,
    next_id: u64,
    state: ExceptionState,
}

impl FrameStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link a new frame on top.
    pub fn push(&mut self) -> FrameId {
        let id = FrameId(self.next_id);
        self.next_id += 1;
        self.frames.push(Frame {
            id,
            handling: false,
        });
        id
    }

    /// Remove `id`, which must be the top frame.
    ///
    /// Popping the frame that handled an exception clears the exception state.
    pub fn pop(
        &mut self,
        id: FrameId,
    ) -> Result<(), ExceptError> {
        let top = self.frames.last().copied().ok_or(ExceptError::Empty(id))?;
        if top.id != id {
            return Err(ExceptError::OutOfOrder {
                popped: id,
                top: top.id,
            });
        }
        self.frames.pop();
        if top.handling {
            self.state = ExceptionState::default();
        }
        Ok(())
    }

    /// Number of frames currently linked.
    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn state(&self) -> ExceptionState {
        self.state
    }

    /// Whether `id` is still linked.
    pub fn contains(
        &self,
        id: FrameId,
    ) -> bool {
        self.frames.iter().any(|frame| frame.id == id)
    }

    fn raise(
        &mut self,
        payload: i64,
    ) {
        self.state = ExceptionState {
            active: true,
            payload,
        };
    }

    /// Drop every frame linked above `id`. Returns the number removed.
    fn unwind_to(
        &mut self,
        id: FrameId,
    ) -> usize {
        match self.frames.iter().rposition(|frame| frame.id == id) {
            Some(index) => {
                let removed = self.frames.len() - index - 1;
                self.frames.truncate(index + 1);
                removed
            }
            None => 0,
        }
    }

    fn claim(
        &mut self,
        id: FrameId,
    ) {
        if let Some(frame) = self.frames.iter_mut().rev().find(|frame| frame.id == id) {
            frame.handling = true;
        }
    }
}

/// Unwind payload of a language-level throw.
#[derive(Debug)]
pub(crate) struct ThrowSignal {
    pub payload: i64,
}

/// Unwind payload of a fatal runtime error; never caught by a restore point.
#[derive(Debug)]
pub(crate) struct FatalSignal(pub RuntimeError);

/// Push a frame on the current context's stack.
pub fn push() -> FrameId {
    context::with_frames(FrameStack::push)
}

/// Pop `id` from the current context's stack.
pub fn pop(id: FrameId) -> Result<(), ExceptError> {
    context::with_frames(|frames| frames.pop(id))
}

/// Raise `payload` in the current context.
///
/// With no frame linked the unwind runs to the context boundary, which reports
/// [`RuntimeError::UnhandledException`] and terminates the context.
pub fn throw(payload: i64) -> ! {
    let depth = context::with_frames(|frames| {
        frames.raise(payload);
        frames.depth()
    });
    if depth == 0 {
        debug!(payload, "throw with no frame linked; context terminates");
    }
    panic::resume_unwind(Box::new(ThrowSignal { payload }))
}

/// Terminate the current context with `err`. Restore points do not catch it.
pub fn fatal(err: RuntimeError) -> ! {
    debug!(error = %err, "fatal runtime error");
    panic::resume_unwind(Box::new(FatalSignal(err)))
}

#[inline]
pub fn exception_active() -> bool {
    context::with_frames(|frames| frames.state().active)
}

#[inline]
pub fn exception_payload() -> i64 {
    context::with_frames(|frames| frames.state().payload)
}

#[inline]
pub fn try_depth() -> usize {
    context::with_frames(|frames| frames.depth())
}

/// Run `body` under a fresh frame; on a throw, run `handler` with the payload.
///
/// The frame stays linked (and the exception observable through
/// [`exception_active`] / [`exception_payload`]) while `handler` runs and is
/// popped afterwards. A throw from inside `handler` goes to the next frame down.
pub fn try_catch<T>(
    body: impl FnOnce() -> T,
    handler: impl FnOnce(i64) -> T,
) -> T {
    let frame = push();
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => {
            leave(frame);
            value
        }
        Err(unwind) => {
            if !unwind.is::<ThrowSignal>() {
                leave(frame);
                panic::resume_unwind(unwind);
            }
            let payload = context::with_frames(|frames| {
                let removed = frames.unwind_to(frame);
                if removed > 0 {
                    debug!(removed, "discarded frames above restore point");
                }
                frames.claim(frame);
                frames.state().payload
            });
            let value = handler(payload);
            leave(frame);
            value
        }
    }
}

/// Unlink `frame` and anything a misbehaving body left above it.
fn leave(frame: FrameId) {
    let result = context::with_frames(|frames| {
        let leaked = frames.unwind_to(frame);
        if leaked > 0 {
            warn!(leaked, "frames left linked at end of try block");
        }
        frames.pop(frame)
    });
    if let Err(err) = result {
        warn!(error = %err, "restore point lost its frame");
    }
}

#[cfg(test)]
mod tests;
