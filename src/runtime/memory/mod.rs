//! Runtime heap behind `MAlloc`, `Free`, `MemCpy` and `MemSet`.
//!
//! Blocks are zero-initialized byte buffers keyed by their base address. Every
//! access is bounds checked against the block containing the address, so a bad
//! pointer from compiled code becomes a [`MemoryError`] instead of corruption.

mod allocator;

pub use allocator::{AllocError, BumpAllocator, MemoryLayout, HEAP_ALIGN, HEAP_BASE};

use std::collections::BTreeMap;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::trace;

/// Heap access errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("out of memory allocating {requested} bytes ({live} bytes live, limit {limit})")]
    OutOfMemory {
        requested: usize,
        live: usize,
        limit: usize,
    },
    #[error("{0:#x} is not the start of a live block")]
    UnknownPointer(usize),
    #[error("access of {len} bytes at {addr:#x} is outside any live block")]
    OutOfBounds { addr: usize, len: usize },
}

#[derive(Debug, Default)]
struct Heap {
    addresses: BumpAllocator,
    blocks: BTreeMap<usize, Vec<u8>>,
    live_bytes: usize,
}

impl Heap {
    /// Block containing `[addr, addr + len)`, as (base, offset).
    fn locate(
        &self,
        addr: usize,
        len: usize,
    ) -> Result<(usize, usize), MemoryError> {
        let out_of_bounds = MemoryError::OutOfBounds { addr, len };
        let (&base, block) = self
            .blocks
            .range(..=addr)
            .next_back()
            .ok_or(out_of_bounds.clone())?;
        let offset = addr - base;
        match offset.checked_add(len) {
            Some(end) if end <= block.len() => Ok((base, offset)),
            _ => Err(out_of_bounds),
        }
    }

    fn slice(
        &self,
        addr: usize,
        len: usize,
    ) -> Result<&[u8], MemoryError> {
        let (base, offset) = self.locate(addr, len)?;
        Ok(&self.blocks[&base][offset..offset + len])
    }

    fn slice_mut(
        &mut self,
        addr: usize,
        len: usize,
    ) -> Result<&mut [u8], MemoryError> {
        let (base, offset) = self.locate(addr, len)?;
        let block = self
            .blocks
            .get_mut(&base)
            .ok_or(MemoryError::OutOfBounds { addr, len })?;
        Ok(&mut block[offset..offset + len])
    }
}

/// The heap of one runtime.
#[derive(Debug)]
pub struct MemoryManager {
    heap: Mutex<Heap>,
    limit: usize,
}

impl MemoryManager {
    /// Heap that refuses to hold more than `limit` live bytes.
    pub fn new(limit: usize) -> Self {
        Self {
            heap: Mutex::new(Heap::default()),
            limit,
        }
    }

    /// Allocate a zeroed block of `size` bytes and return its address.
    pub fn allocate(
        &self,
        size: usize,
    ) -> Result<usize, MemoryError> {
        let mut heap = self.heap.lock();
        let out_of_memory = MemoryError::OutOfMemory {
            requested: size,
            live: heap.live_bytes,
            limit: self.limit,
        };
        if heap.live_bytes.saturating_add(size) > self.limit {
            return Err(out_of_memory);
        }
        let addr = heap
            .addresses
            .alloc(MemoryLayout::block(size))
            .map_err(|_| out_of_memory)?;
        heap.blocks.insert(addr, vec![0u8; size]);
        heap.live_bytes += size;
        trace!(addr, size, "allocated");
        Ok(addr)
    }

    /// Free the block starting at `addr`.
    pub fn release(
        &self,
        addr: usize,
    ) -> Result<(), MemoryError> {
        let mut heap = self.heap.lock();
        let block = heap
            .blocks
            .remove(&addr)
            .ok_or(MemoryError::UnknownPointer(addr))?;
        heap.live_bytes -= block.len();
        trace!(addr, size = block.len(), "released");
        Ok(())
    }

    /// Copy `size` bytes from `src` to `dst`. Overlapping ranges are allowed.
    pub fn copy(
        &self,
        dst: usize,
        src: usize,
        size: usize,
    ) -> Result<(), MemoryError> {
        if size == 0 {
            return Ok(());
        }
        let mut heap = self.heap.lock();
        let bytes = heap.slice(src, size)?.to_vec();
        heap.slice_mut(dst, size)?.copy_from_slice(&bytes);
        Ok(())
    }

    /// Set `size` bytes at `dst` to `value`.
    pub fn fill(
        &self,
        dst: usize,
        value: u8,
        size: usize,
    ) -> Result<(), MemoryError> {
        if size == 0 {
            return Ok(());
        }
        self.heap.lock().slice_mut(dst, size)?.fill(value);
        Ok(())
    }

    /// Read `len` bytes at `addr`.
    pub fn read(
        &self,
        addr: usize,
        len: usize,
    ) -> Result<Vec<u8>, MemoryError> {
        Ok(self.heap.lock().slice(addr, len)?.to_vec())
    }

    /// Write `bytes` at `addr`.
    pub fn write(
        &self,
        addr: usize,
        bytes: &[u8],
    ) -> Result<(), MemoryError> {
        self.heap
            .lock()
            .slice_mut(addr, bytes.len())?
            .copy_from_slice(bytes);
        Ok(())
    }

    /// Number of live blocks.
    pub fn live_blocks(&self) -> usize {
        self.heap.lock().blocks.len()
    }

    /// Bytes held by live blocks.
    pub fn live_bytes(&self) -> usize {
        self.heap.lock().live_bytes
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new(1 << 30)
    }
}
