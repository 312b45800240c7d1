//! Address allocation for the runtime heap
//!
//! Compiled code sees heap pointers as plain integers. Addresses are handed out
//! by a bump cursor over a reserved range and never reused, so a stale pointer
//! can always be told apart from a live one.

use std::fmt;

/// First address handed out by a fresh heap.
pub const HEAP_BASE: usize = 0x1000_0000;

/// Alignment of every block.
pub const HEAP_ALIGN: usize = 16;

/// Address allocation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// The address range is used up.
    OutOfAddresses,
    /// Alignment requirements cannot be satisfied
    AlignmentError,
}

impl fmt::Display for AllocError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            AllocError::OutOfAddresses => write!(f, "heap address range exhausted"),
            AllocError::AlignmentError => write!(f, "alignment error"),
        }
    }
}

/// Size and alignment of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    size: usize,
    align: usize,
}

impl MemoryLayout {
    /// Create a layout from size and alignment
    ///
    /// # Returns
    /// `Some(MemoryLayout)` if alignment is valid (power of 2), `None` otherwise.
    pub fn from_size_align(
        size: usize,
        align: usize,
    ) -> Option<Self> {
        if align == 0 || !align.is_power_of_two() {
            return None;
        }
        Some(Self { size, align })
    }

    /// Layout of a heap block of `size` bytes.
    pub fn block(size: usize) -> Self {
        Self {
            size,
            align: HEAP_ALIGN,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn align(&self) -> usize {
        self.align
    }

    /// Address space consumed: the size rounded up to the alignment, at least
    /// one alignment unit so that zero-sized blocks get distinct addresses.
    pub fn footprint(&self) -> Option<usize> {
        let size = self.size.max(1);
        size.checked_add(self.align - 1).map(|end| end & !(self.align - 1))
    }
}

/// Bump allocator over an address range.
#[derive(Debug)]
pub struct BumpAllocator {
    /// Next free address
    next: usize,
    /// One past the last usable address
    end: usize,
}

impl BumpAllocator {
    pub fn new(
        base: usize,
        capacity: usize,
    ) -> Self {
        Self {
            next: base,
            end: base.saturating_add(capacity),
        }
    }

    /// Reserve addresses for `layout`; returns the block's base address.
    pub fn alloc(
        &mut self,
        layout: MemoryLayout,
    ) -> Result<usize, AllocError> {
        let align = layout.align();
        let aligned = self
            .next
            .checked_add(align - 1)
            .map(|n| n & !(align - 1))
            .ok_or(AllocError::AlignmentError)?;
        let footprint = layout.footprint().ok_or(AllocError::OutOfAddresses)?;
        let end = aligned
            .checked_add(footprint)
            .ok_or(AllocError::OutOfAddresses)?;
        if end > self.end {
            return Err(AllocError::OutOfAddresses);
        }
        self.next = end;
        Ok(aligned)
    }

    /// Addresses still available.
    pub fn remaining(&self) -> usize {
        self.end - self.next
    }
}

impl Default for BumpAllocator {
    fn default() -> Self {
        Self::new(HEAP_BASE, usize::MAX / 2)
    }
}
