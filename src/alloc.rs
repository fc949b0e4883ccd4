//! Bulk memory budget
//!
//! Track buffers and load staging buffers are taken from a [`BulkAllocator`].
//! Every [`Block`] returns its size to the budget exactly once, either through
//! [`Block::release`] or when dropped, so a failed load releases everything it
//! allocated simply by unwinding.

use crate::{PlayerError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Memory region a block is taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryZone {
    /// Short-lived staging memory used while loading
    Main,
    /// Long-lived storage for converted track buffers
    High,
}

/// Source of large zero-filled byte blocks
pub trait BulkAllocator: Send + Sync {
    /// Whether the allocator can serve requests at all
    fn is_available(&self) -> bool;

    /// Bytes that can still be allocated
    fn available(&self) -> usize;

    /// Allocate a zero-filled block of exactly `size` bytes
    fn allocate(&self, size: usize, zone: MemoryZone) -> Result<Block>;
}

/// Owned, fixed-size byte block accounted against an allocator budget
#[derive(Debug)]
pub struct Block {
    bytes: Vec<u8>,
    zone: MemoryZone,
    in_use: Arc<AtomicUsize>,
}

impl Block {
    /// Block size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for a zero-length block
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Zone the block was taken from
    pub fn zone(&self) -> MemoryZone {
        self.zone
    }

    /// Block contents
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable block contents
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Return the block to its allocator
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        self.in_use.fetch_sub(self.bytes.len(), Ordering::AcqRel);
    }
}

/// Heap-backed allocator with an optional byte limit
#[derive(Debug)]
pub struct HeapAllocator {
    limit: Option<usize>,
    in_use: Arc<AtomicUsize>,
}

impl HeapAllocator {
    /// Allocator bounded to `limit` bytes outstanding
    pub fn with_limit(limit: usize) -> Self {
        HeapAllocator {
            limit: Some(limit),
            in_use: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Allocator bounded only by the system
    pub fn unbounded() -> Self {
        HeapAllocator {
            limit: None,
            in_use: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bytes currently held by live blocks
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }
}

impl Default for HeapAllocator {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl BulkAllocator for HeapAllocator {
    fn is_available(&self) -> bool {
        self.limit != Some(0)
    }

    fn available(&self) -> usize {
        match self.limit {
            Some(limit) => limit.saturating_sub(self.in_use()),
            None => usize::MAX - self.in_use(),
        }
    }

    fn allocate(&self, size: usize, zone: MemoryZone) -> Result<Block> {
        let available = self.available();
        if size > available {
            return Err(PlayerError::OutOfMemory {
                requested: size,
                available,
            });
        }

        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(size)
            .map_err(|_| PlayerError::OutOfMemory {
                requested: size,
                available,
            })?;
        bytes.resize(size, 0);

        self.in_use.fetch_add(size, Ordering::AcqRel);
        tracing::trace!(size, ?zone, "allocated block");

        Ok(Block {
            bytes,
            zone,
            in_use: Arc::clone(&self.in_use),
        })
    }
}
