//! Memory accounting for compilation and execution.

use crate::common::error::VexelResult;
use crate::internal_err;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Tracks memory reserved for constant materialization during compilation
/// and for output arenas during execution. A pool is shared by reference
/// between the compiler and the evaluation context; reservations are
/// advisory unless a limit is set.
#[derive(Debug, Default)]
pub struct MemoryPool {
    reserved: AtomicUsize,
    limit: Option<usize>,
}

impl MemoryPool {
    /// Create an unbounded pool.
    pub fn new() -> Self {
        Self {
            reserved: AtomicUsize::new(0),
            limit: None,
        }
    }

    /// Create a pool that fails reservations beyond `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            reserved: AtomicUsize::new(0),
            limit: Some(limit),
        }
    }

    /// Reserve `bytes` from the pool.
    pub fn reserve(&self, bytes: usize) -> VexelResult<()> {
        let previous = self.reserved.fetch_add(bytes, Ordering::Relaxed);
        if let Some(limit) = self.limit {
            if previous + bytes > limit {
                self.reserved.fetch_sub(bytes, Ordering::Relaxed);
                return Err(internal_err!(
                    "Memory pool exhausted: {} + {} exceeds limit {}",
                    previous,
                    bytes,
                    limit
                ));
            }
        }
        Ok(())
    }

    /// Return `bytes` to the pool.
    pub fn release(&self, bytes: usize) {
        self.reserved.fetch_sub(bytes, Ordering::Relaxed);
    }

    /// Bytes currently reserved.
    pub fn reserved(&self) -> usize {
        self.reserved.load(Ordering::Relaxed)
    }
}
