//! Evaluation context threaded through compiled-expression evaluation.

use crate::common::error::{VexelError, VexelResult};
use crate::common::pool::MemoryPool;
use crate::types::{LogicalType, SelectionVector, Vector};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-batch evaluation state: the memory pool for output allocation, the
/// per-row error column, and error-reporting options.
///
/// Strict casts and function failures record user errors per row instead of
/// aborting, so a single pass can surface every bad row; the caller
/// inspects [`EvalContext::errors`] after evaluation.
///
/// Output allocations reserve from the pool and are returned to it when the
/// context is dropped, so a bounded pool can be shared across batches.
pub struct EvalContext {
    pool: Arc<MemoryPool>,
    /// Bytes this context has reserved from the pool so far.
    reserved: usize,
    capture_error_details: bool,
    errors: BTreeMap<usize, VexelError>,
    default_null_rows_skipped: bool,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::with_pool(Arc::new(MemoryPool::new()))
    }

    /// A context drawing output allocations from a caller-supplied pool,
    /// e.g. one created with [`MemoryPool::with_limit`].
    pub fn with_pool(pool: Arc<MemoryPool>) -> Self {
        Self {
            pool,
            reserved: 0,
            capture_error_details: true,
            errors: BTreeMap::new(),
            default_null_rows_skipped: false,
        }
    }

    /// Disable or enable formatted per-row error messages.
    pub fn set_capture_error_details(&mut self, capture: bool) {
        self.capture_error_details = capture;
    }

    /// Whether formatted error details should be produced.
    pub fn capture_error_details(&self) -> bool {
        self.capture_error_details
    }

    /// The memory pool for output allocation.
    pub fn pool(&self) -> &Arc<MemoryPool> {
        &self.pool
    }

    /// Allocate a writable output vector sized for the selection. The
    /// reservation is held until this context is dropped.
    pub fn ensure_writable(
        &mut self,
        rows: &SelectionVector,
        ty: &LogicalType,
    ) -> VexelResult<Vector> {
        let size = rows.required_size();
        let element = ty.get_physical_type().get_size().unwrap_or(16);
        self.pool.reserve(size * element)?;
        self.reserved += size * element;
        let mut vector = Vector::new(ty.clone(), size);
        vector.resize(size)?;
        Ok(vector)
    }

    /// Record a user error for a row. The first error per row wins.
    pub fn set_error(&mut self, row: usize, error: VexelError) {
        self.errors.entry(row).or_insert(error);
    }

    /// Whether any row recorded an error.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The recorded per-row errors, ordered by row.
    pub fn errors(&self) -> &BTreeMap<usize, VexelError> {
        &self.errors
    }

    /// Take the recorded errors, leaving the context clean.
    pub fn take_errors(&mut self) -> BTreeMap<usize, VexelError> {
        std::mem::take(&mut self.errors)
    }

    /// The first recorded error, by row order.
    pub fn first_error(&self) -> Option<&VexelError> {
        self.errors.values().next()
    }

    /// Drop recorded errors for the given rows.
    pub fn clear_errors_for(&mut self, rows: &SelectionVector) {
        for row in rows.iter() {
            self.errors.remove(&row);
        }
    }

    /// Note that a function with default null behavior skipped null rows.
    pub fn note_default_null_row_skipped(&mut self) {
        self.default_null_rows_skipped = true;
    }

    /// Whether any default-null rows were skipped since the last check.
    pub fn default_null_rows_skipped(&self) -> bool {
        self.default_null_rows_skipped
    }

    /// A fresh context sharing this one's pool and options. Used to
    /// evaluate sub-expressions whose errors must be intercepted (TRY).
    pub fn nested(&self) -> EvalContext {
        let mut nested = EvalContext::with_pool(self.pool.clone());
        nested.capture_error_details = self.capture_error_details;
        nested
    }
}

impl Drop for EvalContext {
    fn drop(&mut self) {
        self.pool.release(self.reserved);
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}
