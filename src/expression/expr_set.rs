//! A compiled expression forest with its per-batch evaluation state.

use crate::common::error::VexelResult;
use crate::common::pool::MemoryPool;
use crate::expression::compiler::{compile_expressions, CompileOptions};
use crate::expression::context::EvalContext;
use crate::expression::expr::ExprPtr;
use crate::internal_err;
use crate::ir::TypedExprRef;
use crate::types::{DataChunk, SelectionVector, Vector};
use std::sync::Arc;

/// A set of compiled top-level expressions sharing one compilation scope.
///
/// Compilation is single-threaded per set; a set is owned by one executing
/// task at a time. Shared (multiply-referenced) nodes memoize their result
/// within a batch; call [`ExprSet::clear`] between batches.
#[derive(Debug)]
pub struct ExprSet {
    exprs: Vec<ExprPtr>,
    to_reset: Vec<ExprPtr>,
    /// The memory pool compilation drew from; execution contexts created
    /// through [`ExprSet::make_context`] share it.
    pool: Arc<MemoryPool>,
}

impl ExprSet {
    /// Compile a forest of typed expressions.
    pub fn compile(sources: &[TypedExprRef], options: &CompileOptions) -> VexelResult<Self> {
        let compiled = compile_expressions(sources, options)?;
        Ok(Self {
            exprs: compiled.exprs,
            to_reset: compiled.to_reset,
            pool: options.pool.clone(),
        })
    }

    /// The memory pool shared by compilation and execution.
    pub fn pool(&self) -> &Arc<MemoryPool> {
        &self.pool
    }

    /// An evaluation context drawing output allocations from this set's
    /// pool.
    pub fn make_context(&self) -> EvalContext {
        EvalContext::with_pool(self.pool.clone())
    }

    /// The compiled top-level expressions, 1:1 with the sources.
    pub fn exprs(&self) -> &[ExprPtr] {
        &self.exprs
    }

    /// One compiled expression by source position.
    pub fn expr(&self, index: usize) -> VexelResult<&ExprPtr> {
        self.exprs
            .get(index)
            .ok_or_else(|| internal_err!("No compiled expression at index {}", index))
    }

    /// Evaluate one compiled expression over the selected rows.
    pub fn eval(
        &self,
        index: usize,
        rows: &SelectionVector,
        chunk: &DataChunk,
        ctx: &mut EvalContext,
    ) -> VexelResult<Vector> {
        self.expr(index)?.eval(rows, chunk, ctx)
    }

    /// Evaluate every compiled expression over the selected rows.
    pub fn eval_all(
        &self,
        rows: &SelectionVector,
        chunk: &DataChunk,
        ctx: &mut EvalContext,
    ) -> VexelResult<Vec<Vector>> {
        self.exprs
            .iter()
            .map(|expr| expr.eval(rows, chunk, ctx))
            .collect()
    }

    /// Reset per-batch state on shared nodes.
    pub fn clear(&self) {
        for expr in &self.to_reset {
            expr.reset();
        }
    }
}
