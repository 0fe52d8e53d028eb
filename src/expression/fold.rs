//! Speculative constant folding.

use crate::common::error::VexelResult;
use crate::common::pool::MemoryPool;
use crate::expression::context::EvalContext;
use crate::expression::expr::{Expr, ExprPtr};
use crate::types::{DataChunk, SelectionVector};
use std::sync::Arc;
use tracing::trace;

/// Try to fold a compiled expression into a constant.
///
/// A node is foldable when its metadata says it is deterministic and reads
/// no input columns. Folding evaluates it over a single-row chunk with an
/// empty row type and wraps the result as a constant.
///
/// Folding a deterministically-failing expression must not fail the
/// compilation: the row carrying the failure might never be evaluated at
/// execution time (e.g. a function with default null behavior whose other
/// argument is null). User errors therefore abandon folding and keep the
/// node as-is; system errors propagate.
pub fn try_fold_if_constant(expr: &ExprPtr, pool: &Arc<MemoryPool>) -> VexelResult<ExprPtr> {
    if !expr.metadata().is_constant {
        return Ok(expr.clone());
    }

    let chunk = DataChunk::with_rows(1);
    let rows = SelectionVector::sequential(1);
    let mut ctx = EvalContext::with_pool(pool.clone());
    let outcome = expr.eval(&rows, &chunk, &mut ctx);
    // The harness must not leak evaluation state into the batch loop.
    expr.reset_recursive();

    let vector = match outcome {
        Ok(vector) => vector,
        Err(err) if err.is_user_error() => return Ok(expr.clone()),
        Err(err) => return Err(err),
    };
    if ctx.has_errors() {
        return Ok(expr.clone());
    }
    let value = match vector.get_value(0) {
        Ok(value) => value,
        Err(_) => return Ok(expr.clone()),
    };

    trace!(name = expr.name(), "folded expression to constant");
    let folded = Expr::constant_typed(expr.ty().clone(), value);
    folded.compute_metadata();

    let skipped = expr.metadata().default_null_rows_skipped
        || ctx.default_null_rows_skipped()
        || expr
            .inputs()
            .iter()
            .any(|input| input.metadata().default_null_rows_skipped);
    if skipped {
        folded.set_default_null_rows_skipped();
    }
    Ok(folded)
}
