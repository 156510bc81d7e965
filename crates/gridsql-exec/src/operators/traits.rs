//! Operator trait + shared helpers.
//!
//! Operators are pull-based: the parent calls `next` and the operator pulls
//! from its inputs as needed. `Ok(None)` means exhausted; after an error the
//! fragment is abandoned, so operators need not be resumable.

use gridsql_core::id::OpId;
use gridsql_core::types::{Row, Scalar};
use gridsql_plan::EvalError;

use crate::context::ExecContext;
use crate::error::{ExecError, Result};

/// Trait that all runtime operators implement.
///
/// Invariants:
/// - Buffers that grow with input size are accounted against
///   `ctx.budget()` through a guard owned by the operator.
/// - Cancellation is checked at least once per consumed input row.
pub trait Operator: Send {
    /// Human-readable operator name (stable).
    fn name(&self) -> &'static str;

    fn next(&mut self, ctx: &ExecContext) -> Result<Option<Row>>;
}

pub type BoxedOperator = Box<dyn Operator>;

/// Pull one row from `input` after checking for cancellation.
#[inline]
pub(crate) fn pull(input: &mut BoxedOperator, ctx: &ExecContext) -> Result<Option<Row>> {
    ctx.check_cancelled()?;
    input.next(ctx)
}

/// Values at `columns`, failing with the operator's id on a bad index.
pub(crate) fn key_of(
    row: &Row,
    columns: &[usize],
    op: OpId,
    node: &'static str,
) -> Result<Vec<Scalar>> {
    columns
        .iter()
        .map(|&c| {
            row.get(c).cloned().ok_or_else(|| {
                ExecError::evaluation(
                    op,
                    node,
                    EvalError::ColumnOutOfRange {
                        index: c as i32,
                        width: row.width(),
                    },
                )
            })
        })
        .collect()
}

/// Plan column indices are validated non-negative at construction.
pub(crate) fn to_columns(indices: &[i32]) -> Vec<usize> {
    indices.iter().map(|&i| i as usize).collect()
}
