//! Join operators.
//!
//! All strategies share [`JoinPolicy`], which turns "this left row and these
//! candidate right rows" into output rows according to the outer/semi flags.
//! The strategies only differ in how they find candidates.

pub mod hash;
pub mod merge;
pub mod nested_loop;

use std::collections::VecDeque;

use gridsql_core::id::OpId;
use gridsql_core::types::{Row, Scalar};
use gridsql_plan::{Expression, JoinSpec};

use crate::error::{ExecError, Result};

pub use hash::HashJoinOp;
pub use merge::MergeJoinOp;
pub use nested_loop::NestedLoopJoinOp;

pub(crate) struct JoinPolicy {
    op: OpId,
    node: &'static str,
    condition: Option<Expression>,
    outer: bool,
    semi: bool,
    padding_width: usize,
}

impl JoinPolicy {
    pub(crate) fn new(op: OpId, node: &'static str, spec: &JoinSpec) -> Self {
        Self {
            op,
            node,
            condition: spec.condition().cloned(),
            outer: spec.is_outer(),
            semi: spec.is_semi(),
            padding_width: spec.padding_width(),
        }
    }

    fn matches(&self, joined: &Row) -> Result<bool> {
        match &self.condition {
            None => Ok(true),
            Some(c) => c
                .evaluate_predicate(joined)
                .map_err(|e| ExecError::evaluation(self.op, self.node, e)),
        }
    }

    /// `left` followed by nulls for the absent right side. Built only for
    /// unmatched outer rows, never up front.
    fn pad(&self, left: &Row) -> Row {
        let mut values = Vec::with_capacity(left.width() + self.padding_width);
        values.extend_from_slice(left.values());
        values.extend(std::iter::repeat(Scalar::Null).take(self.padding_width));
        Row::new(values)
    }

    /// Emit the output rows for one left row.
    pub(crate) fn probe<'a, I>(&self, left: &Row, candidates: I, out: &mut VecDeque<Row>) -> Result<()>
    where
        I: IntoIterator<Item = &'a Row>,
    {
        let mut matched = false;
        for right in candidates {
            let joined = Row::concat(left, right);
            if self.matches(&joined)? {
                matched = true;
                if self.semi {
                    break;
                }
                out.push_back(joined);
            }
        }
        if self.semi {
            if matched || self.outer {
                out.push_back(left.clone());
            }
        } else if !matched && self.outer {
            out.push_back(self.pad(left));
        }
        Ok(())
    }
}
