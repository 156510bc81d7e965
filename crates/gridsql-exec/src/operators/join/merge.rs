//! Merge join.
//!
//! Precondition: both inputs arrive ascending on their join keys (nulls
//! first). Only the right-side group sharing the current key is buffered. A
//! descending key on either side fails the fragment.

use std::cmp::Ordering;
use std::collections::VecDeque;

use gridsql_core::id::OpId;
use gridsql_core::types::{Row, Scalar};
use gridsql_mem::BudgetGuardImpl;
use gridsql_plan::JoinSpec;

use crate::context::ExecContext;
use crate::error::{ExecError, Result};
use crate::operators::join::JoinPolicy;
use crate::operators::traits::{key_of, pull, BoxedOperator, Operator};

const NODE: &str = "MergeJoin";

fn cmp_keys(a: &[Scalar], b: &[Scalar]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

fn has_null(key: &[Scalar]) -> bool {
    key.iter().any(Scalar::is_null)
}

pub struct MergeJoinOp {
    id: OpId,
    left: BoxedOperator,
    right: BoxedOperator,
    left_keys: Vec<usize>,
    right_keys: Vec<usize>,
    policy: JoinPolicy,
    last_left: Option<Vec<Scalar>>,
    last_right: Option<Vec<Scalar>>,
    /// First right row past the current group, already pulled.
    right_peek: Option<(Vec<Scalar>, Row)>,
    group_key: Option<Vec<Scalar>>,
    group: Vec<Row>,
    guard: BudgetGuardImpl,
    output: VecDeque<Row>,
}

impl MergeJoinOp {
    pub fn new(
        id: OpId,
        left: BoxedOperator,
        right: BoxedOperator,
        spec: &JoinSpec,
        left_keys: Vec<usize>,
        right_keys: Vec<usize>,
        guard: BudgetGuardImpl,
    ) -> Self {
        Self {
            id,
            left,
            right,
            left_keys,
            right_keys,
            policy: JoinPolicy::new(id, NODE, spec),
            last_left: None,
            last_right: None,
            right_peek: None,
            group_key: None,
            group: Vec::new(),
            guard,
            output: VecDeque::new(),
        }
    }

    fn check_order(
        &self,
        side: &'static str,
        last: Option<&Vec<Scalar>>,
        key: &[Scalar],
    ) -> Result<()> {
        if let Some(prev) = last {
            if cmp_keys(key, prev) == Ordering::Less {
                tracing::warn!(op = %self.id, side, "merge join input not ascending");
                return Err(ExecError::ContractViolation(format!(
                    "{NODE} ({}): {side} input is not ascending on its join keys",
                    self.id
                )));
            }
        }
        Ok(())
    }

    /// Next right row with a non-null key, checking ascending order.
    fn pull_right(&mut self, ctx: &ExecContext) -> Result<Option<(Vec<Scalar>, Row)>> {
        if let Some(peeked) = self.right_peek.take() {
            return Ok(Some(peeked));
        }
        while let Some(row) = pull(&mut self.right, ctx)? {
            let key = key_of(&row, &self.right_keys, self.id, NODE)?;
            self.check_order("right", self.last_right.as_ref(), &key)?;
            self.last_right = Some(key.clone());
            if !has_null(&key) {
                return Ok(Some((key, row)));
            }
        }
        Ok(None)
    }

    /// Advance the buffered right group until its key is >= `target` or the
    /// right input is exhausted.
    fn advance_to(&mut self, ctx: &ExecContext, target: &[Scalar]) -> Result<()> {
        loop {
            if let Some(key) = &self.group_key {
                if cmp_keys(key, target) != Ordering::Less {
                    return Ok(());
                }
            }
            self.group.clear();
            self.group_key = None;
            self.guard.reset();

            let Some((key, first)) = self.pull_right(ctx)? else {
                return Ok(());
            };
            let mut bytes = first.approx_size();
            self.guard.grow_to(bytes)?;
            self.group.push(first);
            while let Some((next_key, row)) = self.pull_right(ctx)? {
                if cmp_keys(&next_key, &key) != Ordering::Equal {
                    self.right_peek = Some((next_key, row));
                    break;
                }
                bytes += row.approx_size();
                self.guard.grow_to(bytes)?;
                self.group.push(row);
            }
            tracing::trace!(op = %self.id, rows = self.group.len(), "merge join right group loaded");
            self.group_key = Some(key);
        }
    }
}

impl Operator for MergeJoinOp {
    fn name(&self) -> &'static str {
        NODE
    }

    fn next(&mut self, ctx: &ExecContext) -> Result<Option<Row>> {
        loop {
            if let Some(row) = self.output.pop_front() {
                return Ok(Some(row));
            }
            let Some(left) = pull(&mut self.left, ctx)? else {
                return Ok(None);
            };
            let key = key_of(&left, &self.left_keys, self.id, NODE)?;
            self.check_order("left", self.last_left.as_ref(), &key)?;

            let matching = if has_null(&key) {
                false
            } else {
                self.advance_to(ctx, &key)?;
                self.group_key
                    .as_deref()
                    .is_some_and(|g| cmp_keys(g, &key) == Ordering::Equal)
            };
            let candidates: &[Row] = if matching { &self.group } else { &[] };
            self.policy.probe(&left, candidates, &mut self.output)?;
            self.last_left = Some(key);
        }
    }
}
