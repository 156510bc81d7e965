use std::collections::VecDeque;

use gridsql_core::id::OpId;
use gridsql_core::types::Row;
use gridsql_mem::BudgetGuardImpl;
use gridsql_plan::JoinSpec;

use crate::context::ExecContext;
use crate::error::Result;
use crate::operators::join::JoinPolicy;
use crate::operators::traits::{pull, BoxedOperator, Operator};

/// Buffers the right input once, then streams the left input against it.
/// Output follows left order, then right order within a left row.
pub struct NestedLoopJoinOp {
    id: OpId,
    left: BoxedOperator,
    right: BoxedOperator,
    policy: JoinPolicy,
    build: Option<Vec<Row>>,
    guard: BudgetGuardImpl,
    output: VecDeque<Row>,
}

impl NestedLoopJoinOp {
    pub fn new(
        id: OpId,
        left: BoxedOperator,
        right: BoxedOperator,
        spec: &JoinSpec,
        guard: BudgetGuardImpl,
    ) -> Self {
        Self {
            id,
            left,
            right,
            policy: JoinPolicy::new(id, "NestedLoopJoin", spec),
            build: None,
            guard,
            output: VecDeque::new(),
        }
    }

    fn buffer_right(&mut self, ctx: &ExecContext) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        let mut bytes = 0;
        while let Some(row) = pull(&mut self.right, ctx)? {
            bytes += row.approx_size();
            self.guard.grow_to(bytes)?;
            rows.push(row);
        }
        tracing::trace!(op = %self.id, rows = rows.len(), bytes, "nested loop build side buffered");
        Ok(rows)
    }
}

impl Operator for NestedLoopJoinOp {
    fn name(&self) -> &'static str {
        "NestedLoopJoin"
    }

    fn next(&mut self, ctx: &ExecContext) -> Result<Option<Row>> {
        if self.build.is_none() {
            self.build = Some(self.buffer_right(ctx)?);
        }
        loop {
            if let Some(row) = self.output.pop_front() {
                return Ok(Some(row));
            }
            let Some(left) = pull(&mut self.left, ctx)? else {
                return Ok(None);
            };
            let build = self.build.as_deref().unwrap_or_default();
            self.policy.probe(&left, build, &mut self.output)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::join::fixtures;
    use crate::operators::traits::testing::{ctx, drain, Values};
    use gridsql_core::budget::MemoryBudget;
    use gridsql_mem::MemoryBudgetImpl;
    use gridsql_plan::expr::col;

    fn run(outer: bool, semi: bool) -> Vec<Row> {
        let budget = MemoryBudgetImpl::new(1 << 20);
        let spec = JoinSpec::new(Some(col(1).equal(col(2))), outer, semi, 2).unwrap();
        let mut op: BoxedOperator = Box::new(NestedLoopJoinOp::new(
            OpId::new(2),
            Values::boxed(fixtures::left()),
            Values::boxed(fixtures::right()),
            &spec,
            budget.empty_guard("join_build"),
        ));
        let rows = drain(&mut op, &ctx()).unwrap();
        drop(op);
        assert_eq!(budget.used_bytes(), 0);
        rows
    }

    #[test]
    fn test_policy_matrix() {
        for (outer, semi) in [(false, false), (true, false), (false, true), (true, true)] {
            assert_eq!(run(outer, semi), fixtures::expected(outer, semi), "outer={outer} semi={semi}");
        }
    }

    #[test]
    fn test_unconditional_join_is_cross_product() {
        let budget = MemoryBudgetImpl::new(1 << 20);
        let spec = JoinSpec::inner(None, 2).unwrap();
        let mut op: BoxedOperator = Box::new(NestedLoopJoinOp::new(
            OpId::new(2),
            Values::boxed(fixtures::left()),
            Values::boxed(fixtures::right()),
            &spec,
            budget.empty_guard("join_build"),
        ));
        assert_eq!(drain(&mut op, &ctx()).unwrap().len(), 16);
    }
}
