use gridsql_core::id::OpId;
use gridsql_core::types::Row;
use gridsql_plan::Expression;

use crate::context::ExecContext;
use crate::error::{ExecError, Result};
use crate::operators::traits::{pull, BoxedOperator, Operator};

pub struct FilterOp {
    id: OpId,
    input: BoxedOperator,
    condition: Expression,
}

impl FilterOp {
    pub fn new(id: OpId, input: BoxedOperator, condition: Expression) -> Self {
        Self {
            id,
            input,
            condition,
        }
    }
}

impl Operator for FilterOp {
    fn name(&self) -> &'static str {
        "Filter"
    }

    fn next(&mut self, ctx: &ExecContext) -> Result<Option<Row>> {
        while let Some(row) = pull(&mut self.input, ctx)? {
            let keep = self
                .condition
                .evaluate_predicate(&row)
                .map_err(|e| ExecError::evaluation(self.id, "Filter", e))?;
            if keep {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::traits::testing::{ctx, drain, Values};
    use gridsql_core::row;
    use gridsql_core::types::Scalar;
    use gridsql_plan::expr::{col, lit};

    #[test]
    fn test_null_condition_drops_row() {
        let input = Values::boxed(vec![
            row![1],
            Row::new(vec![Scalar::Null]),
            row![3],
        ]);
        let mut op: BoxedOperator = Box::new(FilterOp::new(OpId::new(0), input, col(0).gt(lit(1))));
        assert_eq!(drain(&mut op, &ctx()).unwrap(), vec![row![3]]);
    }
}
