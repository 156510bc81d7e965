use gridsql_core::id::OpId;
use gridsql_core::types::Row;
use gridsql_plan::Expression;

use crate::context::ExecContext;
use crate::error::{ExecError, Result};
use crate::operators::traits::{pull, BoxedOperator, Operator};

/// One output row per input row, one column per expression.
pub struct ProjectOp {
    id: OpId,
    input: BoxedOperator,
    projects: Vec<Expression>,
}

impl ProjectOp {
    pub fn new(id: OpId, input: BoxedOperator, projects: Vec<Expression>) -> Self {
        Self {
            id,
            input,
            projects,
        }
    }
}

impl Operator for ProjectOp {
    fn name(&self) -> &'static str {
        "Project"
    }

    fn next(&mut self, ctx: &ExecContext) -> Result<Option<Row>> {
        let Some(row) = pull(&mut self.input, ctx)? else {
            return Ok(None);
        };
        let values = self
            .projects
            .iter()
            .map(|e| e.evaluate(&row))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ExecError::evaluation(self.id, "Project", e))?;
        Ok(Some(Row::new(values)))
    }
}
