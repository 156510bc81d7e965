use std::vec::IntoIter;

use gridsql_core::id::OpId;
use gridsql_core::types::Row;
use gridsql_plan::Expression;

use crate::context::ExecContext;
use crate::error::{ExecError, Result};
use crate::operators::traits::Operator;

/// Reads the fragment's partitions of a source. Rows are fetched on the first
/// `next`, then filtered and projected one at a time.
pub struct ScanOp {
    id: OpId,
    source: String,
    projects: Vec<usize>,
    filter: Option<Expression>,
    rows: Option<IntoIter<Row>>,
}

impl ScanOp {
    pub fn new(
        id: OpId,
        source: impl Into<String>,
        projects: Vec<usize>,
        filter: Option<Expression>,
    ) -> Self {
        Self {
            id,
            source: source.into(),
            projects,
            filter,
            rows: None,
        }
    }
}

impl Operator for ScanOp {
    fn name(&self) -> &'static str {
        "Scan"
    }

    fn next(&mut self, ctx: &ExecContext) -> Result<Option<Row>> {
        if self.rows.is_none() {
            let rows = ctx.source().scan(&self.source, ctx.partitions())?;
            tracing::trace!(op = %self.id, source = %self.source, rows = rows.len(), "scan opened");
            self.rows = Some(rows.into_iter());
        }
        let Some(rows) = self.rows.as_mut() else {
            return Ok(None);
        };
        loop {
            ctx.check_cancelled()?;
            let Some(row) = rows.next() else {
                return Ok(None);
            };
            if let Some(filter) = &self.filter {
                let keep = filter
                    .evaluate_predicate(&row)
                    .map_err(|e| ExecError::evaluation(self.id, "Scan", e))?;
                if !keep {
                    continue;
                }
            }
            if self.projects.is_empty() {
                return Ok(Some(row));
            }
            return row
                .project(&self.projects)
                .map(Some)
                .ok_or_else(|| {
                    ExecError::evaluation(
                        self.id,
                        "Scan",
                        gridsql_plan::EvalError::ColumnOutOfRange {
                            index: self.projects.iter().copied().max().unwrap_or(0) as i32,
                            width: row.width(),
                        },
                    )
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::operators::traits::{testing::drain, BoxedOperator};
    use crate::source::MemoryRowSource;
    use gridsql_core::config::ExecConfig;
    use gridsql_core::id::FragmentId;
    use gridsql_core::row;
    use gridsql_plan::expr::{col, lit};

    fn ctx() -> ExecContext {
        let src = MemoryRowSource::new()
            .with_partition("t", 0, vec![row![1, "a"], row![7, "b"]])
            .with_partition("t", 1, vec![row![9, "c"]]);
        ExecContext::new(FragmentId::new(0), Arc::new(src), ExecConfig::default())
    }

    #[test]
    fn test_scan_filters_then_projects() {
        let ctx = ctx();
        let mut op: BoxedOperator = Box::new(ScanOp::new(
            OpId::new(0),
            "t",
            vec![1],
            Some(col(0).gt(lit(5))),
        ));
        assert_eq!(drain(&mut op, &ctx).unwrap(), vec![row!["b"], row!["c"]]);
    }

    #[test]
    fn test_scan_respects_partitions() {
        let ctx = ctx().with_partitions(vec![1]);
        let mut op: BoxedOperator = Box::new(ScanOp::new(OpId::new(0), "t", vec![], None));
        assert_eq!(drain(&mut op, &ctx).unwrap(), vec![row![9, "c"]]);
    }

    #[test]
    fn test_scan_bad_projection() {
        let ctx = ctx();
        let mut op: BoxedOperator = Box::new(ScanOp::new(OpId::new(4), "t", vec![5], None));
        assert!(matches!(
            op.next(&ctx),
            Err(ExecError::Evaluation { node: "Scan", .. })
        ));
    }
}
