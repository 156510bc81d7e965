use gridsql_core::budget::MemoryBudget;
use gridsql_core::hash::Hash256;
use gridsql_core::id::FragmentId;
use gridsql_core::types::Row;
use gridsql_plan::{plan_fingerprint, PhysicalNode};

use crate::compiler::PlanCompiler;
use crate::context::ExecContext;
use crate::error::Result;
use crate::operators::traits::BoxedOperator;

/// One compiled pipeline bound to its context. Dropping the fragment drops
/// every operator and therefore returns all reserved memory to the budget.
pub struct Fragment {
    ctx: ExecContext,
    root: BoxedOperator,
    fingerprint: Hash256,
    rows_out: u64,
    done: bool,
}

impl std::fmt::Debug for Fragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fragment")
            .field("fragment", &self.ctx.fragment())
            .field("root", &self.root.name())
            .field("plan", &self.fingerprint.short())
            .field("rows_out", &self.rows_out)
            .finish()
    }
}

impl Fragment {
    pub fn compile(plan: &PhysicalNode, ctx: ExecContext) -> Result<Self> {
        let fingerprint = plan_fingerprint(plan);
        let root = PlanCompiler::compile(plan, &ctx)?;
        tracing::debug!(
            fragment = %ctx.fragment(),
            plan = %fingerprint.short(),
            nodes = plan.node_count(),
            root = root.name(),
            "fragment compiled"
        );
        Ok(Self {
            ctx,
            root,
            fingerprint,
            rows_out: 0,
            done: false,
        })
    }

    pub fn id(&self) -> FragmentId {
        self.ctx.fragment()
    }

    pub fn context(&self) -> &ExecContext {
        &self.ctx
    }

    pub fn fingerprint(&self) -> Hash256 {
        self.fingerprint
    }

    pub fn rows_out(&self) -> u64 {
        self.rows_out
    }

    pub fn next_row(&mut self) -> Result<Option<Row>> {
        if self.done {
            return Ok(None);
        }
        match self.root.next(&self.ctx) {
            Ok(Some(row)) => {
                self.rows_out += 1;
                Ok(Some(row))
            }
            Ok(None) => {
                self.done = true;
                tracing::debug!(
                    fragment = %self.ctx.fragment(),
                    rows = self.rows_out,
                    budget_used = self.ctx.budget().used_bytes(),
                    "fragment finished"
                );
                Ok(None)
            }
            Err(e) => {
                self.done = true;
                tracing::debug!(fragment = %self.ctx.fragment(), error = %e, "fragment failed");
                Err(e)
            }
        }
    }

    /// Drive the pipeline to completion.
    pub fn collect(mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row()? {
            rows.push(row);
        }
        Ok(rows)
    }
}
