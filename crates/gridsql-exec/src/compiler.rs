//! Plan -> operator pipeline.
//!
//! `PlanCompiler` is a visitor: the tree walk is post-order, so by the time a
//! node's callback runs its inputs' operators are on top of the stack. Each
//! callback pops them (right before left) and pushes its own operator.

use gridsql_core::id::OpId;
use gridsql_mem::MemoryBudgetImpl;
use gridsql_plan::node::aggregate::AggregatePhysicalNode;
use gridsql_plan::node::filter::FilterPhysicalNode;
use gridsql_plan::node::join::{
    HashJoinPhysicalNode, JoinNode, MergeJoinPhysicalNode, NestedLoopJoinPhysicalNode,
};
use gridsql_plan::node::project::ProjectPhysicalNode;
use gridsql_plan::node::scan::ScanPhysicalNode;
use gridsql_plan::{BinaryNode, PhysicalNode, PhysicalNodeVisitor, UnaryNode};

use crate::context::ExecContext;
use crate::error::{ExecError, Result};
use crate::operators::traits::{to_columns, BoxedOperator};
use crate::operators::{
    AggregateOp, FilterOp, HashJoinOp, MergeJoinOp, NestedLoopJoinOp, ProjectOp, ScanOp,
};

pub struct PlanCompiler {
    budget: MemoryBudgetImpl,
    verify_sorted_prefix: bool,
    next_id: u64,
    stack: Vec<BoxedOperator>,
}

impl PlanCompiler {
    pub fn new(ctx: &ExecContext) -> Self {
        Self {
            budget: ctx.budget().clone(),
            verify_sorted_prefix: ctx.config().verify_sorted_prefix,
            next_id: 0,
            stack: Vec::new(),
        }
    }

    /// Compile `plan` into its root operator.
    pub fn compile(plan: &PhysicalNode, ctx: &ExecContext) -> Result<BoxedOperator> {
        let mut compiler = Self::new(ctx);
        plan.visit(&mut compiler)?;
        compiler.finish()
    }

    /// Number of operators created so far.
    pub fn op_count(&self) -> u64 {
        self.next_id
    }

    pub fn finish(mut self) -> Result<BoxedOperator> {
        match (self.stack.pop(), self.stack.is_empty()) {
            (Some(root), true) => Ok(root),
            (None, _) => Err(ExecError::Compile("no operator produced".into())),
            (Some(_), false) => Err(ExecError::Compile(format!(
                "{} dangling operators after compilation",
                self.stack.len()
            ))),
        }
    }

    fn assign_id(&mut self) -> OpId {
        let id = OpId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn pop(&mut self, node: &'static str) -> Result<BoxedOperator> {
        self.stack
            .pop()
            .ok_or_else(|| ExecError::Compile(format!("{node} is missing an input operator")))
    }

    fn pop_pair(&mut self, node: &'static str) -> Result<(BoxedOperator, BoxedOperator)> {
        let right = self.pop(node)?;
        let left = self.pop(node)?;
        Ok((left, right))
    }
}

impl PhysicalNodeVisitor for PlanCompiler {
    type Error = ExecError;

    fn on_scan_node(&mut self, node: &ScanPhysicalNode) -> Result<()> {
        let id = self.assign_id();
        self.stack.push(Box::new(ScanOp::new(
            id,
            node.source(),
            to_columns(node.projects()),
            node.filter().cloned(),
        )));
        Ok(())
    }

    fn on_project_node(&mut self, node: &UnaryNode<ProjectPhysicalNode>) -> Result<()> {
        let input = self.pop("Project")?;
        let id = self.assign_id();
        self.stack
            .push(Box::new(ProjectOp::new(id, input, node.projects().to_vec())));
        Ok(())
    }

    fn on_filter_node(&mut self, node: &UnaryNode<FilterPhysicalNode>) -> Result<()> {
        let input = self.pop("Filter")?;
        let id = self.assign_id();
        self.stack
            .push(Box::new(FilterOp::new(id, input, node.condition().clone())));
        Ok(())
    }

    fn on_aggregate_node(&mut self, node: &UnaryNode<AggregatePhysicalNode>) -> Result<()> {
        let input = self.pop("Aggregate")?;
        let id = self.assign_id();
        self.stack.push(Box::new(AggregateOp::new(
            id,
            input,
            to_columns(node.group_key()),
            node.expressions().to_vec(),
            node.sorted_prefix_size() as usize,
            self.verify_sorted_prefix,
            self.budget.empty_guard("aggregate"),
        )));
        Ok(())
    }

    fn on_nested_loop_join_node(
        &mut self,
        node: &BinaryNode<NestedLoopJoinPhysicalNode>,
    ) -> Result<()> {
        let (left, right) = self.pop_pair("NestedLoopJoin")?;
        let id = self.assign_id();
        self.stack.push(Box::new(NestedLoopJoinOp::new(
            id,
            left,
            right,
            node.join(),
            self.budget.empty_guard("nested_loop_build"),
        )));
        Ok(())
    }

    fn on_hash_join_node(&mut self, node: &BinaryNode<HashJoinPhysicalNode>) -> Result<()> {
        let (left, right) = self.pop_pair("HashJoin")?;
        let id = self.assign_id();
        self.stack.push(Box::new(HashJoinOp::new(
            id,
            left,
            right,
            node.join(),
            to_columns(node.left_hash_keys()),
            to_columns(node.right_hash_keys()),
            self.budget.empty_guard("hash_build"),
        )));
        Ok(())
    }

    fn on_merge_join_node(&mut self, node: &BinaryNode<MergeJoinPhysicalNode>) -> Result<()> {
        let (left, right) = self.pop_pair("MergeJoin")?;
        let id = self.assign_id();
        self.stack.push(Box::new(MergeJoinOp::new(
            id,
            left,
            right,
            node.join(),
            to_columns(node.left_keys()),
            to_columns(node.right_keys()),
            self.budget.empty_guard("merge_group"),
        )));
        Ok(())
    }
}
