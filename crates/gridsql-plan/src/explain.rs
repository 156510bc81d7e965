//! Indented EXPLAIN text for a plan, root first.
//!
//! ```text
//! Project[exprs=[$0, COUNT(*)]]
//!   Aggregate[group=[0], aggs=[COUNT(*)], sorted_prefix=1]
//!     Scan[source=emp]
//! ```

use std::convert::Infallible;
use std::fmt::Write as _;

use crate::node::aggregate::AggregatePhysicalNode;
use crate::node::filter::FilterPhysicalNode;
use crate::node::join::{
    HashJoinPhysicalNode, JoinNode, JoinSpec, MergeJoinPhysicalNode, NestedLoopJoinPhysicalNode,
};
use crate::node::project::ProjectPhysicalNode;
use crate::node::scan::ScanPhysicalNode;
use crate::node::shape::{BinaryNode, UnaryNode};
use crate::node::PhysicalNode;
use crate::visitor::PhysicalNodeVisitor;

/// Builds EXPLAIN lines bottom-up: each callback pops its inputs' finished
/// subtrees and pushes its own.
#[derive(Debug, Default)]
pub struct ExplainPrinter {
    stack: Vec<Vec<String>>,
}

impl ExplainPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, header: String, inputs: usize) {
        let split = self.stack.len().saturating_sub(inputs);
        let children = self.stack.split_off(split);
        let mut lines = vec![header];
        for child in children {
            lines.extend(child.into_iter().map(|l| format!("  {l}")));
        }
        self.stack.push(lines);
    }

    /// Rendered text; empty if nothing was visited.
    pub fn finish(mut self) -> String {
        self.stack.pop().map(|l| l.join("\n")).unwrap_or_default()
    }
}

fn list<T: std::fmt::Display>(items: &[T]) -> String {
    let mut s = String::from("[");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            s.push_str(", ");
        }
        let _ = write!(s, "{item}");
    }
    s.push(']');
    s
}

fn join_header(name: &str, spec: &JoinSpec, keys: Option<(&[i32], &[i32])>) -> String {
    let mut s = format!("{name}[type={}", spec.describe());
    if let Some((l, r)) = keys {
        let _ = write!(s, ", left_keys={}, right_keys={}", list(l), list(r));
    }
    if let Some(c) = spec.condition() {
        let _ = write!(s, ", condition={c}");
    }
    let _ = write!(s, ", right_width={}]", spec.right_row_column_count());
    s
}

impl PhysicalNodeVisitor for ExplainPrinter {
    type Error = Infallible;

    fn on_scan_node(&mut self, node: &ScanPhysicalNode) -> Result<(), Infallible> {
        let mut s = format!("Scan[source={}", node.source());
        if !node.projects().is_empty() {
            let _ = write!(s, ", projects={}", list(node.projects()));
        }
        if let Some(f) = node.filter() {
            let _ = write!(s, ", filter={f}");
        }
        s.push(']');
        self.push(s, 0);
        Ok(())
    }

    fn on_project_node(&mut self, node: &UnaryNode<ProjectPhysicalNode>) -> Result<(), Infallible> {
        self.push(format!("Project[exprs={}]", list(node.projects())), 1);
        Ok(())
    }

    fn on_filter_node(&mut self, node: &UnaryNode<FilterPhysicalNode>) -> Result<(), Infallible> {
        self.push(format!("Filter[condition={}]", node.condition()), 1);
        Ok(())
    }

    fn on_aggregate_node(&mut self, node: &UnaryNode<AggregatePhysicalNode>) -> Result<(), Infallible> {
        self.push(
            format!(
                "Aggregate[group={}, aggs={}, sorted_prefix={}]",
                list(node.group_key()),
                list(node.expressions()),
                node.sorted_prefix_size()
            ),
            1,
        );
        Ok(())
    }

    fn on_nested_loop_join_node(
        &mut self,
        node: &BinaryNode<NestedLoopJoinPhysicalNode>,
    ) -> Result<(), Infallible> {
        self.push(join_header("NestedLoopJoin", node.join(), None), 2);
        Ok(())
    }

    fn on_hash_join_node(&mut self, node: &BinaryNode<HashJoinPhysicalNode>) -> Result<(), Infallible> {
        let keys = Some((node.left_hash_keys(), node.right_hash_keys()));
        self.push(join_header("HashJoin", node.join(), keys), 2);
        Ok(())
    }

    fn on_merge_join_node(&mut self, node: &BinaryNode<MergeJoinPhysicalNode>) -> Result<(), Infallible> {
        let keys = Some((node.left_keys(), node.right_keys()));
        self.push(join_header("MergeJoin", node.join(), keys), 2);
        Ok(())
    }
}

/// Render `plan` as EXPLAIN text.
pub fn explain(plan: &PhysicalNode) -> String {
    let mut printer = ExplainPrinter::new();
    match plan.visit(&mut printer) {
        Ok(()) => printer.finish(),
        Err(never) => match never {},
    }
}
