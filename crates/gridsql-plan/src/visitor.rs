//! Bottom-up visitor over a plan tree.

use std::collections::BTreeMap;
use std::convert::Infallible;

use crate::node::aggregate::AggregatePhysicalNode;
use crate::node::filter::FilterPhysicalNode;
use crate::node::join::{HashJoinPhysicalNode, MergeJoinPhysicalNode, NestedLoopJoinPhysicalNode};
use crate::node::project::ProjectPhysicalNode;
use crate::node::scan::ScanPhysicalNode;
use crate::node::shape::{BinaryNode, UnaryNode};
use crate::node::NodeKind;

/// One callback per node type. [`PhysicalNode::visit`] calls each exactly
/// once, after all callbacks of the node's upstreams have returned.
///
/// [`PhysicalNode::visit`]: crate::node::PhysicalNode::visit
pub trait PhysicalNodeVisitor {
    type Error;

    fn on_scan_node(&mut self, node: &ScanPhysicalNode) -> Result<(), Self::Error>;

    fn on_project_node(&mut self, node: &UnaryNode<ProjectPhysicalNode>) -> Result<(), Self::Error>;

    fn on_filter_node(&mut self, node: &UnaryNode<FilterPhysicalNode>) -> Result<(), Self::Error>;

    fn on_aggregate_node(
        &mut self,
        node: &UnaryNode<AggregatePhysicalNode>,
    ) -> Result<(), Self::Error>;

    fn on_nested_loop_join_node(
        &mut self,
        node: &BinaryNode<NestedLoopJoinPhysicalNode>,
    ) -> Result<(), Self::Error>;

    fn on_hash_join_node(&mut self, node: &BinaryNode<HashJoinPhysicalNode>) -> Result<(), Self::Error>;

    fn on_merge_join_node(
        &mut self,
        node: &BinaryNode<MergeJoinPhysicalNode>,
    ) -> Result<(), Self::Error>;
}

/// Counts nodes by kind and records the visitation order.
#[derive(Debug, Default)]
pub struct NodeCounter {
    counts: BTreeMap<NodeKind, usize>,
    order: Vec<NodeKind>,
}

impl NodeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, kind: NodeKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.order.len()
    }

    pub fn order(&self) -> &[NodeKind] {
        &self.order
    }

    fn record(&mut self, kind: NodeKind) -> Result<(), Infallible> {
        *self.counts.entry(kind).or_default() += 1;
        self.order.push(kind);
        Ok(())
    }
}

impl PhysicalNodeVisitor for NodeCounter {
    type Error = Infallible;

    fn on_scan_node(&mut self, _: &ScanPhysicalNode) -> Result<(), Infallible> {
        self.record(NodeKind::Scan)
    }

    fn on_project_node(&mut self, _: &UnaryNode<ProjectPhysicalNode>) -> Result<(), Infallible> {
        self.record(NodeKind::Project)
    }

    fn on_filter_node(&mut self, _: &UnaryNode<FilterPhysicalNode>) -> Result<(), Infallible> {
        self.record(NodeKind::Filter)
    }

    fn on_aggregate_node(&mut self, _: &UnaryNode<AggregatePhysicalNode>) -> Result<(), Infallible> {
        self.record(NodeKind::Aggregate)
    }

    fn on_nested_loop_join_node(
        &mut self,
        _: &BinaryNode<NestedLoopJoinPhysicalNode>,
    ) -> Result<(), Infallible> {
        self.record(NodeKind::NestedLoopJoin)
    }

    fn on_hash_join_node(&mut self, _: &BinaryNode<HashJoinPhysicalNode>) -> Result<(), Infallible> {
        self.record(NodeKind::HashJoin)
    }

    fn on_merge_join_node(&mut self, _: &BinaryNode<MergeJoinPhysicalNode>) -> Result<(), Infallible> {
        self.record(NodeKind::MergeJoin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::col;
    use crate::node::join::JoinSpec;
    use crate::node::PhysicalNode;

    #[test]
    fn test_children_before_parent_left_before_right() {
        let left = PhysicalNode::filter(PhysicalNode::scan("l", vec![], None).unwrap(), col(0).is_null());
        let right = PhysicalNode::project(PhysicalNode::scan("r", vec![], None).unwrap(), vec![col(0)]);
        let join = PhysicalNode::nested_loop_join(left, right, JoinSpec::inner(None, 1).unwrap());

        let mut counter = NodeCounter::new();
        join.visit(&mut counter).unwrap();
        assert_eq!(
            counter.order(),
            &[
                NodeKind::Scan,
                NodeKind::Filter,
                NodeKind::Scan,
                NodeKind::Project,
                NodeKind::NestedLoopJoin
            ]
        );
        assert_eq!(counter.count(NodeKind::Scan), 2);
        assert_eq!(counter.total(), 5);
    }

    struct FailOnProject(usize);

    impl PhysicalNodeVisitor for FailOnProject {
        type Error = String;

        fn on_scan_node(&mut self, _: &ScanPhysicalNode) -> Result<(), String> {
            self.0 += 1;
            Ok(())
        }
        fn on_project_node(&mut self, _: &UnaryNode<ProjectPhysicalNode>) -> Result<(), String> {
            Err("project".into())
        }
        fn on_filter_node(&mut self, _: &UnaryNode<FilterPhysicalNode>) -> Result<(), String> {
            Ok(())
        }
        fn on_aggregate_node(&mut self, _: &UnaryNode<AggregatePhysicalNode>) -> Result<(), String> {
            Ok(())
        }
        fn on_nested_loop_join_node(
            &mut self,
            _: &BinaryNode<NestedLoopJoinPhysicalNode>,
        ) -> Result<(), String> {
            Ok(())
        }
        fn on_hash_join_node(&mut self, _: &BinaryNode<HashJoinPhysicalNode>) -> Result<(), String> {
            Ok(())
        }
        fn on_merge_join_node(&mut self, _: &BinaryNode<MergeJoinPhysicalNode>) -> Result<(), String> {
            Ok(())
        }
    }

    #[test]
    fn test_callback_error_stops_walk() {
        let left = PhysicalNode::project(PhysicalNode::scan("l", vec![], None).unwrap(), vec![]);
        let join = PhysicalNode::nested_loop_join(
            left,
            PhysicalNode::scan("r", vec![], None).unwrap(),
            JoinSpec::inner(None, 0).unwrap(),
        );
        let mut v = FailOnProject(0);
        assert_eq!(join.visit(&mut v), Err("project".to_string()));
        // The right scan is never reached.
        assert_eq!(v.0, 1);
    }
}
