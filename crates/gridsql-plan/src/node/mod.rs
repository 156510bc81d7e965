//! The physical plan tree.

pub mod aggregate;
pub mod filter;
pub mod join;
pub mod project;
pub mod scan;
pub mod shape;

use crate::codec::{PlanReader, PlanWriter, WireObject};
use crate::error::{PlanDecodeError, Result};
use crate::expr::aggregate::AggregateExpression;
use crate::expr::Expression;
use crate::visitor::PhysicalNodeVisitor;

use self::aggregate::AggregatePhysicalNode;
use self::filter::FilterPhysicalNode;
use self::join::{HashJoinPhysicalNode, JoinSpec, MergeJoinPhysicalNode, NestedLoopJoinPhysicalNode};
use self::project::ProjectPhysicalNode;
use self::scan::ScanPhysicalNode;
use self::shape::{BinaryNode, UnaryNode};

/// Operator kind; doubles as the wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum NodeKind {
    Scan = 0,
    Project = 1,
    Filter = 2,
    Aggregate = 3,
    NestedLoopJoin = 4,
    HashJoin = 5,
    MergeJoin = 6,
}

impl NodeKind {
    pub const ALL: [NodeKind; 7] = [
        NodeKind::Scan,
        NodeKind::Project,
        NodeKind::Filter,
        NodeKind::Aggregate,
        NodeKind::NestedLoopJoin,
        NodeKind::HashJoin,
        NodeKind::MergeJoin,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Scan => "Scan",
            NodeKind::Project => "Project",
            NodeKind::Filter => "Filter",
            NodeKind::Aggregate => "Aggregate",
            NodeKind::NestedLoopJoin => "NestedLoopJoin",
            NodeKind::HashJoin => "HashJoin",
            NodeKind::MergeJoin => "MergeJoin",
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        NodeKind::ALL.get(tag as usize).copied()
    }
}

/// A node of the physical plan. Upstreams are owned; the tree has no
/// sharing and no cycles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PhysicalNode {
    Scan(ScanPhysicalNode),
    Project(UnaryNode<ProjectPhysicalNode>),
    Filter(UnaryNode<FilterPhysicalNode>),
    Aggregate(UnaryNode<AggregatePhysicalNode>),
    NestedLoopJoin(BinaryNode<NestedLoopJoinPhysicalNode>),
    HashJoin(BinaryNode<HashJoinPhysicalNode>),
    MergeJoin(BinaryNode<MergeJoinPhysicalNode>),
}

impl PhysicalNode {
    pub fn scan(
        source: impl Into<String>,
        projects: Vec<i32>,
        filter: Option<Expression>,
    ) -> Result<Self> {
        Ok(PhysicalNode::Scan(ScanPhysicalNode::new(source, projects, filter)?))
    }

    pub fn project(upstream: PhysicalNode, projects: Vec<Expression>) -> Self {
        PhysicalNode::Project(UnaryNode::new(upstream, ProjectPhysicalNode::new(projects)))
    }

    pub fn filter(upstream: PhysicalNode, condition: Expression) -> Self {
        PhysicalNode::Filter(UnaryNode::new(upstream, FilterPhysicalNode::new(condition)))
    }

    pub fn aggregate(
        upstream: PhysicalNode,
        group_key: Vec<i32>,
        expressions: Vec<AggregateExpression>,
        sorted_prefix_size: i32,
    ) -> Result<Self> {
        let body = AggregatePhysicalNode::new(group_key, expressions, sorted_prefix_size)?;
        Ok(PhysicalNode::Aggregate(UnaryNode::new(upstream, body)))
    }

    pub fn nested_loop_join(left: PhysicalNode, right: PhysicalNode, spec: JoinSpec) -> Self {
        PhysicalNode::NestedLoopJoin(BinaryNode::new(
            left,
            right,
            NestedLoopJoinPhysicalNode::new(spec),
        ))
    }

    pub fn hash_join(
        left: PhysicalNode,
        right: PhysicalNode,
        spec: JoinSpec,
        left_hash_keys: Vec<i32>,
        right_hash_keys: Vec<i32>,
    ) -> Result<Self> {
        let body = HashJoinPhysicalNode::new(spec, left_hash_keys, right_hash_keys)?;
        Ok(PhysicalNode::HashJoin(BinaryNode::new(left, right, body)))
    }

    pub fn merge_join(
        left: PhysicalNode,
        right: PhysicalNode,
        spec: JoinSpec,
        left_keys: Vec<i32>,
        right_keys: Vec<i32>,
    ) -> Result<Self> {
        let body = MergeJoinPhysicalNode::new(spec, left_keys, right_keys)?;
        Ok(PhysicalNode::MergeJoin(BinaryNode::new(left, right, body)))
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            PhysicalNode::Scan(_) => NodeKind::Scan,
            PhysicalNode::Project(_) => NodeKind::Project,
            PhysicalNode::Filter(_) => NodeKind::Filter,
            PhysicalNode::Aggregate(_) => NodeKind::Aggregate,
            PhysicalNode::NestedLoopJoin(_) => NodeKind::NestedLoopJoin,
            PhysicalNode::HashJoin(_) => NodeKind::HashJoin,
            PhysicalNode::MergeJoin(_) => NodeKind::MergeJoin,
        }
    }

    /// Direct upstreams, left before right.
    pub fn inputs(&self) -> Vec<&PhysicalNode> {
        match self {
            PhysicalNode::Scan(_) => Vec::new(),
            PhysicalNode::Project(n) => vec![n.upstream()],
            PhysicalNode::Filter(n) => vec![n.upstream()],
            PhysicalNode::Aggregate(n) => vec![n.upstream()],
            PhysicalNode::NestedLoopJoin(n) => vec![n.left(), n.right()],
            PhysicalNode::HashJoin(n) => vec![n.left(), n.right()],
            PhysicalNode::MergeJoin(n) => vec![n.left(), n.right()],
        }
    }

    pub fn is_unary(&self) -> bool {
        self.inputs().len() == 1
    }

    pub fn is_binary(&self) -> bool {
        self.inputs().len() == 2
    }

    /// Total node count of the subtree rooted here.
    pub fn node_count(&self) -> usize {
        1 + self.inputs().into_iter().map(PhysicalNode::node_count).sum::<usize>()
    }

    /// Depth-first, post-order walk: upstreams (left then right) first, then
    /// this node's callback. The first callback error stops the walk.
    pub fn visit<V>(&self, visitor: &mut V) -> std::result::Result<(), V::Error>
    where
        V: PhysicalNodeVisitor + ?Sized,
    {
        match self {
            PhysicalNode::Scan(n) => visitor.on_scan_node(n),
            PhysicalNode::Project(n) => n.accept(visitor, |v, n| v.on_project_node(n)),
            PhysicalNode::Filter(n) => n.accept(visitor, |v, n| v.on_filter_node(n)),
            PhysicalNode::Aggregate(n) => n.accept(visitor, |v, n| v.on_aggregate_node(n)),
            PhysicalNode::NestedLoopJoin(n) => {
                n.accept(visitor, |v, n| v.on_nested_loop_join_node(n))
            }
            PhysicalNode::HashJoin(n) => n.accept(visitor, |v, n| v.on_hash_join_node(n)),
            PhysicalNode::MergeJoin(n) => n.accept(visitor, |v, n| v.on_merge_join_node(n)),
        }
    }
}

impl WireObject for PhysicalNode {
    fn write_to(&self, out: &mut PlanWriter) {
        out.write_byte(self.kind() as u8);
        match self {
            PhysicalNode::Scan(n) => n.write_to(out),
            PhysicalNode::Project(n) => n.write_to(out),
            PhysicalNode::Filter(n) => n.write_to(out),
            PhysicalNode::Aggregate(n) => n.write_to(out),
            PhysicalNode::NestedLoopJoin(n) => n.write_to(out),
            PhysicalNode::HashJoin(n) => n.write_to(out),
            PhysicalNode::MergeJoin(n) => n.write_to(out),
        }
    }

    fn read_from(input: &mut PlanReader) -> std::result::Result<Self, PlanDecodeError> {
        let tag = input.read_byte("node tag")?;
        let kind = NodeKind::from_tag(tag).ok_or(PlanDecodeError::UnknownTag {
            what: "physical node",
            tag,
        })?;
        Ok(match kind {
            NodeKind::Scan => PhysicalNode::Scan(ScanPhysicalNode::read_from(input)?),
            NodeKind::Project => PhysicalNode::Project(UnaryNode::read_from(input)?),
            NodeKind::Filter => PhysicalNode::Filter(UnaryNode::read_from(input)?),
            NodeKind::Aggregate => PhysicalNode::Aggregate(UnaryNode::read_from(input)?),
            NodeKind::NestedLoopJoin => PhysicalNode::NestedLoopJoin(BinaryNode::read_from(input)?),
            NodeKind::HashJoin => PhysicalNode::HashJoin(BinaryNode::read_from(input)?),
            NodeKind::MergeJoin => PhysicalNode::MergeJoin(BinaryNode::read_from(input)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_plan, encode_plan, DecodeLimits};
    use crate::expr::{col, lit};

    fn scan(name: &str) -> PhysicalNode {
        PhysicalNode::scan(name, vec![], None).unwrap()
    }

    fn round_trip(plan: &PhysicalNode) -> PhysicalNode {
        decode_plan(encode_plan(plan), &DecodeLimits::default()).unwrap()
    }

    #[test]
    fn test_every_kind_round_trips() {
        let filtered = PhysicalNode::filter(
            PhysicalNode::scan("emp", vec![0, 2], Some(col(1).gt(lit(5)))).unwrap(),
            col(0).is_null().negate(),
        );
        let agg = PhysicalNode::aggregate(
            filtered,
            vec![0, 1],
            vec![
                AggregateExpression::count_star(),
                AggregateExpression::sum(col(1)).distinct(),
            ],
            1,
        )
        .unwrap();
        let spec = JoinSpec::new(Some(col(0).equal(col(3))), true, true, 2).unwrap();
        let nl = PhysicalNode::nested_loop_join(agg, scan("dept"), spec.clone());
        let hj =
            PhysicalNode::hash_join(nl, scan("loc"), spec.clone(), vec![0], vec![1]).unwrap();
        let mj = PhysicalNode::merge_join(scan("a"), hj, spec, vec![0], vec![0]).unwrap();
        let plan = PhysicalNode::project(mj, vec![col(0).plus(lit(1i64)), lit("x")]);

        assert_eq!(round_trip(&plan), plan);
        assert_eq!(plan.node_count(), 10);
    }

    #[test]
    fn test_semi_flag_survives_wire() {
        let semi = JoinSpec::new(None, false, true, 3).unwrap();
        let plan = PhysicalNode::nested_loop_join(scan("l"), scan("r"), semi);
        let PhysicalNode::NestedLoopJoin(decoded) = round_trip(&plan) else {
            panic!("expected nested loop join");
        };
        use crate::node::join::JoinNode;
        assert!(decoded.join().is_semi());
        assert_eq!(decoded.join().right_row_column_count(), 3);
    }

    #[test]
    fn test_unknown_node_tag() {
        let err = decode_plan(bytes::Bytes::from_static(&[42]), &DecodeLimits::default())
            .unwrap_err();
        assert_eq!(
            err,
            PlanDecodeError::UnknownTag {
                what: "physical node",
                tag: 42
            }
        );
    }

    #[test]
    fn test_decode_rejects_oversized_sorted_prefix() {
        let mut out = PlanWriter::new();
        out.write_byte(NodeKind::Aggregate as u8);
        scan("t").write_to(&mut out);
        out.write_list(&[0i32]);
        out.write_list::<AggregateExpression>(&[]);
        out.write_int(2);
        let err = decode_plan(out.finish(), &DecodeLimits::default()).unwrap_err();
        assert!(matches!(err, PlanDecodeError::InvalidField(_)));
    }

    #[test]
    fn test_depth_limit() {
        let mut plan = scan("t");
        for _ in 0..10 {
            plan = PhysicalNode::filter(plan, lit(true));
        }
        let limits = DecodeLimits {
            max_depth: 5,
            ..DecodeLimits::default()
        };
        assert_eq!(
            decode_plan(encode_plan(&plan), &limits).unwrap_err(),
            PlanDecodeError::TooDeep(5)
        );
    }

    #[test]
    fn test_arity_helpers() {
        let plan = PhysicalNode::project(scan("t"), vec![col(0)]);
        assert!(plan.is_unary());
        assert!(!plan.is_binary());
        assert_eq!(plan.kind(), NodeKind::Project);
        assert_eq!(plan.inputs()[0].kind(), NodeKind::Scan);
    }
}
