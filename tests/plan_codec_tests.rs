//! Plan wire format and traversal tests

use bytes::{BufMut, Bytes, BytesMut};
use gridsql::plan::expr::{col, lit};
use gridsql::plan::{JoinNode, NodeCounter, NodeKind};
use gridsql::{
    decode_plan, encode_plan, AggregateExpression, DecodeLimits, JoinSpec, PhysicalNode,
    PlanDecodeError,
};

fn scan(source: &str) -> PhysicalNode {
    PhysicalNode::scan(source, vec![], None).expect("valid scan")
}

fn sample_plan() -> PhysicalNode {
    let emp = PhysicalNode::filter(
        PhysicalNode::scan("emp", vec![0, 1, 2], Some(col(2).gt_eq(lit(18)))).unwrap(),
        col(1).is_null().negate(),
    );
    let agg = PhysicalNode::aggregate(
        emp,
        vec![1, 0],
        vec![
            AggregateExpression::count_star(),
            AggregateExpression::avg(col(2)),
            AggregateExpression::count(col(0)).distinct(),
        ],
        1,
    )
    .unwrap();
    let dept = PhysicalNode::project(scan("dept"), vec![col(0), col(1).times(lit(2i64))]);
    let hash = PhysicalNode::hash_join(
        agg,
        dept,
        JoinSpec::new(Some(col(2).lt(lit(100i64))), true, false, 2).unwrap(),
        vec![0],
        vec![0],
    )
    .unwrap();
    let merge = PhysicalNode::merge_join(
        hash,
        scan("loc"),
        JoinSpec::new(None, false, true, 1).unwrap(),
        vec![0],
        vec![0],
    )
    .unwrap();
    PhysicalNode::nested_loop_join(merge, scan("misc"), JoinSpec::inner(None, 1).unwrap())
}

#[test]
fn test_plan_round_trip_preserves_every_field() {
    let plan = sample_plan();
    let bytes = encode_plan(&plan);
    let decoded = decode_plan(bytes.clone(), &DecodeLimits::default()).expect("decode");
    assert_eq!(decoded, plan);
    // Re-encoding the decoded plan yields identical bytes.
    assert_eq!(encode_plan(&decoded), bytes);
}

#[test]
fn test_semi_and_outer_flags_survive_the_wire() {
    for (outer, semi) in [(false, false), (true, false), (false, true), (true, true)] {
        let spec = JoinSpec::new(None, outer, semi, 4).unwrap();
        let plan = PhysicalNode::hash_join(scan("l"), scan("r"), spec, vec![0], vec![1]).unwrap();
        let decoded = decode_plan(encode_plan(&plan), &DecodeLimits::default()).unwrap();
        let PhysicalNode::HashJoin(join) = decoded else {
            panic!("expected hash join");
        };
        assert_eq!(join.join().is_outer(), outer);
        assert_eq!(join.join().is_semi(), semi);
        assert_eq!(join.join().right_row_column_count(), 4);
        assert_eq!(join.left_hash_keys(), &[0]);
        assert_eq!(join.right_hash_keys(), &[1]);
    }
}

#[test]
fn test_truncated_plan_is_rejected() {
    let bytes = encode_plan(&scan("emp"));
    let truncated = bytes.slice(..bytes.len() - 1);
    let err = decode_plan(truncated, &DecodeLimits::default()).unwrap_err();
    assert!(
        matches!(err, PlanDecodeError::Truncated { .. }),
        "unexpected error: {err}"
    );
}

#[test]
fn test_trailing_bytes_are_rejected() {
    let mut buf = BytesMut::new();
    buf.put_slice(&encode_plan(&scan("emp")));
    buf.put_u8(0);
    let err = decode_plan(buf.freeze(), &DecodeLimits::default()).unwrap_err();
    assert_eq!(err, PlanDecodeError::TrailingBytes(1));
}

#[test]
fn test_garbage_is_rejected() {
    let err = decode_plan(Bytes::from_static(&[0xee, 1, 2, 3]), &DecodeLimits::default())
        .unwrap_err();
    assert!(matches!(err, PlanDecodeError::UnknownTag { tag: 0xee, .. }));

    let err = decode_plan(Bytes::new(), &DecodeLimits::default()).unwrap_err();
    assert!(matches!(err, PlanDecodeError::Truncated { .. }));
}

#[test]
fn test_every_node_kind_has_a_distinct_tag() {
    let mut tags: Vec<u8> = NodeKind::ALL.iter().map(|k| *k as u8).collect();
    tags.sort_unstable();
    tags.dedup();
    assert_eq!(tags.len(), NodeKind::ALL.len());
    for kind in NodeKind::ALL {
        assert_eq!(NodeKind::from_tag(kind as u8), Some(kind));
    }
}

#[test]
fn test_visit_is_post_order_left_before_right() {
    let mut counter = NodeCounter::new();
    sample_plan().visit(&mut counter).unwrap();
    assert_eq!(
        counter.order(),
        &[
            NodeKind::Scan,
            NodeKind::Filter,
            NodeKind::Aggregate,
            NodeKind::Scan,
            NodeKind::Project,
            NodeKind::HashJoin,
            NodeKind::Scan,
            NodeKind::MergeJoin,
            NodeKind::Scan,
            NodeKind::NestedLoopJoin,
        ]
    );
    assert_eq!(counter.total(), sample_plan().node_count());
    assert_eq!(counter.count(NodeKind::Scan), 4);
}

#[test]
fn test_invalid_nodes_cannot_be_built() {
    assert!(PhysicalNode::scan("", vec![], None).is_err());
    assert!(PhysicalNode::scan("t", vec![-1], None).is_err());
    assert!(PhysicalNode::aggregate(scan("t"), vec![0], vec![], 2).is_err());
    assert!(JoinSpec::new(None, false, false, -1).is_err());
    let spec = JoinSpec::inner(None, 1).unwrap();
    assert!(
        PhysicalNode::hash_join(scan("l"), scan("r"), spec.clone(), vec![0], vec![]).is_err()
    );
    assert!(PhysicalNode::merge_join(scan("l"), scan("r"), spec, vec![], vec![]).is_err());
}

#[test]
fn test_oversized_join_width_is_rejected_on_decode() {
    let plan = PhysicalNode::nested_loop_join(
        scan("l"),
        scan("r"),
        JoinSpec::new(None, false, false, i32::MAX).unwrap(),
    );
    let err = decode_plan(encode_plan(&plan), &DecodeLimits::default()).unwrap_err();
    assert!(matches!(err, PlanDecodeError::InvalidField(_)), "got {err}");
}
