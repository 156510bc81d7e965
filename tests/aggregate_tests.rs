//! Streaming vs blocking aggregation through compiled fragments

use std::sync::Arc;

use gridsql::plan::expr::col;
use gridsql::{
    row, AggregateExpression, ExecConfig, ExecContext, ExecError, Fragment, FragmentId,
    MemoryRowSource, PhysicalNode, Row,
};

fn run(rows: Vec<Row>, group_key: Vec<i32>, prefix: i32, cfg: ExecConfig) -> Result<Vec<Row>, ExecError> {
    let source = Arc::new(MemoryRowSource::new().with_partition("sales", 0, rows));
    let plan = PhysicalNode::aggregate(
        PhysicalNode::scan("sales", vec![], None).unwrap(),
        group_key,
        vec![
            AggregateExpression::count_star(),
            AggregateExpression::sum(col(2)),
        ],
        prefix,
    )
    .unwrap();
    let ctx = ExecContext::new(FragmentId::new(7), source, cfg);
    Fragment::compile(&plan, ctx)?.collect()
}

/// (region, product, amount), contiguous on region.
fn contiguous() -> Vec<Row> {
    vec![
        row!["A", "x", 1],
        row!["A", "y", 2],
        row!["A", "x", 3],
        row!["B", "x", 4],
        row!["B", "x", 5],
    ]
}

#[test]
fn test_streaming_matches_blocking_on_sorted_prefix() {
    let cfg = ExecConfig::default();
    let expected = vec![
        row!["A", "x", 2i64, 4i64],
        row!["A", "y", 1i64, 2i64],
        row!["B", "x", 2i64, 9i64],
    ];

    let blocking = run(contiguous(), vec![0, 1], 0, cfg.clone()).unwrap();
    assert_eq!(blocking, expected);

    let streaming = run(contiguous(), vec![0, 1], 1, cfg).unwrap();
    assert_eq!(streaming, expected);
}

#[test]
fn test_fully_sorted_key_streams_every_group() {
    let rows = run(contiguous(), vec![0], 1, ExecConfig::default()).unwrap();
    assert_eq!(rows, vec![row!["A", 3i64, 6i64], row!["B", 2i64, 9i64]]);
}

#[test]
fn test_reappearing_prefix_fails_the_fragment() {
    let interleaved = vec![
        row!["A", "x", 1],
        row!["A", "x", 2],
        row!["B", "x", 3],
        row!["A", "x", 4],
        row!["B", "x", 5],
    ];

    // Blocking aggregation has no ordering requirement.
    let rows = run(interleaved.clone(), vec![0], 0, ExecConfig::default()).unwrap();
    assert_eq!(rows, vec![row!["A", 3i64, 7i64], row!["B", 2i64, 8i64]]);

    let err = run(interleaved, vec![0], 1, ExecConfig::default()).unwrap_err();
    assert!(matches!(err, ExecError::ContractViolation(_)), "got {err}");
}

#[test]
fn test_unverified_streaming_emits_split_groups() {
    let cfg = ExecConfig {
        verify_sorted_prefix: false,
        ..ExecConfig::default()
    };
    let rows = run(
        vec![row!["A", "x", 1], row!["B", "x", 2], row!["A", "x", 3]],
        vec![0],
        1,
        cfg,
    )
    .unwrap();
    assert_eq!(
        rows,
        vec![row!["A", 1i64, 1i64], row!["B", 1i64, 2i64], row!["A", 1i64, 3i64]]
    );
}

#[test]
fn test_global_aggregate_over_empty_input_is_empty() {
    let rows = run(vec![], vec![], 0, ExecConfig::default()).unwrap();
    assert!(rows.is_empty());
}

#[test]
fn test_many_verified_runs_are_bounded_by_mem_cap() {
    let runs: Vec<Row> = (0..1000).map(|i| row![i, "x", 1]).collect();
    let cfg = ExecConfig {
        mem_cap_bytes: 4096,
        ..ExecConfig::default()
    };
    let err = run(runs.clone(), vec![0], 1, cfg.clone()).unwrap_err();
    assert!(matches!(err, ExecError::MemoryLimit(_)), "got {err}");

    let unverified = ExecConfig {
        verify_sorted_prefix: false,
        ..cfg
    };
    assert_eq!(run(runs, vec![0], 1, unverified).unwrap().len(), 1000);
}
