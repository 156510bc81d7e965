use std::collections::{HashMap, VecDeque};

use gridsql_core::id::OpId;
use gridsql_core::types::{Row, Scalar};
use gridsql_mem::BudgetGuardImpl;
use gridsql_plan::JoinSpec;

use crate::context::ExecContext;
use crate::error::Result;
use crate::operators::join::JoinPolicy;
use crate::operators::traits::{key_of, pull, BoxedOperator, Operator};

const NODE: &str = "HashJoin";

/// Normalize numeric keys so values that compare equal share a bucket:
/// `INT 3`, `BIGINT 3` and `DOUBLE 3.0` all hash as `BIGINT 3`.
/// `None` when any key column is NULL or NaN; such rows never match.
fn hash_key(mut key: Vec<Scalar>) -> Option<Vec<Scalar>> {
    for v in key.iter_mut() {
        let normalized = match &*v {
            Scalar::Null => return None,
            Scalar::F64(f) if f.is_nan() => return None,
            Scalar::I32(i) => Some(*i as i64),
            Scalar::F64(f) => exact_i64(*f),
            _ => None,
        };
        if let Some(i) = normalized {
            *v = Scalar::I64(i);
        }
    }
    Some(key)
}

/// The integer a double holds exactly, if it is integral and in `i64` range.
fn exact_i64(f: f64) -> Option<i64> {
    // 2^63; `i64::MAX as f64` rounds up to it.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (f.is_finite() && f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f)).then(|| f as i64)
}

/// Builds a hash table over the right input, then probes it with each left
/// row. The join condition, if any, is applied as a residual predicate.
pub struct HashJoinOp {
    id: OpId,
    left: BoxedOperator,
    right: BoxedOperator,
    left_keys: Vec<usize>,
    right_keys: Vec<usize>,
    policy: JoinPolicy,
    table: Option<HashMap<Vec<Scalar>, Vec<Row>>>,
    guard: BudgetGuardImpl,
    output: VecDeque<Row>,
}

impl HashJoinOp {
    pub fn new(
        id: OpId,
        left: BoxedOperator,
        right: BoxedOperator,
        spec: &JoinSpec,
        left_keys: Vec<usize>,
        right_keys: Vec<usize>,
        guard: BudgetGuardImpl,
    ) -> Self {
        Self {
            id,
            left,
            right,
            left_keys,
            right_keys,
            policy: JoinPolicy::new(id, NODE, spec),
            table: None,
            guard,
            output: VecDeque::new(),
        }
    }

    fn build_table(&mut self, ctx: &ExecContext) -> Result<HashMap<Vec<Scalar>, Vec<Row>>> {
        let mut table: HashMap<Vec<Scalar>, Vec<Row>> = HashMap::new();
        let mut bytes = 0;
        let mut rows = 0usize;
        while let Some(row) = pull(&mut self.right, ctx)? {
            let Some(key) = hash_key(key_of(&row, &self.right_keys, self.id, NODE)?) else {
                continue;
            };
            bytes += row.approx_size();
            if !table.contains_key(&key) {
                bytes += key.iter().map(Scalar::approx_size).sum::<usize>();
            }
            self.guard.grow_to(bytes)?;
            table.entry(key).or_default().push(row);
            rows += 1;
        }
        tracing::trace!(op = %self.id, rows, buckets = table.len(), bytes, "hash join table built");
        Ok(table)
    }
}

impl Operator for HashJoinOp {
    fn name(&self) -> &'static str {
        NODE
    }

    fn next(&mut self, ctx: &ExecContext) -> Result<Option<Row>> {
        if self.table.is_none() {
            self.table = Some(self.build_table(ctx)?);
        }
        loop {
            if let Some(row) = self.output.pop_front() {
                return Ok(Some(row));
            }
            let Some(left) = pull(&mut self.left, ctx)? else {
                return Ok(None);
            };
            let key = hash_key(key_of(&left, &self.left_keys, self.id, NODE)?);
            let candidates: &[Row] = match (&self.table, key) {
                (Some(table), Some(key)) => table.get(&key).map(Vec::as_slice).unwrap_or_default(),
                _ => &[],
            };
            self.policy.probe(&left, candidates, &mut self.output)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecError;
    use crate::operators::join::fixtures;
    use crate::operators::traits::testing::{ctx, drain, Values};
    use gridsql_core::budget::MemoryBudget;
    use gridsql_core::row;
    use gridsql_mem::MemoryBudgetImpl;
    use gridsql_plan::expr::{col, lit};

    fn op(
        left: Vec<Row>,
        right: Vec<Row>,
        spec: JoinSpec,
        budget: &MemoryBudgetImpl,
    ) -> BoxedOperator {
        Box::new(HashJoinOp::new(
            OpId::new(3),
            Values::boxed(left),
            Values::boxed(right),
            &spec,
            vec![1],
            vec![0],
            budget.empty_guard("join_build"),
        ))
    }

    #[test]
    fn test_numeric_keys_share_buckets_across_types() {
        let twenty = hash_key(vec![Scalar::I64(20)]);
        assert_eq!(hash_key(vec![Scalar::I32(20)]), twenty);
        assert_eq!(hash_key(vec![Scalar::F64(20.0)]), twenty);
        assert_ne!(hash_key(vec![Scalar::F64(20.5)]), twenty);
        assert_eq!(hash_key(vec![Scalar::F64(-0.0)]), hash_key(vec![Scalar::I32(0)]));
        assert_eq!(hash_key(vec![Scalar::F64(f64::NAN)]), None);
        assert_eq!(hash_key(vec![Scalar::F64(1e300)]), Some(vec![Scalar::F64(1e300)]));
        assert_eq!(hash_key(vec![Scalar::I64(1), Scalar::Null]), None);
    }

    #[test]
    fn test_bigint_matches_double_key() {
        let budget = MemoryBudgetImpl::new(1 << 20);
        let left = vec![
            Row::new(vec![Scalar::I32(1), Scalar::I64(20)]),
            Row::new(vec![Scalar::I32(2), Scalar::I64(21)]),
        ];
        let right = vec![Row::new(vec![Scalar::F64(20.0), Scalar::Str("ops".into())])];
        let rows = drain(&mut op(left, right, JoinSpec::inner(None, 2).unwrap(), &budget), &ctx()).unwrap();
        assert_eq!(
            rows,
            vec![Row::new(vec![
                Scalar::I32(1),
                Scalar::I64(20),
                Scalar::F64(20.0),
                Scalar::Str("ops".into()),
            ])]
        );
    }

    #[test]
    fn test_policy_matrix() {
        let budget = MemoryBudgetImpl::new(1 << 20);
        for (outer, semi) in [(false, false), (true, false), (false, true), (true, true)] {
            let spec = JoinSpec::new(None, outer, semi, 2).unwrap();
            let mut join = op(fixtures::left(), fixtures::right(), spec, &budget);
            assert_eq!(
                drain(&mut join, &ctx()).unwrap(),
                fixtures::expected(outer, semi),
                "outer={outer} semi={semi}"
            );
        }
        assert_eq!(budget.used_bytes(), 0);
    }

    #[test]
    fn test_null_keys_never_match_and_widths_widen() {
        let budget = MemoryBudgetImpl::new(1 << 20);
        let left = vec![Row::new(vec![Scalar::I32(1), Scalar::Null]), row![2, 5]];
        let right = vec![Row::new(vec![Scalar::Null, "n".into()]), row![5i64, "five"]];
        let spec = JoinSpec::new(None, true, false, 2).unwrap();
        assert_eq!(
            drain(&mut op(left, right, spec, &budget), &ctx()).unwrap(),
            vec![
                Row::new(vec![Scalar::I32(1), Scalar::Null, Scalar::Null, Scalar::Null]),
                row![2, 5, 5i64, "five"],
            ]
        );
    }

    #[test]
    fn test_residual_condition() {
        let budget = MemoryBudgetImpl::new(1 << 20);
        let spec = JoinSpec::new(Some(col(3).not_equal(lit("ops2"))), false, false, 2).unwrap();
        let rows = drain(&mut op(fixtures::left(), fixtures::right(), spec, &budget), &ctx()).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_build_side_respects_budget() {
        let budget = MemoryBudgetImpl::new(64);
        let spec = JoinSpec::inner(None, 2).unwrap();
        let mut join = op(fixtures::left(), fixtures::right(), spec, &budget);
        assert!(matches!(join.next(&ctx()), Err(ExecError::MemoryLimit(_))));
        drop(join);
        assert_eq!(budget.used_bytes(), 0);
    }
}
