//! Grouped aggregation.
//!
//! Two strategies, picked by the node's sorted prefix:
//! - blocking (prefix 0): consume everything into one group table, then emit;
//! - streaming (prefix > 0): keep a group table for the current run of equal
//!   prefix values only and flush it when the prefix changes.
//!
//! Both account their group table against the fragment budget through one
//! guard. On every flush the streaming strategy shrinks the guard to the
//! digests it keeps for sorted-prefix verification, which stay charged until
//! input ends.

use std::collections::{HashMap, HashSet, VecDeque};

use gridsql_core::hash::{hash_scalars, Hash256};
use gridsql_core::id::OpId;
use gridsql_core::types::{Row, Scalar};
use gridsql_mem::BudgetGuardImpl;
use gridsql_plan::{Accumulator, AggregateExpression};

use crate::context::ExecContext;
use crate::error::{ExecError, Result};
use crate::operators::traits::{key_of, pull, BoxedOperator, Operator};

const NODE: &str = "Aggregate";

/// Budget charge per remembered run digest, including hash set overhead.
const DIGEST_BYTES: usize = std::mem::size_of::<Hash256>() + std::mem::size_of::<u64>();

/// Group key -> accumulators, in first-seen order.
#[derive(Default)]
struct GroupTable {
    index: HashMap<Vec<Scalar>, usize>,
    groups: Vec<(Vec<Scalar>, Vec<Accumulator>)>,
    bytes: usize,
}

impl GroupTable {
    fn accumulate(
        &mut self,
        key: Vec<Scalar>,
        row: &Row,
        exprs: &[AggregateExpression],
        op: OpId,
    ) -> Result<()> {
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                let accs: Vec<Accumulator> = exprs.iter().map(|e| e.create_accumulator()).collect();
                // Key is held twice: once in the index, once in the group.
                let key_bytes: usize = key.iter().map(Scalar::approx_size).sum();
                self.bytes += 2 * key_bytes + accs.iter().map(Accumulator::approx_size).sum::<usize>();
                let slot = self.groups.len();
                self.index.insert(key.clone(), slot);
                self.groups.push((key, accs));
                slot
            }
        };
        let accs = &mut self.groups[slot].1;
        for acc in accs.iter_mut() {
            let before = acc.approx_size();
            acc.accumulate(row)
                .map_err(|e| ExecError::evaluation(op, NODE, e))?;
            self.bytes = self.bytes + acc.approx_size() - before;
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.groups.len()
    }

    /// Finalize every group into an output row and empty the table.
    fn drain_into(&mut self, out: &mut VecDeque<Row>) {
        self.index.clear();
        self.bytes = 0;
        for (key, accs) in self.groups.drain(..) {
            let mut values = key;
            values.extend(accs.iter().map(Accumulator::finalize));
            out.push_back(Row::new(values));
        }
    }
}

enum Strategy {
    Blocking,
    Streaming {
        prefix_len: usize,
        current: Option<Vec<Scalar>>,
        /// Digests of prefixes whose runs were already flushed.
        flushed: HashSet<Hash256>,
        verify: bool,
    },
}

pub struct AggregateOp {
    id: OpId,
    input: BoxedOperator,
    group_key: Vec<usize>,
    exprs: Vec<AggregateExpression>,
    strategy: Strategy,
    table: GroupTable,
    guard: BudgetGuardImpl,
    output: VecDeque<Row>,
    input_done: bool,
}

impl AggregateOp {
    pub fn new(
        id: OpId,
        input: BoxedOperator,
        group_key: Vec<usize>,
        exprs: Vec<AggregateExpression>,
        sorted_prefix_size: usize,
        verify_sorted_prefix: bool,
        guard: BudgetGuardImpl,
    ) -> Self {
        let strategy = if sorted_prefix_size == 0 {
            Strategy::Blocking
        } else {
            Strategy::Streaming {
                prefix_len: sorted_prefix_size.min(group_key.len()),
                current: None,
                flushed: HashSet::new(),
                verify: verify_sorted_prefix,
            }
        };
        Self {
            id,
            input,
            group_key,
            exprs,
            strategy,
            table: GroupTable::default(),
            guard,
            output: VecDeque::new(),
            input_done: false,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.strategy, Strategy::Streaming { .. })
    }

    fn consume(&mut self, row: Row) -> Result<()> {
        let key = key_of(&row, &self.group_key, self.id, NODE)?;
        if let Strategy::Streaming {
            prefix_len,
            current,
            flushed,
            verify,
        } = &mut self.strategy
        {
            let prefix = &key[..*prefix_len];
            let changed = current.as_deref().map_or(true, |c| c != prefix);
            if changed {
                if let Some(prev) = current.take() {
                    if *verify {
                        flushed.insert(hash_scalars(&prev));
                    }
                    tracing::trace!(op = %self.id, groups = self.table.len(), "aggregate run flushed");
                    self.table.drain_into(&mut self.output);
                    self.guard.grow_to(flushed.len() * DIGEST_BYTES)?;
                }
                if *verify && flushed.contains(&hash_scalars(prefix)) {
                    let shown: Vec<String> = prefix.iter().map(Scalar::to_string).collect();
                    tracing::warn!(op = %self.id, prefix = ?shown, "sorted prefix reappeared after its run was flushed");
                    return Err(ExecError::ContractViolation(format!(
                        "{NODE} ({}): sorted prefix ({}) reappeared after its run ended",
                        self.id,
                        shown.join(", ")
                    )));
                }
                *current = Some(prefix.to_vec());
            }
        }
        self.table.accumulate(key, &row, &self.exprs, self.id)?;
        let retained = self.retained_bytes();
        self.guard.grow_to(self.table.bytes + retained)?;
        Ok(())
    }

    /// Bytes held outside the group table: remembered run digests.
    fn retained_bytes(&self) -> usize {
        match &self.strategy {
            Strategy::Streaming { flushed, .. } => flushed.len() * DIGEST_BYTES,
            Strategy::Blocking => 0,
        }
    }

    fn finish_input(&mut self) {
        self.input_done = true;
        if let Strategy::Streaming { current, flushed, .. } = &mut self.strategy {
            current.take();
            flushed.clear();
        }
        tracing::trace!(op = %self.id, groups = self.table.len(), "aggregate input exhausted");
        self.table.drain_into(&mut self.output);
        self.guard.reset();
    }
}

impl Operator for AggregateOp {
    fn name(&self) -> &'static str {
        NODE
    }

    fn next(&mut self, ctx: &ExecContext) -> Result<Option<Row>> {
        loop {
            if let Some(row) = self.output.pop_front() {
                return Ok(Some(row));
            }
            if self.input_done {
                return Ok(None);
            }
            match pull(&mut self.input, ctx)? {
                Some(row) => self.consume(row)?,
                None => self.finish_input(),
            }
        }
    }
}
