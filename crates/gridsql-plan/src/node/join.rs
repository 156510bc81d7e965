//! Join bodies.
//!
//! Every strategy embeds the same [`JoinSpec`]; only the key columns differ.

use crate::codec::{PlanReader, PlanWriter, WireObject};
use crate::error::{PlanDecodeError, PlanError, Result};
use crate::expr::Expression;

/// Condition, outer/semi policy and right-side width shared by all joins.
///
/// | outer | semi  | output |
/// |-------|-------|--------|
/// | false | false | one row per matching pair |
/// | true  | false | matching pairs plus unmatched left rows padded with nulls |
/// | false | true  | left rows with at least one match, once |
/// | true  | true  | every left row, once |
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinSpec {
    condition: Option<Expression>,
    outer: bool,
    semi: bool,
    right_row_column_count: i32,
}

impl JoinSpec {
    pub fn new(
        condition: Option<Expression>,
        outer: bool,
        semi: bool,
        right_row_column_count: i32,
    ) -> Result<Self> {
        if right_row_column_count < 0 {
            return Err(PlanError::Invariant(format!(
                "negative right row column count {right_row_column_count}"
            )));
        }
        Ok(Self {
            condition,
            outer,
            semi,
            right_row_column_count,
        })
    }

    pub fn inner(condition: Option<Expression>, right_row_column_count: i32) -> Result<Self> {
        Self::new(condition, false, false, right_row_column_count)
    }

    pub fn condition(&self) -> Option<&Expression> {
        self.condition.as_ref()
    }

    pub fn is_outer(&self) -> bool {
        self.outer
    }

    pub fn is_semi(&self) -> bool {
        self.semi
    }

    pub fn right_row_column_count(&self) -> i32 {
        self.right_row_column_count
    }

    /// Width of the null padding for an unmatched outer row.
    pub fn padding_width(&self) -> usize {
        self.right_row_column_count as usize
    }

    pub fn describe(&self) -> &'static str {
        match (self.outer, self.semi) {
            (false, false) => "inner",
            (true, false) => "left outer",
            (false, true) => "semi",
            (true, true) => "outer semi",
        }
    }
}

impl WireObject for JoinSpec {
    fn write_to(&self, out: &mut PlanWriter) {
        out.write_optional(self.condition.as_ref());
        out.write_boolean(self.outer);
        out.write_boolean(self.semi);
        out.write_int(self.right_row_column_count);
    }

    fn read_from(input: &mut PlanReader) -> std::result::Result<Self, PlanDecodeError> {
        let condition = input.read_optional("join condition")?;
        let outer = input.read_boolean("join outer")?;
        let semi = input.read_boolean("join semi")?;
        let right_row_column_count = input.read_int("right row column count")?;
        let max = input.limits().max_list_len;
        if usize::try_from(right_row_column_count).is_ok_and(|n| n > max) {
            return Err(PlanDecodeError::InvalidField(format!(
                "right row column count {right_row_column_count} exceeds limit {max}"
            )));
        }
        Self::new(condition, outer, semi, right_row_column_count).map_err(invalid)
    }
}

fn invalid(e: PlanError) -> PlanDecodeError {
    PlanDecodeError::InvalidField(e.to_string())
}

fn check_keys(what: &str, left: &[i32], right: &[i32], allow_empty: bool) -> Result<()> {
    if left.len() != right.len() {
        return Err(PlanError::Invariant(format!(
            "{what} key lists differ in length: {} vs {}",
            left.len(),
            right.len()
        )));
    }
    if !allow_empty && left.is_empty() {
        return Err(PlanError::Invariant(format!("{what} requires at least one key")));
    }
    if left.iter().chain(right).any(|&k| k < 0) {
        return Err(PlanError::Invariant(format!("{what} key is negative")));
    }
    Ok(())
}

/// Access to the shared join policy of any join body.
pub trait JoinNode {
    fn join(&self) -> &JoinSpec;
}

/// Compares every left row with every buffered right row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NestedLoopJoinPhysicalNode {
    spec: JoinSpec,
}

impl NestedLoopJoinPhysicalNode {
    pub fn new(spec: JoinSpec) -> Self {
        Self { spec }
    }
}

impl JoinNode for NestedLoopJoinPhysicalNode {
    fn join(&self) -> &JoinSpec {
        &self.spec
    }
}

impl WireObject for NestedLoopJoinPhysicalNode {
    fn write_to(&self, out: &mut PlanWriter) {
        self.spec.write_to(out);
    }

    fn read_from(input: &mut PlanReader) -> std::result::Result<Self, PlanDecodeError> {
        Ok(Self::new(JoinSpec::read_from(input)?))
    }
}

/// Equi-join building a hash table over the right input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashJoinPhysicalNode {
    spec: JoinSpec,
    left_hash_keys: Vec<i32>,
    right_hash_keys: Vec<i32>,
}

impl HashJoinPhysicalNode {
    pub fn new(spec: JoinSpec, left_hash_keys: Vec<i32>, right_hash_keys: Vec<i32>) -> Result<Self> {
        check_keys("hash join", &left_hash_keys, &right_hash_keys, true)?;
        Ok(Self {
            spec,
            left_hash_keys,
            right_hash_keys,
        })
    }

    pub fn left_hash_keys(&self) -> &[i32] {
        &self.left_hash_keys
    }

    pub fn right_hash_keys(&self) -> &[i32] {
        &self.right_hash_keys
    }
}

impl JoinNode for HashJoinPhysicalNode {
    fn join(&self) -> &JoinSpec {
        &self.spec
    }
}

impl WireObject for HashJoinPhysicalNode {
    fn write_to(&self, out: &mut PlanWriter) {
        self.spec.write_to(out);
        out.write_list(&self.left_hash_keys);
        out.write_list(&self.right_hash_keys);
    }

    fn read_from(input: &mut PlanReader) -> std::result::Result<Self, PlanDecodeError> {
        let spec = JoinSpec::read_from(input)?;
        let left = input.read_list("left hash keys")?;
        let right = input.read_list("right hash keys")?;
        Self::new(spec, left, right).map_err(invalid)
    }
}

/// Join of two inputs that both arrive ascending on their keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MergeJoinPhysicalNode {
    spec: JoinSpec,
    left_keys: Vec<i32>,
    right_keys: Vec<i32>,
}

impl MergeJoinPhysicalNode {
    pub fn new(spec: JoinSpec, left_keys: Vec<i32>, right_keys: Vec<i32>) -> Result<Self> {
        check_keys("merge join", &left_keys, &right_keys, false)?;
        Ok(Self {
            spec,
            left_keys,
            right_keys,
        })
    }

    pub fn left_keys(&self) -> &[i32] {
        &self.left_keys
    }

    pub fn right_keys(&self) -> &[i32] {
        &self.right_keys
    }
}

impl JoinNode for MergeJoinPhysicalNode {
    fn join(&self) -> &JoinSpec {
        &self.spec
    }
}

impl WireObject for MergeJoinPhysicalNode {
    fn write_to(&self, out: &mut PlanWriter) {
        self.spec.write_to(out);
        out.write_list(&self.left_keys);
        out.write_list(&self.right_keys);
    }

    fn read_from(input: &mut PlanReader) -> std::result::Result<Self, PlanDecodeError> {
        let spec = JoinSpec::read_from(input)?;
        let left = input.read_list("left merge keys")?;
        let right = input.read_list("right merge keys")?;
        Self::new(spec, left, right).map_err(invalid)
    }
}
