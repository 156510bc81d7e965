use crate::codec::{PlanReader, PlanWriter, WireObject};
use crate::error::{PlanDecodeError, PlanError, Result};
use crate::expr::aggregate::AggregateExpression;

/// Grouped aggregation.
///
/// Output rows are the group-key columns in key order followed by one value
/// per aggregate. `sorted_prefix_size` says how many leading key columns the
/// upstream delivers in contiguous runs; 0 selects the blocking strategy, any
/// positive value the streaming one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregatePhysicalNode {
    group_key: Vec<i32>,
    expressions: Vec<AggregateExpression>,
    sorted_prefix_size: i32,
}

impl AggregatePhysicalNode {
    pub fn new(
        group_key: Vec<i32>,
        expressions: Vec<AggregateExpression>,
        sorted_prefix_size: i32,
    ) -> Result<Self> {
        if let Some(bad) = group_key.iter().find(|&&i| i < 0) {
            return Err(PlanError::Invariant(format!(
                "group key references negative column {bad}"
            )));
        }
        if sorted_prefix_size < 0 || sorted_prefix_size as usize > group_key.len() {
            return Err(PlanError::Invariant(format!(
                "sorted prefix size {sorted_prefix_size} outside [0, {}]",
                group_key.len()
            )));
        }
        Ok(Self {
            group_key,
            expressions,
            sorted_prefix_size,
        })
    }

    pub fn group_key(&self) -> &[i32] {
        &self.group_key
    }

    pub fn expressions(&self) -> &[AggregateExpression] {
        &self.expressions
    }

    pub fn sorted_prefix_size(&self) -> i32 {
        self.sorted_prefix_size
    }

    /// True when the upstream guarantees contiguous runs on a key prefix.
    pub fn is_streaming(&self) -> bool {
        self.sorted_prefix_size > 0
    }

    pub fn output_width(&self) -> usize {
        self.group_key.len() + self.expressions.len()
    }
}

impl WireObject for AggregatePhysicalNode {
    fn write_to(&self, out: &mut PlanWriter) {
        out.write_list(&self.group_key);
        out.write_list(&self.expressions);
        out.write_int(self.sorted_prefix_size);
    }

    fn read_from(input: &mut PlanReader) -> std::result::Result<Self, PlanDecodeError> {
        let group_key = input.read_list("group key")?;
        let expressions = input.read_list("aggregate expressions")?;
        let sorted_prefix_size = input.read_int("sorted prefix size")?;
        Self::new(group_key, expressions, sorted_prefix_size)
            .map_err(|e| PlanDecodeError::InvalidField(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_prefix_bounds() {
        let count = vec![AggregateExpression::count_star()];
        assert!(AggregatePhysicalNode::new(vec![0, 1], count.clone(), 2).is_ok());
        assert!(AggregatePhysicalNode::new(vec![0, 1], count.clone(), 3).is_err());
        assert!(AggregatePhysicalNode::new(vec![0], count.clone(), -1).is_err());
        assert!(AggregatePhysicalNode::new(vec![], count, 0).is_ok());
    }

    #[test]
    fn test_negative_group_column_rejected() {
        let err = AggregatePhysicalNode::new(vec![-2], vec![], 0).unwrap_err();
        assert!(matches!(err, PlanError::Invariant(_)));
    }
}
