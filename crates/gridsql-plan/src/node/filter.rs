use crate::codec::{PlanReader, PlanWriter, WireObject};
use crate::error::PlanDecodeError;
use crate::expr::Expression;

/// Passes upstream rows whose condition evaluates to TRUE.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterPhysicalNode {
    condition: Expression,
}

impl FilterPhysicalNode {
    pub fn new(condition: Expression) -> Self {
        Self { condition }
    }

    pub fn condition(&self) -> &Expression {
        &self.condition
    }
}

impl WireObject for FilterPhysicalNode {
    fn write_to(&self, out: &mut PlanWriter) {
        out.write_object(&self.condition);
    }

    fn read_from(input: &mut PlanReader) -> Result<Self, PlanDecodeError> {
        Ok(Self::new(input.read_object()?))
    }
}
