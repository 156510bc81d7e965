use crate::codec::{PlanReader, PlanWriter, WireObject};
use crate::error::PlanDecodeError;
use crate::expr::Expression;

/// Stateless per-row projection: one output column per expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectPhysicalNode {
    projects: Vec<Expression>,
}

impl ProjectPhysicalNode {
    pub fn new(projects: Vec<Expression>) -> Self {
        Self { projects }
    }

    pub fn projects(&self) -> &[Expression] {
        &self.projects
    }

    /// Output row width.
    pub fn width(&self) -> usize {
        self.projects.len()
    }
}

impl WireObject for ProjectPhysicalNode {
    fn write_to(&self, out: &mut PlanWriter) {
        out.write_list(&self.projects);
    }

    fn read_from(input: &mut PlanReader) -> Result<Self, PlanDecodeError> {
        Ok(Self::new(input.read_list("project expressions")?))
    }
}
