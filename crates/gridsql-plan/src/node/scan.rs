use crate::codec::{PlanReader, PlanWriter, WireObject};
use crate::error::{PlanDecodeError, PlanError, Result};
use crate::expr::Expression;

/// Leaf node reading the local partitions of a named source.
///
/// `projects` selects source columns by index (empty means all columns);
/// `filter` runs against the source row before projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScanPhysicalNode {
    source: String,
    projects: Vec<i32>,
    filter: Option<Expression>,
}

impl ScanPhysicalNode {
    pub fn new(
        source: impl Into<String>,
        projects: Vec<i32>,
        filter: Option<Expression>,
    ) -> Result<Self> {
        let source = source.into();
        if source.is_empty() {
            return Err(PlanError::Invariant("scan source name is empty".into()));
        }
        if let Some(bad) = projects.iter().find(|&&i| i < 0) {
            return Err(PlanError::Invariant(format!(
                "scan projects negative column {bad}"
            )));
        }
        Ok(Self {
            source,
            projects,
            filter,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn projects(&self) -> &[i32] {
        &self.projects
    }

    pub fn filter(&self) -> Option<&Expression> {
        self.filter.as_ref()
    }
}

impl WireObject for ScanPhysicalNode {
    fn write_to(&self, out: &mut PlanWriter) {
        out.write_string(&self.source);
        out.write_list(&self.projects);
        out.write_optional(self.filter.as_ref());
    }

    fn read_from(input: &mut PlanReader) -> std::result::Result<Self, PlanDecodeError> {
        let source = input.read_string("scan source")?;
        let projects = input.read_list("scan projects")?;
        let filter = input.read_optional("scan filter")?;
        Self::new(source, projects, filter).map_err(|e| PlanDecodeError::InvalidField(e.to_string()))
    }
}
