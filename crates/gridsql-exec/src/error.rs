use thiserror::Error;

use gridsql_core::id::OpId;
use gridsql_plan::{EvalError, PlanDecodeError, PlanError};

/// Result type local to gridsql-exec.
pub type Result<T> = std::result::Result<T, ExecError>;

/// Failure of one fragment. The plan it ran stays valid and reusable.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{node} ({op}) failed to evaluate: {source}")]
    Evaluation {
        op: OpId,
        node: &'static str,
        #[source]
        source: EvalError,
    },

    /// Upstream broke an ordering guarantee the plan relies on.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("memory limit: {0}")]
    MemoryLimit(String),

    #[error("fragment cancelled")]
    Cancelled,

    #[error("unknown row source '{0}'")]
    UnknownSource(String),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("compile error: {0}")]
    Compile(String),
}

impl ExecError {
    pub fn evaluation(op: OpId, node: &'static str, source: EvalError) -> Self {
        ExecError::Evaluation { op, node, source }
    }
}

impl From<PlanDecodeError> for ExecError {
    fn from(e: PlanDecodeError) -> Self {
        ExecError::Plan(PlanError::Decode(e))
    }
}

impl From<gridsql_mem::Error> for ExecError {
    fn from(e: gridsql_mem::Error) -> Self {
        ExecError::MemoryLimit(e.to_string())
    }
}
