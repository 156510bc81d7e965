#![forbid(unsafe_code)]
//! gridsql: physical plan nodes, their wire codec, and fragment execution.
//!
//! The workspace crates are re-exported as modules; the items most callers
//! need are also lifted to the top level.

pub use gridsql_core as core;
pub use gridsql_exec as exec;
pub use gridsql_mem as mem;
pub use gridsql_plan as plan;

pub use gridsql_core::config::ExecConfig;
pub use gridsql_core::id::FragmentId;
pub use gridsql_core::row;
pub use gridsql_core::types::{Row, Scalar};
pub use gridsql_exec::{
    CancellationToken, ExecContext, ExecError, Fragment, FragmentExecutor, MemoryRowSource,
    PreparedPlan, RowSource,
};
pub use gridsql_mem::MemoryBudgetImpl;
pub use gridsql_plan::{
    decode_plan, encode_plan, explain, AggregateExpression, DecodeLimits, Expression, JoinSpec,
    PhysicalNode, PlanDecodeError,
};
