//! Runtime operators, one per physical node kind.

pub mod aggregate;
pub mod filter;
pub mod join;
pub mod project;
pub mod scan;
pub mod traits;

pub use aggregate::AggregateOp;
pub use filter::FilterOp;
pub use join::{HashJoinOp, MergeJoinOp, NestedLoopJoinOp};
pub use project::ProjectOp;
pub use scan::ScanOp;
pub use traits::{BoxedOperator, Operator};
