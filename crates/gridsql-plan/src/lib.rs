#![forbid(unsafe_code)]
//! gridsql-plan: the physical plan node model shipped between members.
//!
//! Design:
//! - `PhysicalNode` is a closed sum type; every match over it is exhaustive,
//!   so adding an operator forces each visitor/codec site to be updated.
//! - Nodes are immutable values. Construction and decode both validate, so an
//!   invalid node never exists.
//! - `UnaryNode`/`BinaryNode` own upstream traversal and the upstream part of
//!   the wire format; node bodies only know their own fields.
//! - The expression engine here is deliberately minimal; it exists so plans
//!   can be evaluated and round-tripped.

pub mod cache;
pub mod codec;
pub mod error;
pub mod explain;
pub mod expr;
pub mod node;
pub mod visitor;

pub use cache::{plan_fingerprint, CacheStats, PlanCache};
pub use codec::{decode_plan, encode_plan, DecodeLimits, PlanReader, PlanWriter, WireObject};
pub use error::{EvalError, PlanDecodeError, PlanError, Result};
pub use explain::{explain, ExplainPrinter};
pub use expr::aggregate::{Accumulator, AggregateExpression, AggregateFunction};
pub use expr::{ArithmeticOp, CompareOp, Expression};
pub use node::aggregate::AggregatePhysicalNode;
pub use node::filter::FilterPhysicalNode;
pub use node::join::{
    HashJoinPhysicalNode, JoinNode, JoinSpec, MergeJoinPhysicalNode, NestedLoopJoinPhysicalNode,
};
pub use node::project::ProjectPhysicalNode;
pub use node::scan::ScanPhysicalNode;
pub use node::shape::{BinaryNode, UnaryNode};
pub use node::{NodeKind, PhysicalNode};
pub use visitor::{NodeCounter, PhysicalNodeVisitor};
