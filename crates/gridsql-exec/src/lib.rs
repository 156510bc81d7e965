#![forbid(unsafe_code)]
//! gridsql-exec: turns a physical plan into a running pull-based pipeline.
//!
//! Each member compiles its own copy of the plan into one [`Fragment`] per
//! partition set. A fragment is single-threaded; the [`FragmentExecutor`]
//! runs several fragments side by side. Fragments share nothing mutable except
//! the memory budget and cancellation token handed to them in their
//! [`ExecContext`].

pub mod compiler;
pub mod context;
pub mod error;
pub mod executor;
pub mod fragment;
pub mod operators;
pub mod source;

pub use compiler::PlanCompiler;
pub use context::{CancellationToken, ExecContext};
pub use error::{ExecError, Result};
pub use executor::{FragmentExecutor, PreparedPlan};
pub use fragment::Fragment;
pub use operators::traits::{BoxedOperator, Operator};
pub use source::{MemoryRowSource, PartitionId, RowSource};
