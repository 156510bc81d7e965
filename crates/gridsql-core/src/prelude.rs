//! Convenient re-exports for downstream crates.

pub use crate::budget::{BudgetGuard, MemoryBudget};
pub use crate::config::ExecConfig;
pub use crate::error::{Error, Result};
pub use crate::hash::Hash256;
pub use crate::id::{FragmentId, OpId};
pub use crate::types::{Row, Scalar};
