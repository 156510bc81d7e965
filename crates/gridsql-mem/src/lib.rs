#![forbid(unsafe_code)]
//! gridsql-mem: hard memory budgeting for fragment execution.
//!
//! This crate provides concrete implementations for the *interfaces* defined
//! in `gridsql-core::budget`. Every growing operator buffer (aggregate state,
//! join build side) is accounted here through RAII guards, so a fragment's
//! bytes return to the budget when its pipeline is dropped.

pub mod error;
pub mod guard;

pub use error::{Error, Result};
pub use guard::{BudgetGuardImpl, MemoryBudgetImpl};
