#![forbid(unsafe_code)]
//! gridsql-core: rows, scalars, IDs, configuration, budget traits, hashing.
//!
//! Everything here is plain data shared by the plan and exec crates.
//! No I/O, no threads, no async.

pub mod budget;
pub mod config;
pub mod error;
pub mod hash;
pub mod id;
pub mod prelude;
pub mod types;

pub use error::{Error, Result};
pub use types::{Row, Scalar};
