//! Turn execution for parley
//!
//! This crate turns a user submission plus the current [`Session`] into one
//! provider call and returns the extended session.
//!
//! [`Session`]: parley_core::Session

pub mod context;
pub mod error;
pub mod executor;

pub use context::ContextBuilder;
pub use error::{Result, TurnError};
pub use executor::TurnExecutor;
