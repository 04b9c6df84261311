//! Core types and traits for parley
//!
//! This crate provides the conversation data model, generation parameters,
//! configuration and logging shared by the other parley components.

pub mod config;
pub mod error;
pub mod generation;
pub mod logging;
pub mod session;
pub mod utils;

pub use error::{Error, Result};
pub use generation::GenerationParameters;
pub use session::{Session, SessionState, Turn};
