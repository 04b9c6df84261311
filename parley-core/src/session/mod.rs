//! Conversation history for a single chat
//!
//! A [`Session`] is a plain value owned by whichever front-end is driving the
//! conversation. It only ever grows: extending it produces a new value and
//! leaves the original untouched.

pub mod store;

pub use store::{Session, SessionState, Turn};
