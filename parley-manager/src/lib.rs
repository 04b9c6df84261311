//! HTTP chat surface for parley
//!
//! Exposes the turn executor over a small JSON API. Clients carry their own
//! conversation history, so the server keeps no per-session state.

pub mod handlers;
pub mod manager;
pub mod server;
pub mod state;

pub use manager::Manager;
pub use server::{router, run_server};
pub use state::{AppState, ConfigResponse, ConfigUpdate, ManagerCommand};
