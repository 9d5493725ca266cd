//! HTTP API gateway.
//!
//! A thin mapping layer over the store and the engine: validation, JSON
//! shapes, and nothing else. All campaign logic lives in the engine.

pub mod routes;
pub mod server;

pub use server::{start_server, AppState};
