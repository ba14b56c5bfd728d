//! Wager HTTP API
//!
//! Thin axum surface over the wager engine. Authentication happens upstream;
//! the authenticated user id arrives in a configurable header.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use server::ApiServer;
