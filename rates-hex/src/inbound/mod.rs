//! HTTP Inbound Adapter
//!
//! Axum-based HTTP server exposing the rate queries as JSON.

mod handlers;
mod server;

pub use server::HttpServer;
