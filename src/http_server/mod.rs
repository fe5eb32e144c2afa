//! # HTTP Server Module
//!
//! Exposes a [`Dispatcher`](crate::dispatch::Dispatcher) over HTTP.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/metrics` - Dispatch counters and route table size
//! - `/<version>/<resource>/<operation>[/<ids>]` - Envelope operations
//!   (POST; HEAD for existence checks; OPTIONS for preflight)

pub mod config;
pub mod observability_routes;
pub mod server;

pub use config::HttpServerConfig;
pub use server::{DispatchState, HttpServer};
