//! flatapi - flat JSON envelopes, operation routing and response meta
//!
//! - `envelope`: request/response envelope codec
//! - `routing`: `(version, resource, operation)` route table
//! - `meta`: response meta builder
//! - `dispatch`: the request pipeline tying the three together

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod errors;
pub mod http_server;
pub mod meta;
pub mod observability;
pub mod routing;
