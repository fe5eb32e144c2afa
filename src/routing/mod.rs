//! # Route Resolver
//!
//! Maps `(version, resource, operation)` triples taken from the request path
//! to registered handlers, independent of the HTTP method.
//!
//! Routes are registered into a [`RouteTableBuilder`] at startup. The built
//! [`RouteTable`] is immutable; the [`Router`] swaps whole snapshots when a
//! reload or a late registration happens.

mod handler;
mod path;
mod route;
mod router;
mod table;

pub use handler::{Handler, HandlerCall, HandlerError, HandlerOutput, HandlerResult};
pub use path::{RouteMatch, RoutePath};
pub use route::{Operation, RouteKey, Version};
pub use router::Router;
pub use table::{Resolved, RouteTable, RouteTableBuilder};
