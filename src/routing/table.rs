//! Route table
//!
//! An immutable snapshot mapping route keys to handlers. Tables are built once
//! with [`RouteTableBuilder`] and never mutated afterwards; the [`Router`]
//! replaces whole tables instead.
//!
//! [`Router`]: super::Router

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::{ConventionError, ConventionResult};
use crate::observability::{log_event_with_fields, Event};

use super::handler::Handler;
use super::path::{RouteMatch, RoutePath};
use super::route::{validate_resource, Operation, RouteKey, Version};

/// A resolved route: the handler plus the path parameters extracted for it
#[derive(Clone)]
pub struct Resolved {
    pub key: RouteKey,
    pub path_params: Vec<String>,
    pub handler: Arc<dyn Handler>,
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("key", &self.key)
            .field("path_params", &self.path_params)
            .finish()
    }
}

/// Read-only route table snapshot
#[derive(Clone, Default)]
pub struct RouteTable {
    entries: BTreeMap<RouteKey, Arc<dyn Handler>>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &RouteKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Registered keys in stable order
    pub fn keys(&self) -> impl Iterator<Item = &RouteKey> {
        self.entries.keys()
    }

    /// Look up a triple. Total: either the handler or `RouteNotFound`.
    pub fn resolve(
        &self,
        version: Version,
        resource: &str,
        operation: &Operation,
    ) -> ConventionResult<Arc<dyn Handler>> {
        let key = RouteKey::new(version, resource, operation.clone());
        match self.entries.get(&key) {
            Some(handler) => Ok(Arc::clone(handler)),
            None => Err(ConventionError::RouteNotFound(key)),
        }
    }

    /// Resolve a request path, trying each reading of its segments
    pub fn resolve_path(&self, path: &str) -> ConventionResult<Resolved> {
        let parsed = RoutePath::parse(path)?;

        for RouteMatch { key, path_params } in parsed.candidates() {
            if let Some(handler) = self.entries.get(&key) {
                return Ok(Resolved {
                    handler: Arc::clone(handler),
                    key,
                    path_params,
                });
            }
        }

        let canonical = parsed.canonical()?;
        Err(ConventionError::RouteNotFound(canonical.key))
    }

    pub(super) fn insert(
        &mut self,
        key: RouteKey,
        handler: Arc<dyn Handler>,
    ) -> ConventionResult<()> {
        if self.entries.contains_key(&key) {
            return Err(ConventionError::DuplicateRoute(key));
        }
        let route = key.to_string();
        self.entries.insert(key, handler);
        log_event_with_fields(Event::RouteRegistered, &[("route", &route)]);
        Ok(())
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

/// Collects registrations during startup
#[derive(Default)]
pub struct RouteTableBuilder {
    table: RouteTable,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Fails with `DuplicateRoute` if the triple exists.
    pub fn register<H>(
        &mut self,
        version: u32,
        resource: &str,
        operation: &str,
        handler: H,
    ) -> ConventionResult<&mut Self>
    where
        H: Handler + 'static,
    {
        let key = RouteKey::parse(version, resource, operation)?;
        self.register_key(key, Arc::new(handler))
    }

    /// Register under an already-built key
    pub fn register_key(
        &mut self,
        key: RouteKey,
        handler: Arc<dyn Handler>,
    ) -> ConventionResult<&mut Self> {
        validate_resource(&key.resource)?;
        self.table.insert(key, handler)?;
        Ok(self)
    }

    pub fn build(self) -> RouteTable {
        self.table
    }
}
