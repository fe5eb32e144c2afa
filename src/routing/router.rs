//! Hot-swappable router
//!
//! Lookups load the current [`RouteTable`] snapshot without locking. Writers
//! build a new table and store it in one step, so readers only ever see a
//! complete table. Late registrations (plugins) go through a single writer
//! lock and copy the table before inserting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::errors::ConventionResult;
use crate::observability::{log_event_with_fields, Event};

use super::handler::Handler;
use super::route::{validate_resource, Operation, RouteKey, Version};
use super::table::{Resolved, RouteTable};

/// Shared router holding the current route table snapshot
pub struct Router {
    table: ArcSwap<RouteTable>,
    writer: Mutex<()>,
    revision: AtomicU64,
}

impl Router {
    pub fn new(table: RouteTable) -> Self {
        Self {
            table: ArcSwap::from_pointee(table),
            writer: Mutex::new(()),
            revision: AtomicU64::new(0),
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    /// Number of table replacements since construction
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    pub fn resolve(
        &self,
        version: Version,
        resource: &str,
        operation: &Operation,
    ) -> ConventionResult<Arc<dyn Handler>> {
        self.table.load().resolve(version, resource, operation)
    }

    pub fn resolve_path(&self, path: &str) -> ConventionResult<Resolved> {
        self.table.load().resolve_path(path)
    }

    /// Replace the whole table atomically
    pub fn reload(&self, table: RouteTable) {
        let _guard = self.writer.lock();
        let routes = table.len().to_string();
        self.table.store(Arc::new(table));
        let revision = self.revision.fetch_add(1, Ordering::AcqRel) + 1;
        log_event_with_fields(
            Event::RoutesReloaded,
            &[("revision", &revision.to_string()), ("routes", &routes)],
        );
    }

    /// Register one more route after startup
    pub fn register<H>(
        &self,
        version: u32,
        resource: &str,
        operation: &str,
        handler: H,
    ) -> ConventionResult<()>
    where
        H: Handler + 'static,
    {
        let key = RouteKey::parse(version, resource, operation)?;
        self.register_key(key, Arc::new(handler))
    }

    pub fn register_key(&self, key: RouteKey, handler: Arc<dyn Handler>) -> ConventionResult<()> {
        validate_resource(&key.resource)?;
        let _guard = self.writer.lock();
        let mut next = RouteTable::clone(&self.table.load());
        next.insert(key, handler)?;
        self.table.store(Arc::new(next));
        self.revision.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RouteTable::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConventionError;
    use crate::routing::handler::{HandlerCall, HandlerOutput, HandlerResult};
    use serde_json::json;
    use std::thread;

    fn noop(_: &HandlerCall) -> HandlerResult {
        Ok(HandlerOutput::ok(json!([])))
    }

    #[test]
    fn test_late_registration() {
        let router = Router::default();
        router.register(1, "user", "activate", noop).unwrap();
        assert!(router
            .resolve(Version::new(1), "user", &Operation::Custom("activate".into()))
            .is_ok());
        assert_eq!(router.revision(), 1);
    }

    #[test]
    fn test_late_duplicate_rejected() {
        let router = Router::default();
        router.register(1, "user", "list", noop).unwrap();
        let err = router.register(1, "user", "list", noop).unwrap_err();
        assert!(matches!(err, ConventionError::DuplicateRoute(_)));
        assert_eq!(router.snapshot().len(), 1);
    }

    #[test]
    fn test_reload_swaps_table() {
        let mut builder = RouteTable::builder();
        builder.register(1, "user", "list", noop).unwrap();
        let router = Router::new(builder.build());

        let held = router.snapshot();

        let mut builder = RouteTable::builder();
        builder.register(2, "user", "list", noop).unwrap();
        router.reload(builder.build());

        // Old snapshot is unaffected
        assert!(held.resolve(Version::new(1), "user", &Operation::List).is_ok());
        assert!(router.resolve(Version::new(1), "user", &Operation::List).is_err());
        assert!(router.resolve(Version::new(2), "user", &Operation::List).is_ok());
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let router = Arc::new(Router::default());
        router.register(1, "user", "list", noop).unwrap();

        let mut handles = Vec::new();
        for i in 0..4 {
            let router = Arc::clone(&router);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    assert!(router.resolve_path("/1/user/list").is_ok());
                }
                router
                    .register(1, &format!("plugin{}", i), "list", noop)
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(router.snapshot().len(), 5);
    }
}
