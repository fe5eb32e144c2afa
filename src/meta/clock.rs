//! Time source for `meta.time`

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Source of UTC milliseconds since the epoch
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Highest reading handed out by any process-wide [`MonotonicClock`]
static PROCESS_LAST_MILLIS: AtomicI64 = AtomicI64::new(i64::MIN);

enum Floor {
    Process,
    Local(AtomicI64),
}

impl Floor {
    fn get(&self) -> &AtomicI64 {
        match self {
            Floor::Process => &PROCESS_LAST_MILLIS,
            Floor::Local(last) => last,
        }
    }
}

/// Wraps a clock so readings never go backwards, even if the wall clock does
pub struct MonotonicClock<C: Clock> {
    inner: C,
    floor: Floor,
}

impl<C: Clock> MonotonicClock<C> {
    /// Guard private to this clock
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            floor: Floor::Local(AtomicI64::new(i64::MIN)),
        }
    }

    /// Guard shared by every process-wide clock, so readings never go
    /// backwards across instances either
    pub fn process_wide(inner: C) -> Self {
        Self {
            inner,
            floor: Floor::Process,
        }
    }
}

impl<C: Clock> Clock for MonotonicClock<C> {
    fn now_millis(&self) -> i64 {
        let now = self.inner.now_millis();
        let previous = self.floor.get().fetch_max(now, Ordering::AcqRel);
        previous.max(now)
    }
}

/// Clock that returns a settable value
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_millis(&self) -> i64 {
        (**self).now_millis()
    }
}
