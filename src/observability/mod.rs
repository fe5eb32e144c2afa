//! Observability for flatapi
//!
//! - Structured logging (JSON lines)
//! - Typed lifecycle and request events
//! - Monotonic request counters
//!
//! ```ignore
//! use flatapi::observability::{log_event_with_fields, Event, DispatchMetrics};
//!
//! log_event_with_fields(Event::RouteRegistered, &[("route", "/1/user/list")]);
//!
//! let metrics = DispatchMetrics::new();
//! metrics.increment_requests_received();
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{DispatchMetrics, MetricsSnapshot};

fn severity_for(event: Event) -> Severity {
    if event.is_error() {
        Severity::Error
    } else if event.is_per_request() {
        Severity::Trace
    } else {
        Severity::Info
    }
}

/// Log a lifecycle event
pub fn log_event(event: Event) {
    Logger::log(severity_for(event), event.as_str(), &[]);
}

/// Log an event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(severity_for(event), event.as_str(), fields);
}
