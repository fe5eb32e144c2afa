//! Observable events
//!
//! Events are explicit and typed; each maps to one stable log name.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    BootStart,
    ConfigLoaded,
    Serving,
    ShutdownComplete,

    // Routing
    RouteRegistered,
    RoutesReloaded,

    // Requests
    RequestReceived,
    /// Envelope, path or auth rejected before reaching a handler
    RequestRejected,
    RequestCompleted,
    /// Handler returned an application error
    HandlerFailed,
    /// Handler or meta construction failed unexpectedly
    InternalFault,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "FLATAPI_STARTUP_BEGIN",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::Serving => "FLATAPI_SERVING",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",

            Event::RouteRegistered => "ROUTE_REGISTERED",
            Event::RoutesReloaded => "ROUTES_RELOADED",

            Event::RequestReceived => "REQUEST_BEGIN",
            Event::RequestRejected => "REQUEST_REJECTED",
            Event::RequestCompleted => "REQUEST_COMPLETE",
            Event::HandlerFailed => "HANDLER_FAILED",
            Event::InternalFault => "INTERNAL_FAULT",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Event::InternalFault)
    }

    /// High-volume per-request events
    pub fn is_per_request(&self) -> bool {
        matches!(self, Event::RequestReceived | Event::RequestCompleted)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
