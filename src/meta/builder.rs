//! Meta builder
//!
//! Computes the `meta` block for every response, error responses included.

use std::sync::Arc;

use serde_json::Value;

use crate::envelope::{Meta, Pagination, ResponseEnvelope};
use crate::errors::{ConventionResult, FieldDetail};

use super::clock::{Clock, MonotonicClock, SystemClock};
use super::code::MetaCode;

/// Builds meta blocks with a non-decreasing `time`
pub struct MetaBuilder {
    clock: MonotonicClock<Arc<dyn Clock>>,
}

impl MetaBuilder {
    /// Builder stamping wall-clock UTC milliseconds. All such builders share
    /// one floor, so `meta.time` never decreases anywhere in the process.
    pub fn new() -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            clock: MonotonicClock::process_wide(clock),
        }
    }

    /// Builder on a custom clock, guarded on its own
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock: MonotonicClock::new(clock),
        }
    }

    /// Current `meta.time` value
    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Meta block for a successful result. `code` must be 200 or 201.
    pub fn success_meta(
        &self,
        code: u16,
        message: Option<String>,
        pagination: Option<Pagination>,
    ) -> ConventionResult<Meta> {
        let code = MetaCode::success(code)?;
        Ok(Meta {
            code: code.as_u16(),
            message: message.unwrap_or_else(|| code.default_message().to_string()),
            time: self.now(),
            pagination,
            details: Vec::new(),
        })
    }

    /// Meta block for a failure. Empty `message` falls back to the default text.
    pub fn error_meta(
        &self,
        code: u16,
        message: &str,
        details: Vec<FieldDetail>,
    ) -> ConventionResult<Meta> {
        let code = MetaCode::error(code)?;
        let message = if message.is_empty() {
            code.default_message().to_string()
        } else {
            message.to_string()
        };
        Ok(Meta {
            code: code.as_u16(),
            message,
            time: self.now(),
            pagination: None,
            details,
        })
    }

    /// Success envelope carrying `data`
    pub fn build_success(
        &self,
        code: u16,
        data: Value,
        pagination: Option<Pagination>,
    ) -> ConventionResult<ResponseEnvelope> {
        let meta = self.success_meta(code, None, pagination)?;
        Ok(ResponseEnvelope::new(meta).with_data(data))
    }

    /// Error envelope; `data` defaults to an empty sequence
    pub fn build_error(
        &self,
        code: u16,
        message: &str,
        details: Vec<FieldDetail>,
    ) -> ConventionResult<ResponseEnvelope> {
        let meta = self.error_meta(code, message, details)?;
        Ok(ResponseEnvelope::new(meta).with_data(Value::Array(Vec::new())))
    }
}

impl Default for MetaBuilder {
    fn default() -> Self {
        Self::new()
    }
}
