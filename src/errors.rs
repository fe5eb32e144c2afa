//! # Convention Errors
//!
//! Local validation failures raised by the codec, the route resolver and the
//! meta builder. None of these become transport-level 4xx responses: the
//! dispatcher turns them into a response envelope whose `meta.code` carries
//! the application code and whose `meta.details` lists the offending fields.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::routing::RouteKey;

/// Result type for convention checks
pub type ConventionResult<T> = Result<T, ConventionError>;

/// A single `{field, message}` entry of `meta.details`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDetail {
    pub field: String,
    pub message: String,
}

impl FieldDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Convention violations
#[derive(Debug, Clone, Error)]
pub enum ConventionError {
    // ==================
    // Envelope
    // ==================
    /// Structural violation of flatness or of the reserved key set
    #[error("Malformed envelope: {}", summarize(.0))]
    MalformedEnvelope(Vec<FieldDetail>),

    /// `binary64` / `binary64gz` is not valid base64 (or not valid gzip)
    #[error("Invalid binary encoding in {field}: {reason}")]
    InvalidBinaryEncoding { field: String, reason: String },

    /// Request body larger than the transport accepts
    #[error("Payload too large: body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    // ==================
    // Routing
    // ==================
    /// The `(version, resource, operation)` triple is already registered
    #[error("Duplicate route: {0}")]
    DuplicateRoute(RouteKey),

    /// No handler is registered for the triple
    #[error("Route not found: {0}")]
    RouteNotFound(RouteKey),

    /// The path or one of its segments does not have a valid shape
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    // ==================
    // Meta
    // ==================
    /// `meta.code` outside the set allowed for the builder call
    #[error("Invalid meta code: {0}")]
    InvalidMetaCode(i64),

    /// Pagination request that cannot produce a meta block
    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),
}

fn summarize(details: &[FieldDetail]) -> String {
    match details {
        [] => "no details".to_string(),
        [only] => format!("{}: {}", only.field, only.message),
        [first, rest @ ..] => format!(
            "{}: {} (and {} more)",
            first.field,
            first.message,
            rest.len()
        ),
    }
}

impl ConventionError {
    /// Shorthand for a single-field malformed envelope
    pub fn malformed(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConventionError::MalformedEnvelope(vec![FieldDetail::new(field, message)])
    }

    /// Stable string tag, used as `error.code` in response envelopes
    pub fn code(&self) -> &'static str {
        match self {
            ConventionError::MalformedEnvelope(_) => "MALFORMED_ENVELOPE",
            ConventionError::InvalidBinaryEncoding { .. } => "INVALID_BINARY_ENCODING",
            ConventionError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            ConventionError::DuplicateRoute(_) => "DUPLICATE_ROUTE",
            ConventionError::RouteNotFound(_) => "ROUTE_NOT_FOUND",
            ConventionError::InvalidRoute(_) => "INVALID_ROUTE",
            ConventionError::InvalidMetaCode(_) => "INVALID_META_CODE",
            ConventionError::InvalidPagination(_) => "INVALID_PAGINATION",
        }
    }

    /// Application code placed in `meta.code` when this error reaches a client.
    ///
    /// `InvalidMetaCode` and `InvalidPagination` come from handler output, so
    /// they are internal faults and map to 500.
    pub fn meta_code(&self) -> u16 {
        match self {
            // 400-equivalent
            ConventionError::MalformedEnvelope(_) => 400,
            ConventionError::InvalidBinaryEncoding { .. } => 400,
            ConventionError::InvalidRoute(_) => 400,

            // 413-equivalent
            ConventionError::PayloadTooLarge { .. } => 413,

            // 404-equivalent
            ConventionError::RouteNotFound(_) => 404,

            // 409-equivalent
            ConventionError::DuplicateRoute(_) => 409,

            // Internal
            ConventionError::InvalidMetaCode(_) => 500,
            ConventionError::InvalidPagination(_) => 500,
        }
    }

    /// `{field, message}` entries for `meta.details`
    pub fn details(&self) -> Vec<FieldDetail> {
        match self {
            ConventionError::MalformedEnvelope(details) => details.clone(),
            ConventionError::InvalidBinaryEncoding { field, reason } => {
                vec![FieldDetail::new(field.clone(), reason.clone())]
            }
            ConventionError::PayloadTooLarge { limit } => {
                vec![FieldDetail::new("body", format!("must not exceed {} bytes", limit))]
            }
            ConventionError::DuplicateRoute(key) | ConventionError::RouteNotFound(key) => {
                vec![FieldDetail::new("path", key.to_string())]
            }
            ConventionError::InvalidRoute(reason) => vec![FieldDetail::new("path", reason.clone())],
            ConventionError::InvalidMetaCode(_) | ConventionError::InvalidPagination(_) => {
                Vec::new()
            }
        }
    }
}
