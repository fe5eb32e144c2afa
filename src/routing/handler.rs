//! Handler contract
//!
//! Handlers are external collaborators (persistence, business logic). The
//! router only stores references to them; the dispatcher invokes them with a
//! decoded envelope and wraps their output in a meta block.

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::dispatch::{BearerToken, Principal};
use crate::envelope::{BinaryPayload, RequestEnvelope};
use crate::errors::{ConventionError, FieldDetail};
use crate::meta::Pagination;

use super::route::RouteKey;

/// Everything a handler gets to see about one request
#[derive(Debug, Clone)]
pub struct HandlerCall {
    pub request_id: Uuid,
    pub route: RouteKey,
    /// Resource-qualifying and trailing IDs, in path order
    pub path_params: Vec<String>,
    pub envelope: RequestEnvelope,
    /// Opaque token from the `Authorization` header
    pub token: Option<BearerToken>,
    /// Set when an authenticator is configured and accepted the token
    pub principal: Option<Principal>,
}

impl HandlerCall {
    /// Path parameter at `index`, if present
    pub fn path_param(&self, index: usize) -> Option<&str> {
        self.path_params.get(index).map(String::as_str)
    }
}

/// Successful handler result
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutput {
    /// 200 or 201; anything else is rejected by the meta builder
    pub code: u16,
    /// Overrides the default message for `code`
    pub message: Option<String>,
    pub data: Value,
    /// Present only for paginated results
    pub pagination: Option<Pagination>,
    pub binary: Option<BinaryPayload>,
}

impl HandlerOutput {
    pub fn ok(data: Value) -> Self {
        Self::with_code(200, data)
    }

    pub fn created(data: Value) -> Self {
        Self::with_code(201, data)
    }

    pub fn with_code(code: u16, data: Value) -> Self {
        Self {
            code,
            message: None,
            data,
            pagination: None,
            binary: None,
        }
    }

    pub fn paginated(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_binary(mut self, binary: BinaryPayload) -> Self {
        self.binary = Some(binary);
        self
    }
}

/// Handler failure
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// Failure communicated through `meta.code` and `meta.details`
    #[error("{message}")]
    Application {
        code: u16,
        message: String,
        details: Vec<FieldDetail>,
    },

    /// Unexpected fault; the only case that surfaces as a transport 5xx
    #[error("Internal handler error: {0}")]
    Internal(String),
}

impl HandlerError {
    pub fn application(code: u16, message: impl Into<String>) -> Self {
        HandlerError::Application {
            code,
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Add a `{field, message}` entry to an application error
    pub fn with_detail(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        if let HandlerError::Application { details, .. } = &mut self {
            details.push(FieldDetail::new(field, message));
        }
        self
    }

    pub fn internal(message: impl Into<String>) -> Self {
        HandlerError::Internal(message.into())
    }
}

impl From<ConventionError> for HandlerError {
    fn from(err: ConventionError) -> Self {
        HandlerError::Application {
            code: err.meta_code(),
            message: err.to_string(),
            details: err.details(),
        }
    }
}

/// Result type for handlers
pub type HandlerResult = Result<HandlerOutput, HandlerError>;

/// A registered operation handler
pub trait Handler: Send + Sync {
    fn handle(&self, call: &HandlerCall) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&HandlerCall) -> HandlerResult + Send + Sync,
{
    fn handle(&self, call: &HandlerCall) -> HandlerResult {
        self(call)
    }
}

impl std::fmt::Debug for dyn Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Handler")
    }
}
