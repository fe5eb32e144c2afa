//! Meta codes
//!
//! Application errors reuse the conventional HTTP numbers (400, 401, 404,
//! 422, ...) inside `meta.code` while the transport answers 200. Only 5xx
//! codes are mirrored into the transport status.
//!
//! `meta.code` is otherwise open: any value that fits the wire field (`u16`)
//! except 200/201 is a valid error code, including application-specific
//! numbers outside the HTTP range.

use std::fmt;

use axum::http::StatusCode;

use crate::errors::{ConventionError, ConventionResult};

/// Value of `meta.code`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaCode {
    /// 200
    Ok,
    /// 201
    Created,
    /// Application-level failure carried with transport 200
    Application(u16),
    /// 5xx: unexpected fault, also used as transport status
    Server(u16),
}

impl MetaCode {
    /// Codes accepted by the success builder: 200 and 201 only
    pub fn success(code: u16) -> ConventionResult<Self> {
        match code {
            200 => Ok(MetaCode::Ok),
            201 => Ok(MetaCode::Created),
            other => Err(ConventionError::InvalidMetaCode(i64::from(other))),
        }
    }

    /// Codes accepted by the error builder: anything but 200/201
    pub fn error(code: u16) -> ConventionResult<Self> {
        match code {
            200 | 201 => Err(ConventionError::InvalidMetaCode(i64::from(code))),
            500..=599 => Ok(MetaCode::Server(code)),
            other => Ok(MetaCode::Application(other)),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            MetaCode::Ok => 200,
            MetaCode::Created => 201,
            MetaCode::Application(code) | MetaCode::Server(code) => *code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MetaCode::Ok | MetaCode::Created)
    }

    /// Status the transport layer should answer with
    pub fn transport_status(&self) -> u16 {
        match self {
            MetaCode::Ok | MetaCode::Application(_) => 200,
            MetaCode::Created => 201,
            MetaCode::Server(code) => *code,
        }
    }

    /// Default `meta.message` for this code
    pub fn default_message(&self) -> &'static str {
        StatusCode::from_u16(self.as_u16())
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("Application Error")
    }
}

impl fmt::Display for MetaCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_codes() {
        assert_eq!(MetaCode::success(200).unwrap(), MetaCode::Ok);
        assert_eq!(MetaCode::success(201).unwrap(), MetaCode::Created);
        for code in [204, 302, 400, 500] {
            assert!(matches!(
                MetaCode::success(code),
                Err(ConventionError::InvalidMetaCode(c)) if c == i64::from(code)
            ));
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(MetaCode::error(401).unwrap(), MetaCode::Application(401));
        assert_eq!(MetaCode::error(503).unwrap(), MetaCode::Server(503));
        assert!(MetaCode::error(200).is_err());
        assert!(MetaCode::error(201).is_err());

        // Application-specific codes outside the HTTP range
        assert_eq!(MetaCode::error(42).unwrap(), MetaCode::Application(42));
        assert_eq!(MetaCode::error(4001).unwrap(), MetaCode::Application(4001));
        assert_eq!(MetaCode::error(4001).unwrap().transport_status(), 200);
        assert_eq!(MetaCode::error(4001).unwrap().default_message(), "Application Error");
    }

    #[test]
    fn test_transport_status() {
        assert_eq!(MetaCode::Ok.transport_status(), 200);
        assert_eq!(MetaCode::Created.transport_status(), 201);
        assert_eq!(MetaCode::Application(404).transport_status(), 200);
        assert_eq!(MetaCode::Server(502).transport_status(), 502);
    }

    #[test]
    fn test_default_messages() {
        assert_eq!(MetaCode::Ok.default_message(), "OK");
        assert_eq!(MetaCode::Created.default_message(), "Created");
        assert_eq!(MetaCode::Application(401).default_message(), "Unauthorized");
        assert_eq!(MetaCode::Application(404).default_message(), "Not Found");
        assert_eq!(MetaCode::Server(500).default_message(), "Internal Server Error");
        assert_eq!(MetaCode::Application(799).default_message(), "Application Error");
    }
}
