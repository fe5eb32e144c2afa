//! Bearer token extraction and the authentication seam
//!
//! The token is opaque here. Verifying it (JWT, session lookup, API key) is
//! the job of an [`Authenticator`] supplied by the application.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Opaque bearer token from the `Authorization` header
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Extract a token from an `Authorization` header value.
    ///
    /// Accepts `Bearer <token>` (keyword matched case-insensitively) or the
    /// bare token. Blank values yield `None`.
    pub fn from_header(value: &str) -> Option<Self> {
        let value = value.trim();
        let token = match value.split_once(' ') {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
            _ => value,
        };
        if token.is_empty() || token.eq_ignore_ascii_case("bearer") {
            return None;
        }
        Some(Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Never print the token itself
impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BearerToken(<{} bytes>)", self.0.len())
    }
}

/// Identity established by an [`Authenticator`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub claims: BTreeMap<String, String>,
}

impl Principal {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            claims: BTreeMap::new(),
        }
    }

    pub fn with_claim(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.insert(key.into(), value.into());
        self
    }

    pub fn claim(&self, key: &str) -> Option<&str> {
        self.claims.get(key).map(String::as_str)
    }
}

/// Authentication failures reported to the client as `meta.code = 401`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    Expired,
}

impl AuthFailure {
    pub fn meta_code(&self) -> u16 {
        401
    }
}

/// Verifies bearer tokens
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &BearerToken) -> Result<Principal, AuthFailure>;
}

/// Accepts exactly one configured token. Useful for tests and internal tooling.
#[derive(Clone)]
pub struct StaticTokenAuthenticator {
    token: String,
    subject: String,
}

impl StaticTokenAuthenticator {
    pub fn new(token: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            subject: subject.into(),
        }
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn authenticate(&self, token: &BearerToken) -> Result<Principal, AuthFailure> {
        if token.as_str() == self.token {
            Ok(Principal::new(self.subject.clone()))
        } else {
            Err(AuthFailure::InvalidToken)
        }
    }
}
