//! Route keys
//!
//! A route is the `(version, resource, operation)` triple taken from
//! `/<version>/<resource>/<operation>`. The HTTP method plays no part in it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ConventionError, ConventionResult};

/// API version segment. Bumped only for breaking payload or behavior changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version(u32);

impl Version {
    pub fn new(version: u32) -> Self {
        Self(version)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// Parse a path segment. Only plain decimal integers >= 1 are accepted.
    pub fn parse_segment(segment: &str) -> ConventionResult<Self> {
        if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ConventionError::InvalidRoute(format!(
                "Version segment must be an integer: '{}'",
                segment
            )));
        }
        let value: u32 = segment.parse().map_err(|_| {
            ConventionError::InvalidRoute(format!("Version out of range: '{}'", segment))
        })?;
        if value == 0 {
            return Err(ConventionError::InvalidRoute(
                "Version must be >= 1".to_string(),
            ));
        }
        Ok(Self(value))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operation verb segment. Replaces HTTP method semantics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    List,
    Save,
    Modify,
    Delete,
    /// Self-descriptive custom verb such as `activate`
    Custom(String),
}

impl Operation {
    /// Build a custom verb, validated for shape only
    pub fn custom(verb: impl Into<String>) -> ConventionResult<Self> {
        let verb = verb.into();
        validate_segment("operation", &verb)?;
        Ok(Operation::Custom(verb))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Operation::List => "list",
            Operation::Save => "save",
            Operation::Modify => "modify",
            Operation::Delete => "delete",
            Operation::Custom(verb) => verb,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Operation::Custom(_))
    }
}

impl FromStr for Operation {
    type Err = ConventionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "list" => Ok(Operation::List),
            "save" => Ok(Operation::Save),
            "modify" => Ok(Operation::Modify),
            "delete" => Ok(Operation::Delete),
            other => Operation::custom(other),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The triple a handler is registered under
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    pub version: Version,
    /// Resource name, possibly qualified (`document/pages`)
    pub resource: String,
    pub operation: Operation,
}

impl RouteKey {
    pub fn new(version: Version, resource: impl Into<String>, operation: Operation) -> Self {
        Self {
            version,
            resource: resource.into(),
            operation,
        }
    }

    /// Build a key from raw parts, validating each segment
    pub fn parse(version: u32, resource: &str, operation: &str) -> ConventionResult<Self> {
        if version == 0 {
            return Err(ConventionError::InvalidRoute(
                "Version must be >= 1".to_string(),
            ));
        }
        validate_resource(resource)?;
        Ok(Self {
            version: Version::new(version),
            resource: resource.to_string(),
            operation: operation.parse()?,
        })
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}/{}", self.version, self.resource, self.operation)
    }
}

/// A resource is one or more `/`-separated segment names
pub(crate) fn validate_resource(resource: &str) -> ConventionResult<()> {
    if resource.is_empty() {
        return Err(ConventionError::InvalidRoute(
            "resource cannot be empty".to_string(),
        ));
    }
    for name in resource.split('/') {
        validate_segment("resource", name)?;
    }
    Ok(())
}

/// Non-empty and limited to unreserved URL characters
pub(crate) fn validate_segment(kind: &str, segment: &str) -> ConventionResult<()> {
    if segment.is_empty() {
        return Err(ConventionError::InvalidRoute(format!(
            "{} segment cannot be empty",
            kind
        )));
    }
    if !segment.chars().all(is_segment_char) {
        return Err(ConventionError::InvalidRoute(format!(
            "{} segment contains unsafe characters: '{}'",
            kind, segment
        )));
    }
    Ok(())
}

fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~')
}
