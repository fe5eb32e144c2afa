//! Path parsing
//!
//! Path shape: `/<version>/<name>[/<id>/<name>]*/<operation>[/<id>...]`.
//!
//! IDs that qualify a resource (`/document/1234/pages/list`) and trailing IDs
//! after the operation are returned positionally as path parameters. They are
//! never merged into the request `filter`.

use crate::errors::{ConventionError, ConventionResult};

use super::route::{validate_segment, Operation, RouteKey, Version};

/// A parsed request path, before it is matched against the route table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePath {
    version: Version,
    segments: Vec<String>,
}

/// One way of reading a path as a route key plus path parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub key: RouteKey,
    pub path_params: Vec<String>,
}

impl RoutePath {
    /// Parse a request path. A query string, if any, is ignored.
    pub fn parse(path: &str) -> ConventionResult<Self> {
        let path = path.split('?').next().unwrap_or_default();
        let trimmed = path.trim_start_matches('/').trim_end_matches('/');

        if trimmed.is_empty() {
            return Err(ConventionError::InvalidRoute("path is empty".to_string()));
        }

        let mut parts = trimmed.split('/');
        let version = Version::parse_segment(parts.next().unwrap_or_default())?;

        let segments: Vec<String> = parts.map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(ConventionError::InvalidRoute(format!(
                "path contains an empty segment: '{}'",
                path
            )));
        }
        if segments.len() < 2 {
            return Err(ConventionError::InvalidRoute(format!(
                "path must contain a resource and an operation: '{}'",
                path
            )));
        }

        Ok(Self { version, segments })
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Every structurally valid reading of the path, shortest resource first.
    ///
    /// Resource names sit at even positions before the operation and the IDs
    /// between them at odd positions, so the operation index is always odd.
    pub fn candidates(&self) -> Vec<RouteMatch> {
        (1..self.segments.len())
            .step_by(2)
            .filter_map(|op_index| self.split_at(op_index).ok())
            .collect()
    }

    /// The default reading: `/<version>/<resource>/<operation>[/<ids>...]`
    pub fn canonical(&self) -> ConventionResult<RouteMatch> {
        self.split_at(1)
    }

    fn split_at(&self, op_index: usize) -> ConventionResult<RouteMatch> {
        let (qualified, rest) = self.segments.split_at(op_index);
        let (operation, trailing) = rest
            .split_first()
            .ok_or_else(|| ConventionError::InvalidRoute("missing operation".to_string()))?;

        let mut names = Vec::with_capacity(qualified.len() / 2 + 1);
        let mut path_params = Vec::new();
        for (i, segment) in qualified.iter().enumerate() {
            if i % 2 == 0 {
                validate_segment("resource", segment)?;
                names.push(segment.as_str());
            } else {
                path_params.push(segment.clone());
            }
        }
        path_params.extend(trailing.iter().cloned());

        let operation: Operation = operation.parse()?;

        Ok(RouteMatch {
            key: RouteKey::new(self.version, names.join("/"), operation),
            path_params,
        })
    }
}
