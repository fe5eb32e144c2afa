//! Response envelope
//!
//! ```json
//! {
//!   "meta": {"code": 200, "message": "OK", "time": 1734432019759,
//!            "page": 1, "page_size": 20, "total": 42, "page_total": 3},
//!   "data": [{"id": 1}]
//! }
//! ```

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::errors::{ConventionError, ConventionResult, FieldDetail};

use super::binary::BinaryPayload;

/// Reserved top-level keys of a response envelope
pub const RESPONSE_KEYS: [&str; 5] = ["meta", "data", "error", "binary64", "binary64gz"];

/// Keys allowed inside `meta`
const META_KEYS: [&str; 8] = [
    "code",
    "message",
    "time",
    "page",
    "page_size",
    "total",
    "page_total",
    "details",
];

/// `total` and `page_total`, which are present together or not at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCounts {
    pub total: u64,
    pub page_total: u64,
}

/// Pagination fields of a meta block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u64,
    page_size: u64,
    counts: Option<PageCounts>,
}

impl Pagination {
    /// 1-based page of `page_size` items, without counts
    pub fn new(page: u64, page_size: u64) -> ConventionResult<Self> {
        if page == 0 {
            return Err(ConventionError::InvalidPagination(
                "page is 1-based".to_string(),
            ));
        }
        if page_size == 0 {
            return Err(ConventionError::InvalidPagination(
                "page_size must be > 0".to_string(),
            ));
        }
        Ok(Self {
            page,
            page_size,
            counts: None,
        })
    }

    /// Attach the total item count; `page_total` is derived from it
    pub fn with_total(mut self, total: u64) -> Self {
        self.counts = Some(PageCounts {
            total,
            page_total: total.div_ceil(self.page_size),
        });
        self
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn total(&self) -> Option<u64> {
        self.counts.map(|c| c.total)
    }

    pub fn page_total(&self) -> Option<u64> {
        self.counts.map(|c| c.page_total)
    }

    /// Zero-based offset of the first item on this page
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// The `meta` block of every response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    pub code: u16,
    pub message: String,
    /// UTC milliseconds since the epoch
    pub time: i64,
    pub pagination: Option<Pagination>,
    pub details: Vec<FieldDetail>,
}

impl Meta {
    pub fn is_success(&self) -> bool {
        matches!(self.code, 200 | 201)
    }

    /// Decode a `meta` object, checking pagination both-or-neither
    pub(crate) fn parse(value: &Value, violations: &mut Vec<FieldDetail>) -> Option<Self> {
        let Some(map) = value.as_object() else {
            violations.push(FieldDetail::new("meta", "must be an object"));
            return None;
        };
        let before = violations.len();

        for key in map.keys() {
            if !META_KEYS.contains(&key.as_str()) {
                violations.push(FieldDetail::new(
                    format!("meta.{}", key),
                    "unknown meta key",
                ));
            }
        }

        let code = required_u64(map, "code", violations).and_then(|code| {
            u16::try_from(code)
                .map_err(|_| violations.push(FieldDetail::new("meta.code", "out of range")))
                .ok()
        });
        let message = match map.get("message") {
            Some(Value::String(s)) => Some(s.clone()),
            _ => {
                violations.push(FieldDetail::new("meta.message", "must be a string"));
                None
            }
        };
        let time = match map.get("time").and_then(Value::as_i64) {
            Some(t) => Some(t),
            None => {
                violations.push(FieldDetail::new("meta.time", "must be an integer"));
                None
            }
        };

        let pagination = parse_pagination(map, violations);

        let details = match map.get("details") {
            None => Vec::new(),
            Some(v) => match serde_json::from_value::<Vec<FieldDetail>>(v.clone()) {
                Ok(details) => details,
                Err(_) => {
                    violations.push(FieldDetail::new(
                        "meta.details",
                        "must be a list of {field, message}",
                    ));
                    Vec::new()
                }
            },
        };

        if violations.len() != before {
            return None;
        }

        Some(Meta {
            code: code?,
            message: message?,
            time: time?,
            pagination,
            details,
        })
    }
}

impl Serialize for Meta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("code", &self.code)?;
        map.serialize_entry("message", &self.message)?;
        map.serialize_entry("time", &self.time)?;
        if let Some(p) = &self.pagination {
            map.serialize_entry("page", &p.page)?;
            map.serialize_entry("page_size", &p.page_size)?;
            if let Some(counts) = &p.counts {
                map.serialize_entry("total", &counts.total)?;
                map.serialize_entry("page_total", &counts.page_total)?;
            }
        }
        if !self.details.is_empty() {
            map.serialize_entry("details", &self.details)?;
        }
        map.end()
    }
}

fn required_u64(map: &Map<String, Value>, key: &str, violations: &mut Vec<FieldDetail>) -> Option<u64> {
    let value = map.get(key).and_then(Value::as_u64);
    if value.is_none() {
        violations.push(FieldDetail::new(
            format!("meta.{}", key),
            "must be a non-negative integer",
        ));
    }
    value
}

fn parse_pagination(map: &Map<String, Value>, violations: &mut Vec<FieldDetail>) -> Option<Pagination> {
    let has = |key: &str| map.contains_key(key);

    if has("total") != has("page_total") {
        violations.push(FieldDetail::new(
            "meta.page_total",
            "total and page_total must be present together",
        ));
        return None;
    }
    if !has("page") && !has("page_size") {
        if has("total") {
            violations.push(FieldDetail::new(
                "meta.page",
                "counts require page and page_size",
            ));
        }
        return None;
    }

    let page = required_u64(map, "page", violations)?;
    let page_size = required_u64(map, "page_size", violations)?;
    let mut pagination = match Pagination::new(page, page_size) {
        Ok(p) => p,
        Err(e) => {
            violations.push(FieldDetail::new("meta.page", e.to_string()));
            return None;
        }
    };

    if has("total") {
        let total = required_u64(map, "total", violations)?;
        let page_total = required_u64(map, "page_total", violations)?;
        pagination.counts = Some(PageCounts { total, page_total });
    }

    Some(pagination)
}

/// The `error` section: a stable tag plus a readable message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&ConventionError> for ErrorBody {
    fn from(err: &ConventionError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// A response envelope
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub meta: Meta,
    pub data: Option<Value>,
    pub error: Option<ErrorBody>,
    pub binary: Option<BinaryPayload>,
}

impl ResponseEnvelope {
    pub fn new(meta: Meta) -> Self {
        Self {
            meta,
            data: None,
            error: None,
            binary: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_error(mut self, error: ErrorBody) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_binary(mut self, binary: BinaryPayload) -> Self {
        self.binary = Some(binary);
        self
    }
}

impl Serialize for ResponseEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("meta", &self.meta)?;
        if let Some(data) = &self.data {
            map.serialize_entry("data", data)?;
        }
        if let Some(error) = &self.error {
            map.serialize_entry("error", error)?;
        }
        if let Some(binary) = &self.binary {
            map.serialize_entry(binary.key(), binary.encoded())?;
        }
        map.end()
    }
}
