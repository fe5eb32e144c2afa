//! # Filter
//!
//! The `filter` section of a request envelope: a flat map of field paths to
//! criteria. Nested structures are addressed with dotted keys
//! (`"person.child.name"`) instead of nested objects.
//!
//! ```json
//! {"name": "John", "status": ["active", "pending"], "age": {"gte": 18, "lt": 65}}
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::errors::FieldDetail;

/// Filter operators accepted as keys of a criteria object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// `%` matches any run of characters, `_` exactly one
    Like,
    In,
    /// `null` tests for absence, any other value for presence
    Is,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Neq => "neq",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Like => "like",
            FilterOperator::In => "in",
            FilterOperator::Is => "is",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "eq" => FilterOperator::Eq,
            "neq" => FilterOperator::Neq,
            "gt" => FilterOperator::Gt,
            "gte" => FilterOperator::Gte,
            "lt" => FilterOperator::Lt,
            "lte" => FilterOperator::Lte,
            "like" => FilterOperator::Like,
            "in" => FilterOperator::In,
            "is" => FilterOperator::Is,
            _ => return None,
        })
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a filter entry
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// Scalar (equality) or array of scalars (membership)
    Exact(Value),
    /// One-level criteria object, e.g. `{"gte": 18, "lt": 65}`
    Ops(Vec<(FilterOperator, Value)>),
}

impl Criterion {
    fn to_value(&self) -> Value {
        match self {
            Criterion::Exact(value) => value.clone(),
            Criterion::Ops(ops) => Value::Object(
                ops.iter()
                    .map(|(op, value)| (op.as_str().to_string(), value.clone()))
                    .collect(),
            ),
        }
    }
}

/// A single `field <op> value` test
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpr {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

impl FilterExpr {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Check if a document matches this expression
    pub fn matches(&self, doc: &Value) -> bool {
        let field_value = match lookup(doc, &self.field) {
            Some(v) => v,
            None => return self.operator == FilterOperator::Is && self.value.is_null(),
        };

        match self.operator {
            FilterOperator::Eq => field_value == &self.value,
            FilterOperator::Neq => field_value != &self.value,
            FilterOperator::Gt => compare(field_value, &self.value) == Some(Ordering::Greater),
            FilterOperator::Gte => matches!(
                compare(field_value, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOperator::Lt => compare(field_value, &self.value) == Some(Ordering::Less),
            FilterOperator::Lte => matches!(
                compare(field_value, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOperator::Like => match (field_value.as_str(), self.value.as_str()) {
                (Some(text), Some(pattern)) => like(text, pattern),
                _ => false,
            },
            FilterOperator::In => self
                .value
                .as_array()
                .map(|items| items.contains(field_value))
                .unwrap_or(false),
            FilterOperator::Is => {
                if self.value.is_null() {
                    field_value.is_null()
                } else {
                    !field_value.is_null()
                }
            }
        }
    }
}

/// The `filter` section: field path to criterion, combined with AND
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    entries: BTreeMap<String, Criterion>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality (scalar) or membership (array) entry
    pub fn exact(mut self, field: impl Into<String>, value: Value) -> Self {
        self.entries.insert(field.into(), Criterion::Exact(value));
        self
    }

    /// Add an operator to the criteria object of `field`
    pub fn op(mut self, field: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        let field = field.into();
        let mut ops = match self.entries.remove(&field) {
            Some(Criterion::Ops(ops)) => ops,
            _ => Vec::new(),
        };
        ops.retain(|(existing, _)| *existing != operator);
        ops.push((operator, value));
        self.entries.insert(field, Criterion::Ops(ops));
        self
    }

    pub fn get(&self, field: &str) -> Option<&Criterion> {
        self.entries.get(field)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flatten into individual expressions
    pub fn exprs(&self) -> Vec<FilterExpr> {
        let mut exprs = Vec::new();
        for (field, criterion) in &self.entries {
            match criterion {
                Criterion::Exact(value @ Value::Array(_)) => {
                    exprs.push(FilterExpr::new(field, FilterOperator::In, value.clone()));
                }
                Criterion::Exact(value) => {
                    exprs.push(FilterExpr::new(field, FilterOperator::Eq, value.clone()));
                }
                Criterion::Ops(ops) => {
                    for (op, value) in ops {
                        exprs.push(FilterExpr::new(field, *op, value.clone()));
                    }
                }
            }
        }
        exprs
    }

    /// Check if a document matches every expression
    pub fn matches(&self, doc: &Value) -> bool {
        self.exprs().iter().all(|expr| expr.matches(doc))
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(field, criterion)| (field.clone(), criterion.to_value()))
                .collect(),
        )
    }

    /// Parse the `filter` object, collecting every flatness violation
    pub(crate) fn parse(map: &Map<String, Value>, violations: &mut Vec<FieldDetail>) -> Self {
        let mut entries = BTreeMap::new();

        for (field, value) in map {
            let path = format!("filter.{}", field);
            if !is_field_path(field) {
                violations.push(FieldDetail::new(&path, "invalid field path"));
                continue;
            }

            match value {
                Value::Object(ops) => {
                    if let Some(criterion) = parse_ops(&path, ops, violations) {
                        entries.insert(field.clone(), criterion);
                    }
                }
                other => {
                    if check_flat_value(&path, other, violations) {
                        entries.insert(field.clone(), Criterion::Exact(other.clone()));
                    }
                }
            }
        }

        Self { entries }
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

fn parse_ops(
    path: &str,
    ops: &Map<String, Value>,
    violations: &mut Vec<FieldDetail>,
) -> Option<Criterion> {
    if ops.is_empty() {
        violations.push(FieldDetail::new(path, "criteria object cannot be empty"));
        return None;
    }

    let before = violations.len();
    let mut parsed = Vec::with_capacity(ops.len());

    for (key, value) in ops {
        let op_path = format!("{}.{}", path, key);
        let Some(op) = FilterOperator::parse(key) else {
            let message = if value.is_object() {
                "nested objects are not allowed; use a dotted key"
            } else {
                "unknown filter operator"
            };
            violations.push(FieldDetail::new(&op_path, message));
            continue;
        };
        if !check_flat_value(&op_path, value, violations) {
            continue;
        }
        match op {
            FilterOperator::In if !value.is_array() => {
                violations.push(FieldDetail::new(&op_path, "'in' expects an array"));
            }
            FilterOperator::Like if !value.is_string() => {
                violations.push(FieldDetail::new(&op_path, "'like' expects a string"));
            }
            _ => parsed.push((op, value.clone())),
        }
    }

    (violations.len() == before).then_some(Criterion::Ops(parsed))
}

/// Scalars and arrays of scalars are flat; objects anywhere are not
pub(crate) fn check_flat_value(path: &str, value: &Value, violations: &mut Vec<FieldDetail>) -> bool {
    match value {
        Value::Object(_) => {
            violations.push(FieldDetail::new(
                path,
                "nested objects are not allowed; use a dotted key",
            ));
            false
        }
        Value::Array(items) => {
            let mut flat = true;
            for (i, item) in items.iter().enumerate() {
                if matches!(item, Value::Object(_) | Value::Array(_)) {
                    violations.push(FieldDetail::new(
                        format!("{}[{}]", path, i),
                        "arrays may only contain scalar values",
                    ));
                    flat = false;
                }
            }
            flat
        }
        _ => true,
    }
}

/// Non-empty dotted path with non-empty segments
pub(crate) fn is_field_path(field: &str) -> bool {
    !field.is_empty() && field.split('.').all(|segment| !segment.is_empty())
}

/// Resolve a field path in a document. A literal dotted key wins over walking.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(value) = doc.get(path) {
        return Some(value);
    }
    path.split('.')
        .try_fold(doc, |current, segment| current.get(segment))
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// SQL LIKE matching over chars
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some('_') => {
                t += 1;
                p += 1;
            }
            Some(c) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    backtrack = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '%')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> (Filter, Vec<FieldDetail>) {
        let mut violations = Vec::new();
        let map = value.as_object().cloned().unwrap();
        let filter = Filter::parse(&map, &mut violations);
        (filter, violations)
    }

    #[test]
    fn test_parse_exact_and_ops() {
        let (filter, violations) = parse(json!({
            "name": "John",
            "status": ["active", "pending"],
            "age": {"gte": 18, "lt": 65}
        }));
        assert!(violations.is_empty());
        assert_eq!(filter.len(), 3);
        assert_eq!(filter.get("name"), Some(&Criterion::Exact(json!("John"))));
        assert_eq!(filter.exprs().len(), 4);
    }

    #[test]
    fn test_parse_rejects_deep_nesting() {
        let (_, violations) = parse(json!({"person": {"child": {"name": "Ann"}}}));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "filter.person.child");
        assert!(violations[0].message.contains("dotted key"));
    }

    #[test]
    fn test_parse_rejects_unknown_operator() {
        let (filter, violations) = parse(json!({"age": {"between": [1, 2]}}));
        assert!(filter.is_empty());
        assert_eq!(violations[0].field, "filter.age.between");
    }

    #[test]
    fn test_parse_rejects_objects_in_arrays() {
        let (_, violations) = parse(json!({"tags": ["a", {"b": 1}]}));
        assert_eq!(violations[0].field, "filter.tags[1]");
    }

    #[test]
    fn test_operator_value_shapes() {
        let (_, violations) = parse(json!({"a": {"in": 3}, "b": {"like": 4}, "c": {}}));
        assert_eq!(violations.len(), 3);
    }

    #[test]
    fn test_dotted_key_matches_nested_document() {
        let filter = Filter::new().exact("person.child.name", json!("Ann"));
        assert!(filter.matches(&json!({"person": {"child": {"name": "Ann"}}})));
        assert!(filter.matches(&json!({"person.child.name": "Ann"})));
        assert!(!filter.matches(&json!({"person": {"child": {"name": "Bo"}}})));
    }

    #[test]
    fn test_range_filter() {
        let filter = Filter::new()
            .op("age", FilterOperator::Gte, json!(18))
            .op("age", FilterOperator::Lt, json!(65));

        assert!(filter.matches(&json!({"age": 18})));
        assert!(filter.matches(&json!({"age": 40})));
        assert!(!filter.matches(&json!({"age": 65})));
        assert!(!filter.matches(&json!({"age": "old"})));
    }

    #[test]
    fn test_membership() {
        let filter = Filter::new().exact("status", json!(["active", "pending"]));
        assert!(filter.matches(&json!({"status": "pending"})));
        assert!(!filter.matches(&json!({"status": "closed"})));
    }

    #[test]
    fn test_is_null() {
        let missing = FilterExpr::new("deleted_at", FilterOperator::Is, Value::Null);
        assert!(missing.matches(&json!({"name": "x"})));
        assert!(missing.matches(&json!({"deleted_at": null})));
        assert!(!missing.matches(&json!({"deleted_at": 1})));
    }

    #[test]
    fn test_like() {
        assert!(like("Johnson", "%son"));
        assert!(like("Wilson", "W_lson"));
        assert!(like("abc", "%"));
        assert!(like("abcabd", "%abd"));
        assert!(!like("Smith", "%son"));
        assert!(!like("abc", "ab"));
    }

    #[test]
    fn test_serialize_shape() {
        let filter = Filter::new()
            .exact("name", json!("John"))
            .op("age", FilterOperator::Gt, json!(18));
        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({"name": "John", "age": {"gt": 18}})
        );
    }
}
