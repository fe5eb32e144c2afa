//! Envelope Convention Tests
//!
//! Covers the flat envelope rules end to end through the public codec:
//! - Only reserved top-level keys
//! - At most one documented nesting level inside `filter` / `data`
//! - At most one binary payload, validated as base64 (and gzip)
//! - Response meta keeps pagination counts together

use flatapi::envelope::{
    lookup, BinaryPayload, CodecOptions, DataSection, EnvelopeCodec, Filter, FilterOperator,
    RequestEnvelope,
};
use flatapi::errors::ConventionError;
use serde_json::{json, Value};

// =============================================================================
// Test Utilities
// =============================================================================

fn eager() -> EnvelopeCodec {
    EnvelopeCodec::new(CodecOptions::default())
}

fn lazy() -> EnvelopeCodec {
    EnvelopeCodec::new(CodecOptions {
        eager_binary_validation: false,
        ..CodecOptions::default()
    })
}

fn malformed_fields(err: ConventionError) -> Vec<String> {
    match err {
        ConventionError::MalformedEnvelope(details) => {
            details.into_iter().map(|d| d.field).collect()
        }
        other => panic!("expected MalformedEnvelope, got {:?}", other),
    }
}

// =============================================================================
// Flatness
// =============================================================================

#[test]
fn test_nested_object_in_data_is_malformed() {
    let raw = br#"{"filter":{"name":"John"},"data":{"nested":{"a":1}}}"#;
    let fields = malformed_fields(eager().decode_request(raw).unwrap_err());
    assert_eq!(fields, vec!["data.nested"]);
}

#[test]
fn test_dotted_keys_are_the_workaround() {
    let raw = br#"{"filter":{"person.child.name":"Ann"},"data":{"person.child.age":7}}"#;
    let envelope = eager().decode_request(raw).unwrap();

    let filter = envelope.filter.unwrap();
    let record = json!({"person": {"child": {"name": "Ann"}}});
    assert!(filter.matches(&record));
    assert_eq!(
        lookup(&record, "person.child.name"),
        Some(&Value::String("Ann".into()))
    );

    let data = envelope.data.unwrap();
    assert_eq!(data.fields["person.child.age"], json!(7));
}

#[test]
fn test_every_violation_is_reported() {
    let raw = br#"{
        "filter": {"a": {"b": {"c": 1}}},
        "data": {"x": {"y": 1}, "set": {"z": {"w": 1}}},
        "extra": true
    }"#;
    let mut fields = malformed_fields(eager().decode_request(raw).unwrap_err());
    fields.sort();
    assert_eq!(fields, vec!["data.set.z", "data.x", "extra", "filter.a.b"]);
}

#[test]
fn test_top_level_must_be_an_object() {
    for raw in ["[]", "42", "\"envelope\"", "null"] {
        assert!(matches!(
            eager().decode_request(raw.as_bytes()),
            Err(ConventionError::MalformedEnvelope(_))
        ));
    }
}

#[test]
fn test_filter_operators_decode() {
    let raw = br#"{"filter":{"age":{"gte":18,"lt":65},"status":{"in":["a","b"]}}}"#;
    let filter = eager().decode_request(raw).unwrap().filter.unwrap();
    assert_eq!(filter.len(), 2);
    assert!(filter.matches(&json!({"age": 30, "status": "a"})));
    assert!(!filter.matches(&json!({"age": 70, "status": "a"})));
}

#[test]
fn test_partial_update_data() {
    let raw = br#"{"data":{"set":{"profile.city":"Oslo"},"unset":["nickname"]}}"#;
    let data = eager().decode_request(raw).unwrap().data.unwrap();
    assert!(data.is_partial_update());
    assert_eq!(data.unset.as_deref(), Some(&["nickname".to_string()][..]));
}

// =============================================================================
// Binary payloads
// =============================================================================

#[test]
fn test_both_binaries_rejected() {
    let raw = br#"{"binary64":"aGk=","binary64gz":"aGk="}"#;
    assert!(matches!(
        lazy().decode_request(raw),
        Err(ConventionError::MalformedEnvelope(_))
    ));
}

#[test]
fn test_invalid_base64_eager_vs_lazy() {
    let raw = br#"{"binary64":"not base64!"}"#;
    assert!(matches!(
        eager().decode_request(raw),
        Err(ConventionError::InvalidBinaryEncoding { .. })
    ));

    let envelope = lazy().decode_request(raw).unwrap();
    let binary = envelope.binary.unwrap();
    assert!(matches!(
        binary.validate_binary(),
        Err(ConventionError::InvalidBinaryEncoding { .. })
    ));
}

#[test]
fn test_base64_that_is_not_gzip() {
    // "hello" in plain base64 under the gz key
    let raw = br#"{"binary64gz":"aGVsbG8="}"#;
    assert!(matches!(
        eager().decode_request(raw),
        Err(ConventionError::InvalidBinaryEncoding { .. })
    ));
}

#[test]
fn test_gzip_payload_round_trip() {
    let payload = BinaryPayload::from_bytes_gzip(b"file contents").unwrap();
    let envelope = RequestEnvelope::new().with_binary(payload);

    let codec = eager();
    let bytes = codec.encode_request(&envelope);
    let decoded = codec.decode_request(&bytes).unwrap();
    assert_eq!(
        decoded.binary.unwrap().validate_binary().unwrap(),
        b"file contents"
    );
}

#[test]
fn test_compressible_payload_is_capped() {
    // 32 MiB of zeros: a few tens of KiB on the wire
    let payload = BinaryPayload::from_bytes_gzip(&vec![0u8; 32 * 1024 * 1024]).unwrap();
    let raw = serde_json::to_vec(&json!({ "binary64gz": payload.encoded() })).unwrap();
    assert!(raw.len() < 256 * 1024);

    let err = eager().decode_request(&raw).unwrap_err();
    assert_eq!(err.code(), "INVALID_BINARY_ENCODING");
    assert_eq!(err.meta_code(), 400);

    // Deferred validation applies the same cap
    let deferred = lazy().decode_request(&raw).unwrap().binary.unwrap();
    assert!(deferred.validate_binary().is_err());
}

// =============================================================================
// Encoding
// =============================================================================

#[test]
fn test_encoded_request_stays_flat() {
    let envelope = RequestEnvelope::new()
        .with_filter(
            Filter::new()
                .exact("name", json!("John"))
                .op("age", FilterOperator::Gte, json!(18)),
        )
        .with_data(DataSection::new().field("status", json!("active")));

    let value: Value = serde_json::from_slice(&eager().encode_request(&envelope)).unwrap();
    assert_eq!(value["filter"]["name"], "John");
    assert_eq!(value["filter"]["age"]["gte"], 18);
    assert_eq!(value["data"]["status"], "active");
    assert_eq!(value.as_object().unwrap().len(), 2);
}

// =============================================================================
// Response meta
// =============================================================================

#[test]
fn test_response_with_total_but_no_page_total_is_malformed() {
    let raw = br#"{"meta":{"code":200,"message":"OK","time":1,"page":1,"page_size":10,"total":5}}"#;
    let fields = malformed_fields(eager().decode_response(raw).unwrap_err());
    assert!(fields.iter().any(|f| f.starts_with("meta.")));
}

#[test]
fn test_response_with_counts_decodes() {
    let raw = br#"{
        "meta":{"code":200,"message":"OK","time":1734432019759,"page":2,"page_size":10,"total":25,"page_total":3},
        "data":[{"id":11}]
    }"#;
    let envelope = eager().decode_response(raw).unwrap();
    let pagination = envelope.meta.pagination.unwrap();
    assert_eq!(pagination.total(), Some(25));
    assert_eq!(pagination.page_total(), Some(3));
    assert_eq!(pagination.offset(), 10);
}

#[test]
fn test_response_requires_meta() {
    let fields = malformed_fields(eager().decode_response(br#"{"data":[]}"#).unwrap_err());
    assert_eq!(fields, vec!["meta"]);
}
