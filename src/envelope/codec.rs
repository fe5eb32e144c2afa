//! Envelope codec
//!
//! Decoding validates the whole envelope in one pass and reports every
//! violation it finds, each with a dotted field path. Key order in encoded
//! output is not part of the contract.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{ConventionError, ConventionResult, FieldDetail};

use super::binary::{BinaryPayload, BINARY64, BINARY64GZ, DEFAULT_MAX_DECODED_BYTES};
use super::filter::Filter;
use super::request::{DataSection, RequestEnvelope, REQUEST_KEYS};
use super::response::{ErrorBody, Meta, ResponseEnvelope, RESPONSE_KEYS};

/// Codec options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecOptions {
    /// Decode binary payloads during envelope decoding instead of leaving it
    /// to handlers (default: true)
    #[serde(default = "default_eager_binary_validation")]
    pub eager_binary_validation: bool,

    /// Upper bound on a decoded (and decompressed) binary payload
    #[serde(default = "default_max_decoded_bytes")]
    pub max_decoded_bytes: u64,
}

fn default_eager_binary_validation() -> bool {
    true
}

fn default_max_decoded_bytes() -> u64 {
    DEFAULT_MAX_DECODED_BYTES
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            eager_binary_validation: default_eager_binary_validation(),
            max_decoded_bytes: default_max_decoded_bytes(),
        }
    }
}

/// Flat envelope codec
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeCodec {
    options: CodecOptions,
}

impl EnvelopeCodec {
    pub fn new(options: CodecOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> CodecOptions {
        self.options
    }

    /// Decode a request body
    pub fn decode_request(&self, raw: &[u8]) -> ConventionResult<RequestEnvelope> {
        let map = parse_object(raw)?;
        let mut violations = Vec::new();
        let mut envelope = RequestEnvelope::default();

        for (key, value) in &map {
            match key.as_str() {
                "filter" => match value {
                    Value::Object(entries) => {
                        envelope.filter = Some(Filter::parse(entries, &mut violations));
                    }
                    _ => violations.push(FieldDetail::new("filter", "must be an object")),
                },
                "data" => match value {
                    Value::Object(entries) => {
                        envelope.data = Some(DataSection::parse(entries, &mut violations));
                    }
                    _ => violations.push(FieldDetail::new("data", "must be an object")),
                },
                BINARY64 | BINARY64GZ => {}
                other => violations.push(unknown_key(other, &REQUEST_KEYS)),
            }
        }

        envelope.binary = parse_binary(&map, &mut violations);

        if !violations.is_empty() {
            return Err(ConventionError::MalformedEnvelope(violations));
        }
        self.check_binary(envelope.binary.as_ref())?;

        Ok(envelope)
    }

    /// Decode a response body
    pub fn decode_response(&self, raw: &[u8]) -> ConventionResult<ResponseEnvelope> {
        let map = parse_object(raw)?;
        let mut violations = Vec::new();

        for key in map.keys() {
            if !RESPONSE_KEYS.contains(&key.as_str()) {
                violations.push(unknown_key(key, &RESPONSE_KEYS));
            }
        }

        let meta = match map.get("meta") {
            Some(value) => Meta::parse(value, &mut violations),
            None => {
                violations.push(FieldDetail::new("meta", "is required"));
                None
            }
        };

        let error = match map.get("error") {
            None => None,
            Some(value) => match ErrorBody::deserialize(value) {
                Ok(body) => Some(body),
                Err(_) => {
                    violations.push(FieldDetail::new(
                        "error",
                        "must be an object with code and message",
                    ));
                    None
                }
            },
        };

        let binary = parse_binary(&map, &mut violations);

        let meta = match meta {
            Some(meta) if violations.is_empty() => meta,
            _ => return Err(ConventionError::MalformedEnvelope(violations)),
        };
        self.check_binary(binary.as_ref())?;

        Ok(ResponseEnvelope {
            meta,
            data: map.get("data").cloned(),
            error,
            binary,
        })
    }

    pub fn encode_request(&self, envelope: &RequestEnvelope) -> Vec<u8> {
        serde_json::to_vec(envelope).expect("RequestEnvelope serialization cannot fail")
    }

    pub fn encode_response(&self, envelope: &ResponseEnvelope) -> Vec<u8> {
        serde_json::to_vec(envelope).expect("ResponseEnvelope serialization cannot fail")
    }

    fn check_binary(&self, binary: Option<&BinaryPayload>) -> ConventionResult<()> {
        match binary {
            Some(payload) if self.options.eager_binary_validation => {
                payload.check_within(self.options.max_decoded_bytes).map(|_| ())
            }
            _ => Ok(()),
        }
    }
}

fn parse_object(raw: &[u8]) -> ConventionResult<Map<String, Value>> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| ConventionError::malformed("body", format!("invalid JSON: {}", e)))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ConventionError::malformed(
            "body",
            "top-level JSON must be an object",
        )),
    }
}

fn unknown_key(key: &str, reserved: &[&str]) -> FieldDetail {
    FieldDetail::new(
        key,
        format!("unknown top-level key; reserved keys are {}", reserved.join(", ")),
    )
}

/// Read `binary64` / `binary64gz`; at most one may be present
fn parse_binary(map: &Map<String, Value>, violations: &mut Vec<FieldDetail>) -> Option<BinaryPayload> {
    let plain = map.get(BINARY64);
    let gzip = map.get(BINARY64GZ);

    if plain.is_some() && gzip.is_some() {
        violations.push(FieldDetail::new(
            BINARY64GZ,
            "only one of binary64 and binary64gz may be present",
        ));
        return None;
    }

    let (key, value) = match (plain, gzip) {
        (Some(v), None) => (BINARY64, v),
        (None, Some(v)) => (BINARY64GZ, v),
        _ => return None,
    };

    let Some(encoded) = value.as_str() else {
        violations.push(FieldDetail::new(key, "must be a base64 string"));
        return None;
    };

    Some(if key == BINARY64 {
        BinaryPayload::Base64(encoded.to_string())
    } else {
        BinaryPayload::GzipBase64(encoded.to_string())
    })
}
