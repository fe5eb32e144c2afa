//! Binary payloads
//!
//! Binary content travels inside the envelope as `binary64` (base64) or
//! `binary64gz` (base64 of gzip-compressed bytes). At most one of the two is
//! present per direction.

use std::io::{self, Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::errors::{ConventionError, ConventionResult};

pub const BINARY64: &str = "binary64";
pub const BINARY64GZ: &str = "binary64gz";

/// Default cap on decoded payload size (16 MiB)
pub const DEFAULT_MAX_DECODED_BYTES: u64 = 16 * 1024 * 1024;

/// Encoded binary payload, kept as the wire string until validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryPayload {
    /// `binary64`
    Base64(String),
    /// `binary64gz`
    GzipBase64(String),
}

impl BinaryPayload {
    /// Encode raw bytes as `binary64`
    pub fn from_bytes(bytes: &[u8]) -> Self {
        BinaryPayload::Base64(STANDARD.encode(bytes))
    }

    /// Compress and encode raw bytes as `binary64gz`
    pub fn from_bytes_gzip(bytes: &[u8]) -> ConventionResult<Self> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(bytes)
            .and_then(|_| encoder.finish())
            .map(|compressed| BinaryPayload::GzipBase64(STANDARD.encode(compressed)))
            .map_err(|e| ConventionError::InvalidBinaryEncoding {
                field: BINARY64GZ.to_string(),
                reason: format!("gzip compression failed: {}", e),
            })
    }

    /// Envelope key this payload is carried under
    pub fn key(&self) -> &'static str {
        match self {
            BinaryPayload::Base64(_) => BINARY64,
            BinaryPayload::GzipBase64(_) => BINARY64GZ,
        }
    }

    /// The encoded wire string
    pub fn encoded(&self) -> &str {
        match self {
            BinaryPayload::Base64(s) | BinaryPayload::GzipBase64(s) => s,
        }
    }

    /// Decode (and for `binary64gz`, decompress) the payload, capped at
    /// [`DEFAULT_MAX_DECODED_BYTES`].
    ///
    /// Fails with `InvalidBinaryEncoding` on bad base64, bad gzip, or output
    /// past the cap.
    pub fn validate_binary(&self) -> ConventionResult<Vec<u8>> {
        self.validate_binary_within(DEFAULT_MAX_DECODED_BYTES)
    }

    /// Like [`validate_binary`](Self::validate_binary) with an explicit cap
    pub fn validate_binary_within(&self, max_decoded_bytes: u64) -> ConventionResult<Vec<u8>> {
        let mut out = Vec::new();
        self.decode_into(max_decoded_bytes, &mut out)?;
        Ok(out)
    }

    /// Check the payload decodes within the cap without keeping the bytes.
    /// Returns the decoded length.
    pub fn check_within(&self, max_decoded_bytes: u64) -> ConventionResult<u64> {
        self.decode_into(max_decoded_bytes, &mut io::sink())
    }

    fn decode_into<W: Write>(&self, limit: u64, out: &mut W) -> ConventionResult<u64> {
        let decoded = STANDARD
            .decode(self.encoded())
            .map_err(|e| self.invalid(format!("invalid base64: {}", e)))?;

        let written = match self {
            BinaryPayload::Base64(_) => {
                if decoded.len() as u64 > limit {
                    return Err(self.too_large(limit));
                }
                out.write_all(&decoded)
                    .map_err(|e| self.invalid(format!("write failed: {}", e)))?;
                decoded.len() as u64
            }
            BinaryPayload::GzipBase64(_) => {
                // One byte past the cap is enough to know it is too large
                let mut reader = GzDecoder::new(decoded.as_slice()).take(limit.saturating_add(1));
                io::copy(&mut reader, out)
                    .map_err(|e| self.invalid(format!("invalid gzip: {}", e)))?
            }
        };

        if written > limit {
            return Err(self.too_large(limit));
        }
        Ok(written)
    }

    fn invalid(&self, reason: String) -> ConventionError {
        ConventionError::InvalidBinaryEncoding {
            field: self.key().to_string(),
            reason,
        }
    }

    fn too_large(&self, limit: u64) -> ConventionError {
        self.invalid(format!("decoded payload exceeds {} bytes", limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_payload() {
        let payload = BinaryPayload::from_bytes(b"hello");
        assert_eq!(payload.key(), "binary64");
        assert_eq!(payload.encoded(), "aGVsbG8=");
        assert_eq!(payload.validate_binary().unwrap(), b"hello");
    }

    #[test]
    fn test_gzip_payload() {
        let data = vec![7u8; 4096];
        let payload = BinaryPayload::from_bytes_gzip(&data).unwrap();
        assert_eq!(payload.key(), "binary64gz");
        assert!(payload.encoded().len() < 4096);
        assert_eq!(payload.validate_binary().unwrap(), data);
    }

    #[test]
    fn test_bad_base64() {
        let err = BinaryPayload::Base64("not base64!!".into())
            .validate_binary()
            .unwrap_err();
        assert!(matches!(
            err,
            ConventionError::InvalidBinaryEncoding { ref field, .. } if field == "binary64"
        ));
    }

    #[test]
    fn test_base64_but_not_gzip() {
        // Valid base64 of "hello", which is not a gzip stream
        let err = BinaryPayload::GzipBase64("aGVsbG8=".into())
            .validate_binary()
            .unwrap_err();
        match err {
            ConventionError::InvalidBinaryEncoding { field, reason } => {
                assert_eq!(field, "binary64gz");
                assert!(reason.contains("gzip"));
            }
            other => panic!("Expected InvalidBinaryEncoding, got {:?}", other),
        }
    }

    #[test]
    fn test_gzip_bomb_stops_at_cap() {
        // 8 MiB of zeros compresses to a few KiB
        let payload = BinaryPayload::from_bytes_gzip(&vec![0u8; 8 * 1024 * 1024]).unwrap();
        assert!(payload.encoded().len() < 64 * 1024);

        let err = payload.check_within(1024 * 1024).unwrap_err();
        match err {
            ConventionError::InvalidBinaryEncoding { field, reason } => {
                assert_eq!(field, "binary64gz");
                assert!(reason.contains("exceeds 1048576 bytes"));
            }
            other => panic!("Expected InvalidBinaryEncoding, got {:?}", other),
        }
        assert!(payload.validate_binary_within(1024 * 1024).is_err());
    }

    #[test]
    fn test_cap_is_inclusive() {
        let payload = BinaryPayload::from_bytes_gzip(&[1u8; 100]).unwrap();
        assert_eq!(payload.check_within(100).unwrap(), 100);
        assert!(payload.check_within(99).is_err());

        let plain = BinaryPayload::from_bytes(&[1u8; 100]);
        assert_eq!(plain.check_within(100).unwrap(), 100);
        assert!(plain.check_within(99).is_err());
    }
}
