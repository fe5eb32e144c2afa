//! # Envelope Codec
//!
//! Serializes and deserializes the flat request/response JSON envelope.
//!
//! Request keys: `filter`, `data`, `binary64`, `binary64gz`.
//! Response keys: `meta`, `data`, `error`, `binary64`, `binary64gz`.
//!
//! Nothing else may appear at the top level, and `filter`/`data` allow at most
//! one documented level of nesting (criteria objects, `set`). Deeper structure
//! is expressed with dotted keys such as `"person.child.name"`.

mod binary;
mod codec;
mod filter;
mod request;
mod response;

pub use binary::{BinaryPayload, BINARY64, BINARY64GZ, DEFAULT_MAX_DECODED_BYTES};
pub use codec::{CodecOptions, EnvelopeCodec};
pub use filter::{lookup, Criterion, Filter, FilterExpr, FilterOperator};
pub use request::{DataSection, RequestEnvelope, REQUEST_KEYS};
pub use response::{ErrorBody, Meta, PageCounts, Pagination, ResponseEnvelope, RESPONSE_KEYS};
