//! # Meta Builder
//!
//! Computes the `meta` block (code, message, time, pagination, details) for
//! every response.
//!
//! - `time` is UTC milliseconds since the epoch and never decreases across
//!   calls on the same builder.
//! - `total` and `page_total` are present together or not at all.
//! - Success codes are 200/201. Error codes are any other three-digit value;
//!   see [`MetaCode`] for how they map onto the transport status.

mod builder;
mod clock;
mod code;

pub use builder::MetaBuilder;
pub use clock::{Clock, ManualClock, MonotonicClock, SystemClock};
pub use code::MetaCode;

pub use crate::envelope::{Meta, PageCounts, Pagination};
pub use crate::errors::FieldDetail;
