//! Fragment planning and range math.
//!
//! Splits a resource of known (or unknown) size into contiguous half-open
//! spans and renders them as inclusive HTTP `Range` values.

mod range;

pub use range::{plan_fragments, FragmentSpan};
