//! Error types for the Weft runtime.
//!
//! The tracking protocol itself never fails. Errors only surface from the raw
//! data model: a write that does not fit the shape of the target, such as a
//! fractional array length or a named key on an array, or an array that
//! cannot allocate room to grow. Snapshots fail on cycles.

use thiserror::Error;

use crate::value::Key;

/// Errors produced by target operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// An array length was set to something other than a whole number in
    /// `0..=MAX_ARRAY_LENGTH`.
    #[error("invalid array length: {0}")]
    InvalidLength(String),

    /// Growing an array to this length failed to allocate.
    #[error("cannot grow array to {0} elements")]
    CapacityExceeded(usize),

    /// The key cannot be stored on this kind of target.
    #[error("key `{key}` is not supported on an array target")]
    UnsupportedKey { key: Key },

    /// A JSON snapshot reached a target that is already being serialized.
    #[error("cannot snapshot a cyclic structure")]
    Cycle,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
