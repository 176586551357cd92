//! Record codec error types.

use thiserror::Error;

use crate::layout::{MAX_PATH_LEN, RECORD_SIZE};

/// Errors from decoding or encoding file entry records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Buffer length is not a whole number of records.
    #[error(
        "malformed stream: {len} bytes is not a multiple of the {size}-byte record size",
        size = RECORD_SIZE
    )]
    PartialRecord { len: usize },

    /// Path does not fit the fixed field.
    #[error("path is {len} bytes, at most {max} fit in a record", max = MAX_PATH_LEN)]
    PathTooLong { len: usize },

    /// Path holds a character that has no single-byte form.
    #[error("path character {ch:?} has no single-byte encoding")]
    PathNotSingleByte { ch: char },

    /// Path holds an embedded terminator.
    #[error("path contains a NUL byte")]
    PathContainsNul,

    /// A value is wider than its bitfield.
    #[error("{field} = {value} does not fit in {bits} bits")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        bits: u32,
    },
}

impl CodecError {
    /// True for the errors a received stream can produce.
    pub fn is_malformed_stream(&self) -> bool {
        matches!(self, Self::PartialRecord { .. })
    }
}

/// Codec result type.
pub type CodecResult<T> = Result<T, CodecError>;
