//! Streaming decoder for the o5m binary OpenStreetMap format.
//!
//! The format is a sequence of length-prefixed records whose integer fields
//! are delta-encoded against running counters, with a back-reference table
//! for repeated strings. Reset markers clear all decoder state and double as
//! seek anchors for multi-pass consumption.

pub mod decoder;
pub mod strings;
pub mod varint;

#[cfg(test)]
pub(crate) mod testutil;

pub use decoder::{Checkpoint, O5mReader, RecordKind};
pub use strings::StringTable;

use thiserror::Error;

/// Decoder failures. All of these are fatal to the stream being read;
/// iteration stops at the first one.
#[derive(Debug, Error)]
pub enum O5mError {
    #[error("truncated input")]
    TruncatedInput,

    #[error("frame length mismatch: declared {declared}, consumed {consumed}")]
    FrameLengthMismatch { declared: u64, consumed: u64 },

    #[error("invalid o5m header: {0}")]
    InvalidHeader(String),

    #[error("unsupported dataset kind: {0:#04x}")]
    UnsupportedDataset(u8),

    #[error("invalid reference type: {0:?}")]
    InvalidReferenceType(String),

    #[error("string back-reference out of range: {0}")]
    BackrefOutOfRange(u64),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
