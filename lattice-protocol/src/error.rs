use thiserror::Error;

/// A framing violation in a received buffer.
///
/// Any of these aborts parsing; per-entity semantic failures are not
/// errors at this layer, they surface as events from the world's reader.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// Trailing bytes too short to hold a segment header.
    #[error("{remaining} trailing byte(s) cannot form a segment header")]
    TrailingBytes {
        /// Bytes left over after the last complete segment.
        remaining: usize,
    },
    /// A segment declared more body bytes than the buffer holds.
    #[error("segment body of {declared} byte(s) exceeds the {available} available")]
    SegmentOverrun {
        /// The segment header's `value_bytes`.
        declared: usize,
        /// Bytes remaining after the segment header.
        available: usize,
    },
    /// A segment's value headers alone exceed its declared body.
    #[error("{amount} value header(s) exceed the declared segment body of {declared} byte(s)")]
    ValueOverrun {
        /// The segment header's `amount`.
        amount: u16,
        /// The segment header's `value_bytes`.
        declared: usize,
    },
    /// A value's payload ran past the end of its segment's body.
    #[error("value payload ran {overrun} byte(s) past the segment body")]
    PayloadOverrun {
        /// How far past the declared body the payload reached.
        overrun: usize,
    },
    /// The values of a segment did not add up to its declared body size.
    #[error("segment declared {declared} body byte(s) but its values total {actual}")]
    SizeMismatch {
        /// The segment header's `value_bytes`.
        declared: usize,
        /// The byte count actually consumed by the values.
        actual: usize,
    },
}
