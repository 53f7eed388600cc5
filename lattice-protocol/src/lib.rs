//! The replication wire format.
//!
//! A replication buffer is a concatenation of *segments*. Each segment is a
//! typed block of entity operations: an 8-byte header followed by `amount`
//! *segvals*, each a 12-byte header plus an opaque payload. Everything is
//! little-endian and packed.
//!
//! This crate owns the byte-level concerns only: [`SegmentWriter`] assembles
//! segments into a caller-provided buffer with clean truncation and
//! shortfall accounting, and [`SegmentReader`] walks a received buffer,
//! refusing to yield a single value from a segment whose framing does not
//! check out. What the operations *mean* is the world crate's business.

pub mod error;
pub mod reader;
pub mod segment;
pub mod writer;

pub use error::ReadError;
pub use reader::Segment;
pub use reader::SegmentReader;
pub use reader::Segval;
pub use segment::MAX_PAYLOAD_LEN;
pub use segment::SEGMENT_HEADER_SIZE;
pub use segment::SEGVAL_HEADER_SIZE;
pub use segment::SegmentHeader;
pub use segment::SegmentKind;
pub use segment::SegvalHeader;
pub use writer::SegmentWriter;
