//! Segment and segval header structs.

use std::io::{Cursor, Read, Result, Write};

use lattice_utils::serial::{ReadFrom, WriteTo};

/// Encoded size of a [`SegmentHeader`].
pub const SEGMENT_HEADER_SIZE: usize = 8;

/// Encoded size of a [`SegvalHeader`].
pub const SEGVAL_HEADER_SIZE: usize = 12;

/// Largest payload a single segval can carry (`payload_len` is a `u16`).
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// The operation a segment carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SegmentKind {
    /// Entities entering the receiver's view.
    Create = 0,
    /// Entities already in view, refreshed.
    Update = 1,
    /// Entities leaving the receiver's view.
    Remove = 2,
    /// Ownership grants addressed to the receiver.
    Owner = 3,
}

impl SegmentKind {
    /// Decodes a wire kind byte. `None` for kinds this version does not know.
    #[must_use]
    pub const fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Create),
            1 => Some(Self::Update),
            2 => Some(Self::Remove),
            3 => Some(Self::Owner),
            _ => None,
        }
    }
}

/// The 8-byte header in front of every segment.
///
/// ```text
/// u8  kind        u8  reserved (zero)
/// u16 amount      u32 value_bytes
/// ```
///
/// `value_bytes` counts every segval of the segment including their headers.
/// The kind is kept as the raw wire byte so a reader can account for
/// segments it does not understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Raw wire kind byte; see [`SegmentKind::from_u8`].
    pub kind: u8,
    /// Number of segvals in the segment.
    pub amount: u16,
    /// Total size of the segment body in bytes.
    pub value_bytes: u32,
}

impl SegmentHeader {
    /// Builds a header for a known segment kind.
    #[must_use]
    pub const fn new(kind: SegmentKind, amount: u16, value_bytes: u32) -> Self {
        Self {
            kind: kind as u8,
            amount,
            value_bytes,
        }
    }
}

impl WriteTo for SegmentHeader {
    fn write(&self, writer: &mut impl Write) -> Result<()> {
        self.kind.write(writer)?;
        0_u8.write(writer)?;
        self.amount.write(writer)?;
        self.value_bytes.write(writer)
    }
}

impl ReadFrom for SegmentHeader {
    fn read(data: &mut Cursor<&[u8]>) -> Result<Self> {
        let kind = u8::read(data)?;
        // Reserved byte; writers emit zero, readers do not care.
        let mut reserved = [0_u8; 1];
        data.read_exact(&mut reserved)?;
        let amount = u16::read(data)?;
        let value_bytes = u32::read(data)?;
        Ok(Self {
            kind,
            amount,
            value_bytes,
        })
    }
}

/// The 12-byte header in front of every segval.
///
/// ```text
/// u64 entity_id
/// u16 token       u16 payload_len
/// ```
///
/// `token` is the ownership generation on UPDATE (foreign) and OWNER
/// values, zero everywhere else. Exactly `payload_len` opaque bytes follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegvalHeader {
    /// The entity the value concerns.
    pub entity_id: u64,
    /// Ownership generation token, or zero.
    pub token: u16,
    /// Size of the opaque payload that follows.
    pub payload_len: u16,
}

impl WriteTo for SegvalHeader {
    fn write(&self, writer: &mut impl Write) -> Result<()> {
        self.entity_id.write(writer)?;
        self.token.write(writer)?;
        self.payload_len.write(writer)
    }
}

impl ReadFrom for SegvalHeader {
    fn read(data: &mut Cursor<&[u8]>) -> Result<Self> {
        Ok(Self {
            entity_id: u64::read(data)?,
            token: u16::read(data)?,
            payload_len: u16::read(data)?,
        })
    }
}
