//! Validated traversal of a received buffer.

use std::io::Cursor;

use lattice_utils::serial::ReadFrom;

use crate::error::ReadError;
use crate::segment::{
    SEGMENT_HEADER_SIZE, SEGVAL_HEADER_SIZE, SegmentHeader, SegmentKind, SegvalHeader,
};

/// Walks the segments of a received buffer.
///
/// A segment's framing is validated in full before any of its values is
/// handed out, so a caller that dispatches side effects per value never has
/// to unwind them: by the time iteration starts, the segment is known to be
/// well-formed. Segments with an unknown kind byte but self-consistent
/// framing are skipped and counted into the residual.
pub struct SegmentReader<'a> {
    buf: &'a [u8],
    pos: usize,
    residual: usize,
}

impl<'a> SegmentReader<'a> {
    /// Starts reading at the beginning of `buf`.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            residual: 0,
        }
    }

    /// Advances to the next known segment, or `None` at the end.
    pub fn next_segment(&mut self) -> Result<Option<Segment<'a>>, ReadError> {
        let buf = self.buf;
        loop {
            let remaining = buf.len() - self.pos;
            if remaining == 0 {
                return Ok(None);
            }
            if remaining < SEGMENT_HEADER_SIZE {
                return Err(ReadError::TrailingBytes { remaining });
            }

            let mut cur = Cursor::new(&buf[self.pos..self.pos + SEGMENT_HEADER_SIZE]);
            let header = SegmentHeader::read(&mut cur).expect("header bounds checked");
            let declared = header.value_bytes as usize;
            let available = remaining - SEGMENT_HEADER_SIZE;
            if declared > available {
                return Err(ReadError::SegmentOverrun {
                    declared,
                    available,
                });
            }

            let body_start = self.pos + SEGMENT_HEADER_SIZE;
            let body = &buf[body_start..body_start + declared];
            self.pos = body_start + declared;

            let Some(kind) = SegmentKind::from_u8(header.kind) else {
                log::trace!("skipping unknown segment kind {}", header.kind);
                self.residual += SEGMENT_HEADER_SIZE + declared;
                continue;
            };

            validate_body(header.amount, body)?;
            return Ok(Some(Segment {
                kind,
                amount: header.amount,
                body,
            }));
        }
    }

    /// Bytes seen but not handed out as segments (unknown kinds).
    #[must_use]
    pub fn residual(&self) -> usize {
        self.residual
    }
}

/// Checks that `amount` values tile `body` exactly.
fn validate_body(amount: u16, body: &[u8]) -> Result<(), ReadError> {
    let declared = body.len();
    if amount as usize * SEGVAL_HEADER_SIZE > declared {
        return Err(ReadError::ValueOverrun { amount, declared });
    }
    let mut off = 0_usize;
    for _ in 0..amount {
        if off + SEGVAL_HEADER_SIZE > declared {
            return Err(ReadError::PayloadOverrun {
                overrun: off + SEGVAL_HEADER_SIZE - declared,
            });
        }
        let payload_len =
            u16::from_le_bytes([body[off + 10], body[off + 11]]) as usize;
        let end = off + SEGVAL_HEADER_SIZE + payload_len;
        if end > declared {
            return Err(ReadError::PayloadOverrun {
                overrun: end - declared,
            });
        }
        off = end;
    }
    if off != declared {
        return Err(ReadError::SizeMismatch {
            declared,
            actual: off,
        });
    }
    Ok(())
}

/// A validated segment: a kind plus its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    /// The operation this segment carries.
    pub kind: SegmentKind,
    amount: u16,
    body: &'a [u8],
}

impl<'a> Segment<'a> {
    /// Number of values in the segment.
    #[must_use]
    pub fn amount(&self) -> u16 {
        self.amount
    }

    /// Iterates the segment's values.
    #[must_use]
    pub fn values(&self) -> SegvalIter<'a> {
        SegvalIter {
            body: self.body,
            off: 0,
            left: self.amount,
        }
    }
}

/// One entity's entry within a segment.
#[derive(Debug, Clone, Copy)]
pub struct Segval<'a> {
    /// The entity the value concerns, as the raw wire id.
    pub entity_id: u64,
    /// Ownership generation token, or zero.
    pub token: u16,
    /// The opaque payload bytes.
    pub payload: &'a [u8],
}

/// Iterator over a validated segment's values.
#[derive(Debug)]
pub struct SegvalIter<'a> {
    body: &'a [u8],
    off: usize,
    left: u16,
}

impl<'a> Iterator for SegvalIter<'a> {
    type Item = Segval<'a>;

    fn next(&mut self) -> Option<Segval<'a>> {
        if self.left == 0 {
            return None;
        }
        self.left -= 1;

        let mut cur = Cursor::new(&self.body[self.off..self.off + SEGVAL_HEADER_SIZE]);
        let header = SegvalHeader::read(&mut cur).expect("body validated");
        let start = self.off + SEGVAL_HEADER_SIZE;
        let end = start + header.payload_len as usize;
        self.off = end;
        Some(Segval {
            entity_id: header.entity_id,
            token: header.token,
            payload: &self.body[start..end],
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.left as usize, Some(self.left as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::SegmentWriter;

    fn two_segment_buffer() -> Vec<u8> {
        let mut buf = vec![0_u8; 256];
        let mut writer = SegmentWriter::new(&mut buf);
        writer.open(SegmentKind::Create);
        writer.payload_slice()[..3].copy_from_slice(b"abc");
        assert!(writer.commit(10, 0, 3));
        assert!(writer.commit(11, 0, 0));
        writer.close();
        writer.open(SegmentKind::Owner);
        assert!(writer.commit(10, 0x1234, 0));
        writer.close();
        let (written, shortfall) = writer.finish();
        assert_eq!(shortfall, 0);
        buf.truncate(written);
        buf
    }

    #[test]
    fn reads_back_what_the_writer_wrote() {
        let buf = two_segment_buffer();
        let mut reader = SegmentReader::new(&buf);

        let segment = reader.next_segment().unwrap().unwrap();
        assert_eq!(segment.kind, SegmentKind::Create);
        assert_eq!(segment.amount(), 2);
        let values: Vec<_> = segment.values().collect();
        assert_eq!(values[0].entity_id, 10);
        assert_eq!(values[0].payload, b"abc");
        assert_eq!(values[1].entity_id, 11);
        assert!(values[1].payload.is_empty());

        let segment = reader.next_segment().unwrap().unwrap();
        assert_eq!(segment.kind, SegmentKind::Owner);
        let values: Vec<_> = segment.values().collect();
        assert_eq!(values[0].token, 0x1234);

        assert!(reader.next_segment().unwrap().is_none());
        assert_eq!(reader.residual(), 0);
    }

    #[test]
    fn rejects_overrunning_segment() {
        // Declares a 1000-byte body with only 50 bytes behind the header.
        let mut buf = vec![0_u8; SEGMENT_HEADER_SIZE + 50];
        buf[0] = 0;
        buf[4..8].copy_from_slice(&1000_u32.to_le_bytes());

        let mut reader = SegmentReader::new(&buf);
        assert_eq!(
            reader.next_segment(),
            Err(ReadError::SegmentOverrun {
                declared: 1000,
                available: 50
            })
        );
    }

    #[test]
    fn rejects_value_headers_exceeding_body() {
        let mut buf = vec![0_u8; SEGMENT_HEADER_SIZE + 12];
        buf[2..4].copy_from_slice(&4_u16.to_le_bytes());
        buf[4..8].copy_from_slice(&12_u32.to_le_bytes());

        let mut reader = SegmentReader::new(&buf);
        assert!(matches!(
            reader.next_segment(),
            Err(ReadError::ValueOverrun { amount: 4, .. })
        ));
    }

    #[test]
    fn rejects_size_mismatch() {
        // One zero-payload value inside a body declared 4 bytes too large.
        let mut buf = vec![0_u8; SEGMENT_HEADER_SIZE + 16];
        buf[2..4].copy_from_slice(&1_u16.to_le_bytes());
        buf[4..8].copy_from_slice(&16_u32.to_le_bytes());

        let mut reader = SegmentReader::new(&buf);
        assert_eq!(
            reader.next_segment(),
            Err(ReadError::SizeMismatch {
                declared: 16,
                actual: 12
            })
        );
    }

    #[test]
    fn rejects_payload_overrun() {
        // One value whose payload_len runs past the declared body.
        let mut buf = vec![0_u8; SEGMENT_HEADER_SIZE + 12];
        buf[2..4].copy_from_slice(&1_u16.to_le_bytes());
        buf[4..8].copy_from_slice(&12_u32.to_le_bytes());
        buf[8 + 10..8 + 12].copy_from_slice(&7_u16.to_le_bytes());

        let mut reader = SegmentReader::new(&buf);
        assert_eq!(
            reader.next_segment(),
            Err(ReadError::PayloadOverrun { overrun: 7 })
        );
    }

    #[test]
    fn rejects_trailing_garbage() {
        let mut buf = two_segment_buffer();
        buf.extend_from_slice(&[1, 2, 3]);

        let mut reader = SegmentReader::new(&buf);
        assert!(reader.next_segment().unwrap().is_some());
        assert!(reader.next_segment().unwrap().is_some());
        assert_eq!(
            reader.next_segment(),
            Err(ReadError::TrailingBytes { remaining: 3 })
        );
    }

    #[test]
    fn skips_unknown_kind_into_residual() {
        // An unknown segment sandwiched before a known one.
        let mut buf = Vec::new();
        buf.push(9_u8); // unknown kind
        buf.push(0);
        buf.extend_from_slice(&0_u16.to_le_bytes());
        buf.extend_from_slice(&4_u32.to_le_bytes());
        buf.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let known = two_segment_buffer();
        buf.extend_from_slice(&known);

        let mut reader = SegmentReader::new(&buf);
        let segment = reader.next_segment().unwrap().unwrap();
        assert_eq!(segment.kind, SegmentKind::Create);
        assert!(reader.next_segment().unwrap().is_some());
        assert!(reader.next_segment().unwrap().is_none());
        assert_eq!(reader.residual(), 12);
    }
}
