//! Bounded segment assembly into a caller-provided buffer.

use lattice_utils::serial::WriteTo;

use crate::segment::{
    MAX_PAYLOAD_LEN, SEGMENT_HEADER_SIZE, SEGVAL_HEADER_SIZE, SegmentHeader, SegmentKind,
    SegvalHeader,
};

/// Assembles segments into a fixed buffer, one at a time.
///
/// The writer never emits a half value: a value either fits entirely
/// (header plus payload) or is *withheld*, in which case its full encoded
/// size is added to the shortfall so the caller knows how many extra bytes
/// a retry would need. A closed segment whose values were all withheld is
/// rolled back to nothing; its header is not left dangling in the output.
///
/// Payload bytes are written in place: [`SegmentWriter::payload_slice`]
/// loans out the region directly behind the next value header, and
/// [`SegmentWriter::commit`] seals the header in front of whatever was
/// produced there.
pub struct SegmentWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
    shortfall: usize,
    segment: Option<OpenSegment>,
}

struct OpenSegment {
    kind: SegmentKind,
    header_pos: usize,
    amount: u16,
    value_bytes: u32,
    withheld: usize,
    /// Whether the 8 header bytes fit the buffer at all.
    fits: bool,
}

impl<'a> SegmentWriter<'a> {
    /// Starts writing at the beginning of `buf`.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            shortfall: 0,
            segment: None,
        }
    }

    /// Opens a segment of the given kind.
    ///
    /// Only one segment can be open at a time; the previous one must be
    /// closed first.
    pub fn open(&mut self, kind: SegmentKind) {
        debug_assert!(self.segment.is_none(), "segment already open");
        let header_pos = self.pos;
        let fits = header_pos + SEGMENT_HEADER_SIZE <= self.buf.len();
        if fits {
            self.pos += SEGMENT_HEADER_SIZE;
        }
        self.segment = Some(OpenSegment {
            kind,
            header_pos,
            amount: 0,
            value_bytes: 0,
            withheld: 0,
            fits,
        });
    }

    /// The region a payload producer may write into for the next value.
    ///
    /// Empty when not even a value header would fit anymore; producers can
    /// still report the size they would have needed via
    /// [`SegmentWriter::commit`].
    pub fn payload_slice(&mut self) -> &mut [u8] {
        match &self.segment {
            Some(seg) if seg.fits && self.pos + SEGVAL_HEADER_SIZE <= self.buf.len() => {
                &mut self.buf[self.pos + SEGVAL_HEADER_SIZE..]
            }
            _ => &mut [],
        }
    }

    /// Seals the next value with `payload_len` bytes already produced into
    /// the payload slice.
    ///
    /// Returns `true` if the value was emitted. Returns `false` if it did
    /// not fit, in which case its encoded size has been added to the
    /// shortfall and the output is unchanged.
    pub fn commit(&mut self, entity_id: u64, token: u16, payload_len: usize) -> bool {
        debug_assert!(payload_len <= MAX_PAYLOAD_LEN, "payload exceeds u16 range");
        let seg = self.segment.as_mut().expect("no open segment");
        let needed = SEGVAL_HEADER_SIZE + payload_len;
        if !seg.fits || self.pos + needed > self.buf.len() || seg.amount == u16::MAX {
            seg.withheld += 1;
            self.shortfall += needed;
            return false;
        }

        let header = SegvalHeader {
            entity_id,
            token,
            payload_len: payload_len as u16,
        };
        let mut slice = &mut self.buf[self.pos..self.pos + SEGVAL_HEADER_SIZE];
        header.write(&mut slice).expect("segval header fits");
        self.pos += needed;
        seg.amount += 1;
        seg.value_bytes += needed as u32;
        true
    }

    /// Closes the open segment, sealing its header.
    ///
    /// A segment that emitted no values is rolled back entirely; if values
    /// were withheld from it, the header bytes a retry would need are added
    /// to the shortfall.
    pub fn close(&mut self) {
        let Some(seg) = self.segment.take() else {
            return;
        };
        if seg.amount == 0 {
            self.pos = seg.header_pos;
            if seg.withheld > 0 {
                self.shortfall += SEGMENT_HEADER_SIZE;
            }
            return;
        }
        if seg.withheld > 0 {
            log::trace!(
                "{:?} segment truncated, {} value(s) withheld",
                seg.kind,
                seg.withheld
            );
        }
        let header = SegmentHeader::new(seg.kind, seg.amount, seg.value_bytes);
        let mut slice = &mut self.buf[seg.header_pos..seg.header_pos + SEGMENT_HEADER_SIZE];
        header.write(&mut slice).expect("segment header fits");
    }

    /// Bytes emitted so far.
    #[must_use]
    pub fn written(&self) -> usize {
        self.pos
    }

    /// Closes any open segment and returns `(written, shortfall)`.
    #[must_use]
    pub fn finish(mut self) -> (usize, usize) {
        self.close();
        (self.pos, self.shortfall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_segment() {
        let mut buf = [0_u8; 64];
        let mut writer = SegmentWriter::new(&mut buf);

        writer.open(SegmentKind::Create);
        writer.payload_slice()[..2].copy_from_slice(&[0xAA, 0xBB]);
        assert!(writer.commit(5, 0, 2));
        assert!(writer.commit(6, 0x0102, 0));
        writer.close();

        let (written, shortfall) = writer.finish();
        assert_eq!(shortfall, 0);
        assert_eq!(written, 8 + 14 + 12);
        // Header: kind 0, reserved, amount 2, value_bytes 26.
        assert_eq!(&buf[..8], &[0, 0, 2, 0, 26, 0, 0, 0]);
        // First value: id 5, token 0, payload_len 2, payload AA BB.
        assert_eq!(&buf[8..22], &[5, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0xAA, 0xBB]);
        // Second value: id 6, token 0x0102, payload_len 0.
        assert_eq!(&buf[22..34], &[6, 0, 0, 0, 0, 0, 0, 0, 0x02, 0x01, 0, 0]);
    }

    #[test]
    fn empty_segment_is_rolled_back() {
        let mut buf = [0xFF_u8; 32];
        let mut writer = SegmentWriter::new(&mut buf);
        writer.open(SegmentKind::Remove);
        writer.close();
        let (written, shortfall) = writer.finish();
        assert_eq!(written, 0);
        assert_eq!(shortfall, 0);
    }

    #[test]
    fn withheld_values_accrue_shortfall() {
        // Room for the header and one small value only.
        let mut buf = [0_u8; 8 + 12 + 4];
        let mut writer = SegmentWriter::new(&mut buf);

        writer.open(SegmentKind::Update);
        assert!(writer.commit(1, 0, 4));
        assert!(!writer.commit(2, 0, 100));
        assert!(!writer.commit(3, 0, 0));
        writer.close();

        let (written, shortfall) = writer.finish();
        assert_eq!(written, 24);
        assert_eq!(shortfall, (12 + 100) + 12);
    }

    #[test]
    fn fully_withheld_segment_charges_its_header() {
        let mut buf = [0_u8; 4];
        let mut writer = SegmentWriter::new(&mut buf);

        writer.open(SegmentKind::Create);
        assert!(writer.payload_slice().is_empty());
        assert!(!writer.commit(1, 0, 50));
        writer.close();

        let (written, shortfall) = writer.finish();
        assert_eq!(written, 0);
        assert_eq!(shortfall, 8 + 12 + 50);
    }

    #[test]
    fn payload_slice_is_empty_without_room_for_a_value_header() {
        let mut buf = [0_u8; 8 + 6];
        let mut writer = SegmentWriter::new(&mut buf);
        writer.open(SegmentKind::Create);
        assert!(writer.payload_slice().is_empty());
    }
}
