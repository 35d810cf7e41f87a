//! Frame boundary detection and header validation.
//!
//! Frame format:
//! - MARKER (2 bytes): 0x5A 0xA5
//! - LENGTH (1 byte): number of bytes that follow this one
//! - OPCODE (1 byte): 0x82 write, 0x83 read
//! - ADDRESS (2 bytes): big-endian VP/SP address
//! - PAYLOAD (LENGTH - 3 bytes): opcode-specific data
//!
//! Commands are queued as one flat byte stream, so the transmit side has to
//! find the frames again before writing them one exchange at a time. The
//! splitter never fails: bytes that cannot belong to a frame are reported as
//! [`Chunk::Discarded`] and the next marker starts over.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Frame start marker
pub const FRAME_MARKER: [u8; 2] = [0x5A, 0xA5];

/// Smallest byte count worth splitting (marker, length, opcode)
pub const MIN_FRAME_LEN: usize = 4;

/// Marker + length + opcode + address
pub const HEADER_LEN: usize = 6;

/// Largest frame the length byte can describe
pub const MAX_FRAME_LEN: usize = 3 + u8::MAX as usize;

/// Write variable memory
pub const OP_WRITE: u8 = 0x82;

/// Read variable memory
pub const OP_READ: u8 = 0x83;

/// Errors from validating a frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Fewer bytes than a complete header
    TooShort,
    /// First two bytes are not the frame marker
    BadMarker,
}

/// How the splitter decides where a frame ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Framing {
    /// A frame runs until the next marker or the end of the buffer.
    ///
    /// A payload that happens to contain `5A A5` is cut in two.
    #[default]
    Marker,
    /// Trust the length byte when the declared frame fits in the buffer,
    /// otherwise fall back to [`Framing::Marker`].
    Declared,
}

/// One piece of a split buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunk<'a> {
    /// Starts with the marker and is longer than the marker itself
    Frame(&'a [u8]),
    /// Leading garbage or a fragment too short to be a frame
    Discarded(&'a [u8]),
}

impl<'a> Chunk<'a> {
    /// The bytes covered by this chunk
    pub fn bytes(&self) -> &'a [u8] {
        match self {
            Chunk::Frame(bytes) | Chunk::Discarded(bytes) => bytes,
        }
    }
}

/// Iterator over the chunks of a buffer
///
/// Chunks are contiguous and cover the buffer exactly once, in order.
#[derive(Debug, Clone)]
pub struct Splitter<'a> {
    buf: &'a [u8],
    pos: usize,
    framing: Framing,
}

impl<'a> Splitter<'a> {
    /// Split `buf` using the given framing rule
    pub fn new(buf: &'a [u8], framing: Framing) -> Self {
        Self {
            buf,
            pos: 0,
            framing,
        }
    }

    /// Only the accepted frames
    pub fn frames(self) -> impl Iterator<Item = &'a [u8]> {
        self.filter_map(|chunk| match chunk {
            Chunk::Frame(bytes) => Some(bytes),
            Chunk::Discarded(_) => None,
        })
    }
}

impl<'a> Iterator for Splitter<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.buf.get(self.pos..).filter(|rest| !rest.is_empty())?;

        let len = match self.framing {
            Framing::Marker => next_marker(rest),
            Framing::Declared => declared_extent(rest).unwrap_or_else(|| next_marker(rest)),
        };

        let bytes = &rest[..len];
        self.pos += len;

        if is_frame(bytes) {
            Some(Chunk::Frame(bytes))
        } else {
            Some(Chunk::Discarded(bytes))
        }
    }
}

/// Split a buffer into frames and discarded fragments
pub fn split(buf: &[u8], framing: Framing) -> Splitter<'_> {
    Splitter::new(buf, framing)
}

/// Split a buffer and keep only the frames
pub fn split_frames(buf: &[u8], framing: Framing) -> impl Iterator<Item = &[u8]> {
    Splitter::new(buf, framing).frames()
}

/// Offset of the next marker after the first byte, or the whole length
fn next_marker(rest: &[u8]) -> usize {
    rest.windows(FRAME_MARKER.len())
        .skip(1)
        .position(|w| w == FRAME_MARKER)
        .map(|i| i + 1)
        .unwrap_or(rest.len())
}

/// Frame length from the length byte, if it fits in what is left
fn declared_extent(rest: &[u8]) -> Option<usize> {
    if !rest.starts_with(&FRAME_MARKER) {
        return None;
    }
    let end = 3 + *rest.get(2)? as usize;
    (end <= rest.len()).then_some(end)
}

fn is_frame(bytes: &[u8]) -> bool {
    bytes.len() > FRAME_MARKER.len() && bytes.starts_with(&FRAME_MARKER)
}

/// Read-only view of a frame with a validated header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameView<'a> {
    bytes: &'a [u8],
}

impl<'a> FrameView<'a> {
    /// Validate the marker and make sure the header is complete
    pub fn parse(bytes: &'a [u8]) -> Result<Self, FrameError> {
        if bytes.len() >= FRAME_MARKER.len() && !bytes.starts_with(&FRAME_MARKER) {
            return Err(FrameError::BadMarker);
        }
        if bytes.len() < HEADER_LEN {
            return Err(FrameError::TooShort);
        }
        Ok(Self { bytes })
    }

    /// The whole frame
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Value of the length byte
    pub fn declared_len(&self) -> u8 {
        self.bytes[2]
    }

    /// Command byte
    pub fn opcode(&self) -> u8 {
        self.bytes[3]
    }

    /// Target address
    pub fn address(&self) -> u16 {
        u16::from_be_bytes([self.bytes[4], self.bytes[5]])
    }

    /// Everything after the address
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[HEADER_LEN..]
    }

    /// Whether the length byte agrees with the captured byte count
    ///
    /// The transceiver never enforces this.
    pub fn is_length_consistent(&self) -> bool {
        self.declared_len() as usize == self.bytes.len() - 3
    }

    pub fn is_read(&self) -> bool {
        self.opcode() == OP_READ
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::vec::Vec;

    fn chunks(buf: &[u8], framing: Framing) -> Vec<Chunk<'_>> {
        split(buf, framing).collect()
    }

    #[test]
    fn test_split_back_to_back_frames() {
        let buf = [
            0x5A, 0xA5, 0x05, 0x82, 0x10, 0x00, 0x00, 0x2A, // write 42
            0x5A, 0xA5, 0x04, 0x83, 0x10, 0x00, 0x01, // read 1 word
        ];
        let frames: Vec<_> = split_frames(&buf, Framing::Marker).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], &buf[..8]);
        assert_eq!(frames[1], &buf[8..]);
    }

    #[test]
    fn test_split_discards_leading_garbage() {
        let buf = [0x00, 0xFF, 0x12, 0x5A, 0xA5, 0x04, 0x83, 0x00, 0x14, 0x01];
        let parts = chunks(&buf, Framing::Marker);
        assert_eq!(
            parts,
            [Chunk::Discarded(&buf[..3]), Chunk::Frame(&buf[3..])]
        );
    }

    #[test]
    fn test_split_discards_lone_marker() {
        let buf = [0x5A, 0xA5, 0x04, 0x83, 0x00, 0x14, 0x01, 0x5A, 0xA5];
        let parts = chunks(&buf, Framing::Marker);
        assert_eq!(
            parts,
            [Chunk::Frame(&buf[..7]), Chunk::Discarded(&buf[7..])]
        );
    }

    #[test]
    fn test_split_trailing_bytes_join_current_frame() {
        // Length byte says 4, but six bytes follow; the tail is kept
        let buf = [0x5A, 0xA5, 0x04, 0x82, 0x00, 0x82, 0x40, 0x01, 0x02];
        let frames: Vec<_> = split_frames(&buf, Framing::Marker).collect();
        assert_eq!(frames, [&buf[..]]);
    }

    #[test]
    fn test_split_single_byte_and_empty() {
        assert!(chunks(&[], Framing::Marker).is_empty());
        assert_eq!(chunks(&[0x5A], Framing::Marker), [Chunk::Discarded(&[0x5A][..])]);
    }

    #[test]
    fn test_marker_framing_cuts_marker_inside_payload() {
        // Restart command carries 5A A5 in its payload
        let restart = [0x5A, 0xA5, 0x07, 0x82, 0x00, 0x04, 0x55, 0xAA, 0x5A, 0xA5];
        let parts = chunks(&restart, Framing::Marker);
        assert_eq!(
            parts,
            [Chunk::Frame(&restart[..8]), Chunk::Discarded(&restart[8..])]
        );
    }

    #[test]
    fn test_declared_framing_keeps_marker_inside_payload() {
        let restart = [0x5A, 0xA5, 0x07, 0x82, 0x00, 0x04, 0x55, 0xAA, 0x5A, 0xA5];
        let mut buf = Vec::from(restart);
        buf.extend_from_slice(&[0x5A, 0xA5, 0x04, 0x83, 0x00, 0x14, 0x01]);

        let frames: Vec<_> = split_frames(&buf, Framing::Declared).collect();
        assert_eq!(frames, [&buf[..10], &buf[10..]]);
    }

    #[test]
    fn test_declared_framing_falls_back_when_length_overruns() {
        // Declared 0x20 bytes but the buffer ends first
        let buf = [0x5A, 0xA5, 0x20, 0x82, 0x00, 0x00, 0x5A, 0xA5, 0x03, 0x83, 0x00, 0x14];
        let frames: Vec<_> = split_frames(&buf, Framing::Declared).collect();
        assert_eq!(frames, [&buf[..6], &buf[6..]]);
    }

    #[test]
    fn test_declared_framing_discards_bytes_after_frame() {
        let buf = [0x5A, 0xA5, 0x03, 0x82, 0x00, 0x84, 0xEE, 0xEE];
        let parts = chunks(&buf, Framing::Declared);
        assert_eq!(
            parts,
            [Chunk::Frame(&buf[..6]), Chunk::Discarded(&buf[6..])]
        );
    }

    #[test]
    fn test_frame_view_fields() {
        let bytes = [0x5A, 0xA5, 0x06, 0x83, 0x10, 0x00, 0x01, 0x00, 0x2A];
        let view = FrameView::parse(&bytes).unwrap();
        assert_eq!(view.declared_len(), 6);
        assert_eq!(view.opcode(), OP_READ);
        assert!(view.is_read());
        assert_eq!(view.address(), 0x1000);
        assert_eq!(view.payload(), &[0x01, 0x00, 0x2A]);
        assert!(view.is_length_consistent());
    }

    #[test]
    fn test_frame_view_rejects_bad_headers() {
        assert_eq!(FrameView::parse(&[0x5A]), Err(FrameError::TooShort));
        assert_eq!(
            FrameView::parse(&[0x5A, 0xA5, 0x04, 0x83]),
            Err(FrameError::TooShort)
        );
        assert_eq!(
            FrameView::parse(&[0xA5, 0x5A, 0x04, 0x83, 0x00, 0x00, 0x01]),
            Err(FrameError::BadMarker)
        );
    }

    #[test]
    fn test_frame_view_reports_inconsistent_length() {
        let bytes = [0x5A, 0xA5, 0x08, 0x83, 0x10, 0x00, 0x00, 0x2A];
        let view = FrameView::parse(&bytes).unwrap();
        assert!(!view.is_length_consistent());
    }

    fn stream() -> impl Strategy<Value = Vec<u8>> {
        // Bias towards marker bytes so frames actually occur
        proptest::collection::vec(
            prop_oneof![Just(0x5Au8), Just(0xA5u8), any::<u8>()],
            0..128,
        )
    }

    fn any_framing() -> impl Strategy<Value = Framing> {
        prop_oneof![Just(Framing::Marker), Just(Framing::Declared)]
    }

    proptest! {
        #[test]
        fn prop_frames_start_with_marker(buf in stream(), framing in any_framing()) {
            for frame in split_frames(&buf, framing) {
                prop_assert!(frame.len() > 2);
                prop_assert_eq!(&frame[..2], &FRAME_MARKER[..]);
            }
        }

        #[test]
        fn prop_chunks_reproduce_input(buf in stream(), framing in any_framing()) {
            let mut joined = Vec::new();
            for chunk in split(&buf, framing) {
                prop_assert!(!chunk.bytes().is_empty());
                joined.extend_from_slice(chunk.bytes());
            }
            prop_assert_eq!(joined, buf);
        }

        #[test]
        fn prop_marker_frames_never_contain_inner_marker(buf in stream()) {
            for frame in split_frames(&buf, Framing::Marker) {
                let inner = frame[1..].windows(2).any(|w| w == FRAME_MARKER);
                prop_assert!(!inner);
            }
        }
    }
}
