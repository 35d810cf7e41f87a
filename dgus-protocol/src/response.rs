//! Read response decoding
//!
//! A read reply echoes the request header and appends the data:
//! ```text
//! 5A A5 | LEN | 83 | VP_HI VP_LO | WORDS | DATA ...
//!   0 1    2     3     4     5       6      7 ..
//! ```
//! Nothing in a reply identifies the request it answers, so callers check
//! the echoed VP against the element they asked about.

use core::char::{decode_utf16, REPLACEMENT_CHARACTER};

use heapless::String;

use crate::commands::TEXT_TERMINATOR;
use crate::frame::{FrameError, FrameView, HEADER_LEN};

/// First data byte of a read reply
const DATA_OFFSET: usize = HEADER_LEN + 1;

/// Errors from decoding a read reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Header did not validate
    Frame(FrameError),
    /// Opcode is not 0x83
    NotAReadResponse,
    /// Reply is for a different VP than the caller's
    AddressMismatch { expected: u16, found: u16 },
    /// Reply ends before the requested value
    Truncated,
    /// Decoded text does not fit the destination
    Overflow,
}

impl From<FrameError> for DecodeError {
    fn from(e: FrameError) -> Self {
        DecodeError::Frame(e)
    }
}

/// A validated read reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadResponse<'a> {
    frame: FrameView<'a>,
}

impl<'a> ReadResponse<'a> {
    /// Validate the header and opcode
    pub fn parse(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        let frame = FrameView::parse(bytes)?;
        if !frame.is_read() {
            return Err(DecodeError::NotAReadResponse);
        }
        Ok(Self { frame })
    }

    /// Parse and require the reply to echo `vp`
    pub fn for_address(bytes: &'a [u8], vp: u16) -> Result<Self, DecodeError> {
        let response = Self::parse(bytes)?;
        response.expect_address(vp)?;
        Ok(response)
    }

    pub fn frame(&self) -> FrameView<'a> {
        self.frame
    }

    /// VP echoed by the display
    pub fn address(&self) -> u16 {
        self.frame.address()
    }

    pub fn expect_address(&self, vp: u16) -> Result<(), DecodeError> {
        let found = self.address();
        if found != vp {
            return Err(DecodeError::AddressMismatch {
                expected: vp,
                found,
            });
        }
        Ok(())
    }

    /// Number of words the display returned
    pub fn word_count(&self) -> Option<u8> {
        self.frame.payload().first().copied()
    }

    fn data(&self) -> &'a [u8] {
        self.frame.bytes().get(DATA_OFFSET..).unwrap_or(&[])
    }

    /// First data word
    pub fn as_u16(&self) -> Result<u16, DecodeError> {
        match self.data() {
            [hi, lo, ..] => Ok(u16::from_be_bytes([*hi, *lo])),
            _ => Err(DecodeError::Truncated),
        }
    }

    pub fn as_i16(&self) -> Result<i16, DecodeError> {
        self.as_u16().map(|raw| raw as i16)
    }

    /// Low byte of the first data word (page number, backlight level)
    pub fn low_byte(&self) -> Result<u8, DecodeError> {
        self.data().get(1).copied().ok_or(DecodeError::Truncated)
    }

    /// Double stored in the last eight bytes of the reply
    pub fn as_f64(&self) -> Result<f64, DecodeError> {
        let data = self.data();
        if data.len() < 8 {
            return Err(DecodeError::Truncated);
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&data[data.len() - 8..]);
        Ok(f64::from_be_bytes(raw))
    }

    /// Single-byte text up to the `FF FF` terminator
    pub fn ascii_text<const N: usize>(&self) -> Result<String<N>, DecodeError> {
        let data = self.data();
        let end = data
            .windows(TEXT_TERMINATOR.len())
            .position(|w| w == TEXT_TERMINATOR)
            .unwrap_or(data.len());

        let mut text = String::new();
        for &byte in &data[..end] {
            text.push(byte as char).map_err(|_| DecodeError::Overflow)?;
        }
        Ok(text)
    }

    /// UTF-16BE text up to the `FF FF` terminator
    ///
    /// Unpaired surrogates become U+FFFD.
    pub fn utf16_text<const N: usize>(&self) -> Result<String<N>, DecodeError> {
        let units = self
            .data()
            .chunks_exact(2)
            .take_while(|pair| *pair != TEXT_TERMINATOR)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));

        let mut text = String::new();
        for c in decode_utf16(units) {
            text.push(c.unwrap_or(REPLACEMENT_CHARACTER))
                .map_err(|_| DecodeError::Overflow)?;
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::OP_READ;

    #[test]
    fn test_decode_u16_value() {
        let bytes = [0x5A, 0xA5, 0x06, OP_READ, 0x10, 0x00, 0x01, 0x00, 0x2A];
        let response = ReadResponse::for_address(&bytes, 0x1000).unwrap();
        assert_eq!(response.word_count(), Some(1));
        assert_eq!(response.as_u16(), Ok(42));
        assert_eq!(response.low_byte(), Ok(42));
    }

    #[test]
    fn test_decode_negative_i16() {
        let bytes = [0x5A, 0xA5, 0x06, OP_READ, 0x10, 0x00, 0x01, 0xFF, 0xFE];
        let response = ReadResponse::parse(&bytes).unwrap();
        assert_eq!(response.as_i16(), Ok(-2));
    }

    #[test]
    fn test_address_mismatch() {
        let bytes = [0x5A, 0xA5, 0x06, OP_READ, 0x20, 0x00, 0x01, 0x00, 0x2A];
        assert_eq!(
            ReadResponse::for_address(&bytes, 0x1000),
            Err(DecodeError::AddressMismatch {
                expected: 0x1000,
                found: 0x2000
            })
        );
    }

    #[test]
    fn test_write_echo_is_not_a_read_response() {
        // Display acknowledges writes with 5A A5 03 82 4F 4B ("OK")
        let bytes = [0x5A, 0xA5, 0x03, 0x82, 0x4F, 0x4B];
        assert_eq!(
            ReadResponse::parse(&bytes),
            Err(DecodeError::NotAReadResponse)
        );
    }

    #[test]
    fn test_truncated_value() {
        // One byte short of a value
        let bytes = [0x5A, 0xA5, 0x08, OP_READ, 0x10, 0x00, 0x00, 0x2A];
        let response = ReadResponse::parse(&bytes).unwrap();
        assert_eq!(response.as_u16(), Err(DecodeError::Truncated));
        assert_eq!(response.as_f64(), Err(DecodeError::Truncated));
    }

    #[test]
    fn test_decode_f64() {
        let mut bytes = [0u8; 15];
        bytes[..7].copy_from_slice(&[0x5A, 0xA5, 0x0C, OP_READ, 0x20, 0x00, 0x04]);
        bytes[7..].copy_from_slice(&(-12.25f64).to_be_bytes());
        let response = ReadResponse::parse(&bytes).unwrap();
        assert_eq!(response.as_f64(), Ok(-12.25));
    }

    #[test]
    fn test_decode_ascii_text() {
        let bytes = [
            0x5A, 0xA5, 0x0A, OP_READ, 0x30, 0x00, 0x02, b'O', b'k', 0xFF, 0xFF, b'?', b'?',
        ];
        let response = ReadResponse::parse(&bytes).unwrap();
        let text: String<8> = response.ascii_text().unwrap();
        assert_eq!(text.as_str(), "Ok");
    }

    #[test]
    fn test_decode_utf16_text() {
        let bytes = [
            0x5A, 0xA5, 0x0C, OP_READ, 0x30, 0x00, 0x03, 0x04, 0x16, 0x00, b'a', 0xFF, 0xFF, 0x00,
        ];
        let response = ReadResponse::parse(&bytes).unwrap();
        let text: String<8> = response.utf16_text().unwrap();
        assert_eq!(text.as_str(), "Жa");
    }

    #[test]
    fn test_text_overflow() {
        let bytes = [0x5A, 0xA5, 0x08, OP_READ, 0x30, 0x00, 0x02, b'a', b'b', b'c'];
        let response = ReadResponse::parse(&bytes).unwrap();
        assert_eq!(response.ascii_text::<2>(), Err(DecodeError::Overflow));
    }
}
