//! Outbound command encoders
//!
//! Pure byte-layout helpers: each returns a complete frame ready to be
//! queued on the link. Fixed-size commands come back as arrays, text
//! commands as a bounded vector.

use heapless::Vec;

use crate::color::Color;
use crate::frame::{FRAME_MARKER, MAX_FRAME_LEN, OP_READ, OP_WRITE};
use crate::target::Target;

/// Page switch register (write `5A 01 00 page`)
pub const PAGE_SWITCH_ADDR: u16 = 0x0084;
/// Current page register
pub const PAGE_ID_ADDR: u16 = 0x0014;
/// Backlight level register (write)
pub const BRIGHTNESS_SET_ADDR: u16 = 0x0082;
/// Backlight level register (read back)
pub const BRIGHTNESS_ADDR: u16 = 0x0031;
/// System reset register
pub const RESET_ADDR: u16 = 0x0004;

/// Highest backlight level accepted
pub const MAX_BRIGHTNESS: u8 = 127;

/// Written to an SP to hide its element
pub const HIDDEN: u16 = 0xFFFF;

/// Terminates text written to a VP
pub const TEXT_TERMINATOR: [u8; 2] = [0xFF, 0xFF];

/// Variable-length command buffer
pub type TextCommand = Vec<u8, MAX_FRAME_LEN>;

/// Errors from building a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// Text does not fit in one frame
    TextTooLong,
    /// Single-byte text element given non-ASCII characters
    NotAscii,
}

/// How text elements store characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TextEncoding {
    Ascii,
    Utf16,
}

const fn write_word(address: u16, value: u16) -> [u8; 8] {
    let [addr_hi, addr_lo] = address.to_be_bytes();
    let [hi, lo] = value.to_be_bytes();
    [FRAME_MARKER[0], FRAME_MARKER[1], 0x05, OP_WRITE, addr_hi, addr_lo, hi, lo]
}

/// Write a 16-bit value to a VP
pub const fn write_u16(vp: u16, value: u16) -> [u8; 8] {
    write_word(vp, value)
}

/// Write a signed 16-bit value to a VP
pub const fn write_i16(vp: u16, value: i16) -> [u8; 8] {
    write_word(vp, value as u16)
}

/// Write a double to a 4-word VP
pub fn write_f64(vp: u16, value: f64) -> [u8; 14] {
    let [addr_hi, addr_lo] = vp.to_be_bytes();
    let mut cmd = [0u8; 14];
    cmd[..6].copy_from_slice(&[FRAME_MARKER[0], FRAME_MARKER[1], 0x0B, OP_WRITE, addr_hi, addr_lo]);
    cmd[6..].copy_from_slice(&value.to_be_bytes());
    cmd
}

/// Select the frame shown by a variable icon
pub const fn set_icon(vp: u16, index: u16) -> [u8; 8] {
    write_word(vp, index)
}

/// Change an element's colour
pub const fn set_color(target: Target, color: Color) -> [u8; 8] {
    write_word(target.color_address(), color.rgb565())
}

/// Move an element
pub const fn set_position(target: Target, x: u16, y: u16) -> [u8; 10] {
    let [addr_hi, addr_lo] = target.position_address().to_be_bytes();
    let [x_hi, x_lo] = x.to_be_bytes();
    let [y_hi, y_lo] = y.to_be_bytes();
    [
        FRAME_MARKER[0], FRAME_MARKER[1], 0x07, OP_WRITE, addr_hi, addr_lo, x_hi, x_lo, y_hi, y_lo,
    ]
}

/// Make an element visible by pointing its SP back at its VP
pub const fn show(target: Target) -> [u8; 8] {
    write_word(target.sp, target.vp)
}

/// Hide an element
pub const fn hide(target: Target) -> [u8; 8] {
    write_word(target.sp, HIDDEN)
}

pub const fn visibility(target: Target, visible: bool) -> [u8; 8] {
    if visible {
        show(target)
    } else {
        hide(target)
    }
}

/// Read `words` 16-bit words starting at `address`
pub const fn read_words(address: u16, words: u8) -> [u8; 7] {
    let [addr_hi, addr_lo] = address.to_be_bytes();
    [FRAME_MARKER[0], FRAME_MARKER[1], 0x04, OP_READ, addr_hi, addr_lo, words]
}

/// Switch to another page
pub const fn set_page(page: u8) -> [u8; 10] {
    let [addr_hi, addr_lo] = PAGE_SWITCH_ADDR.to_be_bytes();
    [
        FRAME_MARKER[0], FRAME_MARKER[1], 0x07, OP_WRITE, addr_hi, addr_lo, 0x5A, 0x01, 0x00, page,
    ]
}

pub const fn read_page() -> [u8; 7] {
    read_words(PAGE_ID_ADDR, 1)
}

/// Set the backlight level, clamped to [`MAX_BRIGHTNESS`]
pub const fn set_brightness(level: u8) -> [u8; 7] {
    let level = if level > MAX_BRIGHTNESS {
        MAX_BRIGHTNESS
    } else {
        level
    };
    let [addr_hi, addr_lo] = BRIGHTNESS_SET_ADDR.to_be_bytes();
    [FRAME_MARKER[0], FRAME_MARKER[1], 0x04, OP_WRITE, addr_hi, addr_lo, level]
}

pub const fn read_brightness() -> [u8; 7] {
    read_words(BRIGHTNESS_ADDR, 1)
}

/// Reboot the display
///
/// The payload ends in `5A A5`, which marker framing splits off.
pub const fn restart() -> [u8; 10] {
    let [addr_hi, addr_lo] = RESET_ADDR.to_be_bytes();
    [
        FRAME_MARKER[0], FRAME_MARKER[1], 0x07, OP_WRITE, addr_hi, addr_lo, 0x55, 0xAA, 0x5A, 0xA5,
    ]
}

/// Start a write frame whose body will be `body_len` bytes
fn write_header(address: u16, body_len: usize) -> Result<TextCommand, EncodeError> {
    let declared = u8::try_from(body_len + 3).map_err(|_| EncodeError::TextTooLong)?;
    let [addr_hi, addr_lo] = address.to_be_bytes();

    let mut cmd = TextCommand::new();
    cmd.extend_from_slice(&[FRAME_MARKER[0], FRAME_MARKER[1], declared, OP_WRITE, addr_hi, addr_lo])
        .map_err(|_| EncodeError::TextTooLong)?;
    Ok(cmd)
}

/// Write text to a VP, terminated with `FF FF`
pub fn write_text(vp: u16, text: &str, encoding: TextEncoding) -> Result<TextCommand, EncodeError> {
    let mut cmd = match encoding {
        TextEncoding::Ascii => {
            if !text.is_ascii() {
                return Err(EncodeError::NotAscii);
            }
            let mut cmd = write_header(vp, text.len() + TEXT_TERMINATOR.len())?;
            cmd.extend_from_slice(text.as_bytes())
                .map_err(|_| EncodeError::TextTooLong)?;
            cmd
        }
        TextEncoding::Utf16 => {
            let units = text.encode_utf16().count();
            let mut cmd = write_header(vp, units * 2 + TEXT_TERMINATOR.len())?;
            for unit in text.encode_utf16() {
                cmd.extend_from_slice(&unit.to_be_bytes())
                    .map_err(|_| EncodeError::TextTooLong)?;
            }
            cmd
        }
    };
    cmd.extend_from_slice(&TEXT_TERMINATOR)
        .map_err(|_| EncodeError::TextTooLong)?;
    Ok(cmd)
}

/// Overwrite a text VP with `chars` blank characters
///
/// Each character occupies two bytes in both encodings.
pub fn clear_text(vp: u16, chars: u8, encoding: TextEncoding) -> Result<TextCommand, EncodeError> {
    let mut cmd = write_header(vp, chars as usize * 2)?;
    let blank: [u8; 2] = match encoding {
        TextEncoding::Ascii => [b' ', b' '],
        TextEncoding::Utf16 => [0x00, b' '],
    };
    for _ in 0..chars {
        cmd.extend_from_slice(&blank)
            .map_err(|_| EncodeError::TextTooLong)?;
    }
    Ok(cmd)
}
