//! Element addressing
//!
//! A DGUS control is described by two addresses: the SP (description
//! pointer) block that holds its visual properties, and the VP (variable
//! pointer) that holds its value.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Address pair identifying one element on the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Target {
    /// Description pointer (visibility, colour, position)
    pub sp: u16,
    /// Variable pointer (value)
    pub vp: u16,
}

impl Target {
    pub const fn new(sp: u16, vp: u16) -> Self {
        Self { sp, vp }
    }

    /// SP offset holding the element's X/Y position
    pub const fn position_address(&self) -> u16 {
        self.sp.wrapping_add(1)
    }

    /// SP offset holding the element's colour
    pub const fn color_address(&self) -> u16 {
        self.sp.wrapping_add(3)
    }
}

/// Kind of variable an element displays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ElementKind {
    /// 16-bit integer variable
    Int,
    /// 64-bit floating point variable
    Float,
    /// UTF-16BE text variable
    Utf16Text,
    /// Single-byte text variable
    AsciiText,
    /// Variable icon index
    Icon,
}

impl ElementKind {
    /// Words requested when reading a numeric value
    pub const fn read_words(&self) -> Option<u8> {
        match self {
            ElementKind::Int | ElementKind::Icon => Some(1),
            ElementKind::Float => Some(4),
            ElementKind::Utf16Text | ElementKind::AsciiText => None,
        }
    }

    pub const fn is_text(&self) -> bool {
        matches!(self, ElementKind::Utf16Text | ElementKind::AsciiText)
    }
}
