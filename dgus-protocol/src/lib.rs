//! DWIN DGUS display serial protocol
//!
//! This crate holds the pure, allocation-free half of the display link:
//! recognising frames in a raw byte stream, laying out outbound commands
//! and picking values back out of read responses. Everything that shares
//! the serial line between tasks lives in `dgus-link`.
//!
//! # Protocol Overview
//!
//! Every message uses the same binary frame:
//! ```text
//! ┌─────────┬────────┬────────┬─────────┬───────────────┐
//! │ MARKER  │ LENGTH │ OPCODE │ ADDRESS │ PAYLOAD       │
//! │ 5A A5   │ 1B     │ 1B     │ 2B (BE) │ LENGTH - 3 B  │
//! └─────────┴────────┴────────┴─────────┴───────────────┘
//! ```
//!
//! LENGTH counts everything after itself. There is no checksum, and the
//! splitter finds frame boundaries by searching for the marker, so the
//! length byte is informational unless [`Framing::Declared`] is chosen.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod color;
pub mod commands;
pub mod frame;
pub mod response;
pub mod target;

pub use color::Color;
pub use commands::{EncodeError, TextCommand, TextEncoding};
pub use frame::{
    split, split_frames, Chunk, FrameError, FrameView, Framing, Splitter, FRAME_MARKER,
    HEADER_LEN, MAX_FRAME_LEN, MIN_FRAME_LEN, OP_READ, OP_WRITE,
};
pub use response::{DecodeError, ReadResponse};
pub use target::{ElementKind, Target};
