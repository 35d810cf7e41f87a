//! Hardware abstraction for the serial link to a DGUS display
//!
//! The transceiver in `dgus-link` never touches a UART peripheral directly.
//! It talks to anything implementing [`SerialPort`], which keeps the same
//! queueing and framing code usable on an ESP32, an RP2040, or a host
//! test harness with a simulated display.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  dgus-link (transceiver, blink, gate)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  dgus-hal (this crate - SerialPort)     │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │   IoSerial    │       │  board UART   │
//! │ (embedded-io) │       │  driver impl  │
//! └───────────────┘       └───────────────┘
//! ```

#![no_std]
#![deny(unsafe_code)]

pub mod serial;

pub use serial::{DataBits, IoSerial, Parity, SerialConfig, SerialPort, StopBits};
