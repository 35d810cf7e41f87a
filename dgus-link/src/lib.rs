//! Shared serial link to a DWIN DGUS display
//!
//! Many tasks drive one display over one UART. This crate serializes their
//! traffic and routes read replies back to the task that asked.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  enqueue   ┌──────────────┐  drain   ┌─────────────────┐
//! │ Elements ├───────────►│ CommandQueue ├─────────►│ Transceiver::run│
//! │ / Panel  │            └──────────────┘          └───────┬─────────┘
//! └────▲─────┘                                              │ write / read
//!      │ query reply / await_response               ┌───────▼────────┐
//!      └────────────────────────────────────────────┤   SerialPort   │
//!                                                   └───────▲────────┘
//!                        ┌────────────────────────┐         │
//!                        │ Transceiver::run_blink ├─────────┘
//!                        └────────────────────────┘  show / hide
//! ```
//!
//! Both tasks take the serial-access lock for one write or one read at a
//! time. Blink toggles skip the command queue so a backlog never delays
//! them.
//!
//! # Usage
//!
//! ```ignore
//! static LINK: StaticCell<Transceiver<CriticalSectionRawMutex, IoSerial<Uart>>> = StaticCell::new();
//!
//! let link = LINK.init(Transceiver::new(IoSerial::new(uart), LinkConfig::default()));
//! spawner.spawn(link_task(link)).unwrap();
//! spawner.spawn(blink_task(link)).unwrap();
//!
//! let panel = Panel::new(link);
//! let speed = panel.element(Target::new(0x9000, 0x1000), ElementKind::Int);
//! speed.send_int(120)?;
//! ```

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

// Must come first so the logging macros are visible to later modules
#[macro_use]
mod fmt;

pub mod blink;
pub mod config;
pub mod echo;
pub mod element;
pub mod query;
pub mod queue;
pub mod transceiver;

#[cfg(test)]
mod mock;

pub use blink::{BlinkError, MAX_BLINK_TARGETS};
pub use config::LinkConfig;
pub use echo::{Exchange, ECHO_DEPTH};
pub use element::{Element, ElementError, Panel};
pub use query::{PendingQuery, MAX_PENDING_QUERIES};
pub use queue::{CommandQueue, QueueError, QUEUE_CAPACITY};
pub use transceiver::{LinkError, Response, Transceiver, RESPONSE_CAPACITY};

pub use dgus_hal::{IoSerial, SerialConfig, SerialPort};
pub use dgus_protocol::{Color, ElementKind, Framing, Target};
