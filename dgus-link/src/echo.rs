//! Exchange records for observing traffic
//!
//! With echo enabled the transceiver publishes one [`Exchange`] per frame
//! it writes. Records go to a bounded channel; when nobody drains it the
//! newest records are dropped rather than stalling the link.

use core::fmt;

use heapless::Vec;

use dgus_protocol::MAX_FRAME_LEN;

use crate::transceiver::Response;

/// Records buffered before new ones are dropped
pub const ECHO_DEPTH: usize = 4;

/// One write and whatever the display sent back
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Exchange {
    /// Frame written to the display
    pub tx: Vec<u8, MAX_FRAME_LEN>,
    /// Bytes captured after the write (empty if the display was silent)
    pub rx: Response,
}

struct Hex<'a>(&'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TX {}\tRX {}", Hex(&self.tx), Hex(&self.rx))
    }
}
