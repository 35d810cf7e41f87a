//! Byte-oriented duplex serial channel
//!
//! Provides the non-blocking serial operations the transceiver needs and
//! an adapter for `embedded-io` streams.

use embedded_io::{Read, ReadReady, Write};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Duplex serial link to the display
///
/// Every method must return promptly: the transceiver calls them while
/// holding its serial-access lock.
pub trait SerialPort {
    /// Error type for link operations
    type Error;

    /// Whether at least one received byte is waiting to be read
    fn input_available(&mut self) -> Result<bool, Self::Error>;

    /// Read one received byte, or `None` if nothing is buffered
    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error>;

    /// Write all bytes to the link in order
    fn write_all(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Throw away everything in the receive buffer
    ///
    /// Returns the number of bytes discarded.
    fn discard_input(&mut self) -> Result<usize, Self::Error> {
        let mut discarded = 0;
        while self.read_byte()?.is_some() {
            discarded += 1;
        }
        Ok(discarded)
    }
}

/// [`SerialPort`] over a blocking `embedded-io` stream
///
/// Most HAL UART drivers (buffered or not) implement `Read`, `ReadReady`
/// and `Write`; wrapping one here is all a board needs to host a
/// transceiver.
pub struct IoSerial<T> {
    inner: T,
}

impl<T> IoSerial<T> {
    /// Wrap an `embedded-io` stream
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Borrow the wrapped stream
    pub fn inner(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Unwrap the stream
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> SerialPort for IoSerial<T>
where
    T: Read + ReadReady + Write,
{
    type Error = T::Error;

    fn input_available(&mut self) -> Result<bool, Self::Error> {
        self.inner.read_ready()
    }

    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        if !self.inner.read_ready()? {
            return Ok(None);
        }
        let mut buf = [0u8; 1];
        match self.inner.read(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.inner.write_all(data)?;
        self.inner.flush()
    }
}

/// Serial line configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SerialConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
}

impl Default for SerialConfig {
    fn default() -> Self {
        // DGUS panels ship configured for 115200 8N1
        Self {
            baudrate: 115_200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

/// Number of data bits per character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DataBits {
    Seven,
    Eight,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StopBits {
    One,
    Two,
}
