//! Element and panel handles
//!
//! Thin, copyable views over a [`Transceiver`]: an [`Element`] knows its
//! address pair and variable kind and turns method calls into queued
//! frames; a [`Panel`] covers the display-wide registers.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Timer};
use heapless::String;

use dgus_hal::SerialPort;
use dgus_protocol::{
    commands, Color, DecodeError, ElementKind, EncodeError, ReadResponse, Target, TextEncoding,
};

use crate::blink::BlinkError;
use crate::transceiver::{LinkError, Transceiver};

/// Time the display needs after a restart before it accepts commands
pub const RESTART_SETTLE: Duration = Duration::from_millis(100);

/// Errors from element operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ElementError {
    /// Operation does not apply to this element's kind
    WrongKind,
    Encode(EncodeError),
    Link(LinkError),
    Decode(DecodeError),
    Blink(BlinkError),
}

impl From<EncodeError> for ElementError {
    fn from(e: EncodeError) -> Self {
        ElementError::Encode(e)
    }
}

impl From<LinkError> for ElementError {
    fn from(e: LinkError) -> Self {
        ElementError::Link(e)
    }
}

impl From<DecodeError> for ElementError {
    fn from(e: DecodeError) -> Self {
        ElementError::Decode(e)
    }
}

impl From<BlinkError> for ElementError {
    fn from(e: BlinkError) -> Self {
        ElementError::Blink(e)
    }
}

/// One control on the display
pub struct Element<'a, M: RawMutex, P: SerialPort> {
    link: &'a Transceiver<M, P>,
    target: Target,
    kind: ElementKind,
}

impl<M: RawMutex, P: SerialPort> Clone for Element<'_, M, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: RawMutex, P: SerialPort> Copy for Element<'_, M, P> {}

impl<'a, M: RawMutex, P: SerialPort> Element<'a, M, P> {
    pub fn new(link: &'a Transceiver<M, P>, target: Target, kind: ElementKind) -> Self {
        Self { link, target, kind }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    fn require(&self, kinds: &[ElementKind]) -> Result<(), ElementError> {
        if kinds.contains(&self.kind) {
            Ok(())
        } else {
            Err(ElementError::WrongKind)
        }
    }

    fn text_encoding(&self) -> Result<TextEncoding, ElementError> {
        match self.kind {
            ElementKind::AsciiText => Ok(TextEncoding::Ascii),
            ElementKind::Utf16Text => Ok(TextEncoding::Utf16),
            _ => Err(ElementError::WrongKind),
        }
    }

    pub fn send_int(&self, value: i16) -> Result<(), ElementError> {
        self.require(&[ElementKind::Int])?;
        self.link.enqueue(&commands::write_i16(self.target.vp, value));
        Ok(())
    }

    pub fn send_float(&self, value: f64) -> Result<(), ElementError> {
        self.require(&[ElementKind::Float])?;
        self.link.enqueue(&commands::write_f64(self.target.vp, value));
        Ok(())
    }

    /// Replace the element's text
    pub fn send_text(&self, text: &str) -> Result<(), ElementError> {
        let encoding = self.text_encoding()?;
        let cmd = commands::write_text(self.target.vp, text, encoding)?;
        self.link.enqueue(&cmd);
        Ok(())
    }

    /// Blank the first `chars` characters
    pub fn clear_text(&self, chars: u8) -> Result<(), ElementError> {
        let encoding = self.text_encoding()?;
        let cmd = commands::clear_text(self.target.vp, chars, encoding)?;
        self.link.enqueue(&cmd);
        Ok(())
    }

    pub fn set_icon(&self, index: u16) -> Result<(), ElementError> {
        self.require(&[ElementKind::Icon])?;
        self.link.enqueue(&commands::set_icon(self.target.vp, index));
        Ok(())
    }

    pub fn set_color(&self, color: Color) {
        self.link.enqueue(&commands::set_color(self.target, color));
    }

    pub fn set_position(&self, x: u16, y: u16) {
        self.link.enqueue(&commands::set_position(self.target, x, y));
    }

    pub fn show(&self) {
        self.link.enqueue(&commands::show(self.target));
    }

    pub fn hide(&self) {
        self.link.enqueue(&commands::hide(self.target));
    }

    /// Blink with the link's default period
    pub fn blink(&self) -> Result<(), ElementError> {
        Ok(self.link.start_blink_default(self.target)?)
    }

    pub fn blink_every(&self, period: Duration) -> Result<(), ElementError> {
        Ok(self.link.start_blink(self.target, period)?)
    }

    pub fn set_blink_period(&self, period: Duration) -> bool {
        self.link.set_blink_period(self.target, period)
    }

    pub fn is_blinking(&self) -> bool {
        self.link.is_blinking(self.target)
    }

    /// Stop blinking and leave the element visible
    pub async fn stop_blink(&self) {
        self.link.stop_blink(self.target).await;
    }

    pub async fn read_int(&self) -> Result<i16, ElementError> {
        self.require(&[ElementKind::Int])?;
        let raw = self.read_value(1).await?;
        Ok(ReadResponse::for_address(&raw, self.target.vp)?.as_i16()?)
    }

    pub async fn read_float(&self) -> Result<f64, ElementError> {
        self.require(&[ElementKind::Float])?;
        let raw = self.read_value(4).await?;
        Ok(ReadResponse::for_address(&raw, self.target.vp)?.as_f64()?)
    }

    pub async fn read_icon(&self) -> Result<u16, ElementError> {
        self.require(&[ElementKind::Icon])?;
        let raw = self.read_value(1).await?;
        Ok(ReadResponse::for_address(&raw, self.target.vp)?.as_u16()?)
    }

    /// Read up to `max_words` words of text
    ///
    /// An ASCII element stores two characters per word, a UTF-16 element
    /// one.
    pub async fn read_text<const N: usize>(&self, max_words: u8) -> Result<String<N>, ElementError> {
        let encoding = self.text_encoding()?;
        let raw = self.read_value(max_words).await?;
        let response = ReadResponse::for_address(&raw, self.target.vp)?;
        let text = match encoding {
            TextEncoding::Ascii => response.ascii_text()?,
            TextEncoding::Utf16 => response.utf16_text()?,
        };
        Ok(text)
    }

    async fn read_value(&self, words: u8) -> Result<crate::Response, LinkError> {
        let timeout = self.link.config().read_timeout();
        self.link
            .read(&commands::read_words(self.target.vp, words), timeout)
            .await
    }
}

/// Display-wide registers
pub struct Panel<'a, M: RawMutex, P: SerialPort> {
    link: &'a Transceiver<M, P>,
}

impl<M: RawMutex, P: SerialPort> Clone for Panel<'_, M, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: RawMutex, P: SerialPort> Copy for Panel<'_, M, P> {}

impl<'a, M: RawMutex, P: SerialPort> Panel<'a, M, P> {
    pub fn new(link: &'a Transceiver<M, P>) -> Self {
        Self { link }
    }

    /// Handle for one element on this display
    pub fn element(&self, target: Target, kind: ElementKind) -> Element<'a, M, P> {
        Element::new(self.link, target, kind)
    }

    pub fn set_page(&self, page: u8) {
        self.link.enqueue(&commands::set_page(page));
    }

    /// Page currently shown
    pub async fn page(&self) -> Result<u8, ElementError> {
        self.read_register(commands::PAGE_ID_ADDR, commands::read_page())
            .await
    }

    /// Backlight level, clamped to 0..=127
    pub fn set_brightness(&self, level: u8) {
        self.link.enqueue(&commands::set_brightness(level));
    }

    pub async fn brightness(&self) -> Result<u8, ElementError> {
        self.read_register(commands::BRIGHTNESS_ADDR, commands::read_brightness())
            .await
    }

    /// Reboot the display and wait for it to come back
    ///
    /// The payload contains the frame marker, so only
    /// [`Framing::Declared`](dgus_protocol::Framing::Declared) delivers it
    /// in one piece.
    pub async fn restart(&self) {
        self.link.enqueue(&commands::restart());
        Timer::after(RESTART_SETTLE).await;
    }

    async fn read_register(&self, address: u16, frame: [u8; 7]) -> Result<u8, ElementError> {
        let raw = self.link.read(&frame, self.link.config().read_timeout()).await?;
        Ok(ReadResponse::for_address(&raw, address)?.low_byte()?)
    }
}
