//! Named RGB565 colours accepted by text and numeric elements

/// Preset colours for [`crate::commands::set_color`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Color {
    Red,
    Blue,
    Green,
    Orange,
    Purple,
    Turquoise,
    Brown,
    Pink,
    DarkGreen,
    YellowGreen,
    RoseRed,
    DeepPurple,
    SkyBlue,
    Gray,
    Black,
    DarkBlue,
    White,
    /// Any other RGB565 value
    Rgb565(u16),
}

impl Color {
    /// RGB565 encoding sent to the display
    pub const fn rgb565(self) -> u16 {
        match self {
            Color::Red => 0xF800,
            Color::Blue => 0x001F,
            Color::Green => 0x07E0,
            Color::Orange => 0xFC00,
            Color::Purple => 0x801F,
            Color::Turquoise => 0x07FF,
            Color::Brown => 0x4000,
            Color::Pink => 0xFC1F,
            Color::DarkGreen => 0x0208,
            Color::YellowGreen => 0x8400,
            Color::RoseRed => 0xF810,
            Color::DeepPurple => 0x4010,
            Color::SkyBlue => 0x041F,
            Color::Gray => 0x8410,
            Color::Black => 0x0000,
            Color::DarkBlue => 0x0010,
            Color::White => 0xFFFF,
            Color::Rgb565(raw) => raw,
        }
    }
}

impl From<u16> for Color {
    fn from(raw: u16) -> Self {
        Color::Rgb565(raw)
    }
}
