//! Link timing configuration
//!
//! Timings are stored as plain milliseconds so the struct can be
//! deserialized from TOML or postcard without embassy-time types.

use embassy_time::Duration;

use dgus_protocol::Framing;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Polls of the receive line after each write
pub const DEFAULT_RESPONSE_POLLS: u8 = 30;
/// Delay between receive polls
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 1;
/// Blink half-period when none is given
pub const DEFAULT_BLINK_PERIOD_MS: u32 = 500;
/// How long element reads wait for their reply
pub const DEFAULT_READ_TIMEOUT_MS: u32 = 100;

/// Transceiver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LinkConfig {
    /// Receive polls after a write before giving up on a reply
    pub response_polls: u8,
    /// Delay between receive polls
    pub poll_interval_ms: u32,
    /// Default blink toggle period
    pub blink_period_ms: u32,
    /// Reply timeout for element reads
    pub read_timeout_ms: u32,
    /// How queued bytes are split into frames
    pub framing: Framing,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkConfig {
    pub const fn new() -> Self {
        Self {
            response_polls: DEFAULT_RESPONSE_POLLS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            blink_period_ms: DEFAULT_BLINK_PERIOD_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            framing: Framing::Marker,
        }
    }

    pub const fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    pub const fn with_response_polls(mut self, polls: u8) -> Self {
        self.response_polls = polls;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms as u64)
    }

    pub fn blink_period(&self) -> Duration {
        Duration::from_millis(self.blink_period_ms as u64)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms as u64)
    }

    /// Longest a write waits for a reply
    pub fn response_window(&self) -> Duration {
        Duration::from_millis(self.response_polls as u64 * self.poll_interval_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.response_polls, 30);
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
        assert_eq!(config.blink_period(), Duration::from_millis(500));
        assert_eq!(config.read_timeout(), Duration::from_millis(100));
        assert_eq!(config.response_window(), Duration::from_millis(30));
        assert_eq!(config.framing, Framing::Marker);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: LinkConfig = toml::from_str(
            r#"
            blink_period_ms = 250
            framing = "Declared"
            "#,
        )
        .unwrap();
        assert_eq!(config.blink_period_ms, 250);
        assert_eq!(config.framing, Framing::Declared);
        assert_eq!(config.response_polls, DEFAULT_RESPONSE_POLLS);
    }
}
