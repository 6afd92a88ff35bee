use std::time::Duration;

use serde::Deserialize;
use uartframe_frame::{FrameConfig, DEFAULT_MAX_PAYLOAD, DEFAULT_STALE_TIMEOUT};
use uartframe_ring::MIN_CAPACITY;

use crate::error::{Result, StreamError};

/// Default number of ring slots.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Default name of the decode thread.
pub const DEFAULT_THREAD_NAME: &str = "uartframe-decode";

/// Controls how a stream is built.
///
/// Every field has a default, so a config document only needs the values it
/// changes:
///
/// ```json
/// { "channel_capacity": 1024, "stale_timeout_ms": 250 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamConfig {
    /// Ring slots. One is kept free, so `channel_capacity - 1` bytes fit.
    pub channel_capacity: usize,
    /// Largest accepted frame payload.
    pub max_payload: u8,
    /// Largest gap between bytes of one frame, in milliseconds.
    pub stale_timeout_ms: u64,
    /// Name given to the decode thread.
    pub thread_name: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_payload: DEFAULT_MAX_PAYLOAD,
            stale_timeout_ms: DEFAULT_STALE_TIMEOUT.as_millis() as u64,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl StreamConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity < MIN_CAPACITY {
            return Err(StreamError::InvalidConfig(format!(
                "channel_capacity must be at least {MIN_CAPACITY}, got {}",
                self.channel_capacity
            )));
        }
        if self.stale_timeout_ms == 0 {
            return Err(StreamError::InvalidConfig(
                "stale_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.thread_name.contains('\0') {
            return Err(StreamError::InvalidConfig(
                "thread_name must not contain NUL bytes".to_string(),
            ));
        }
        Ok(())
    }

    /// Staleness timeout as a `Duration`.
    pub fn stale_timeout(&self) -> Duration {
        Duration::from_millis(self.stale_timeout_ms)
    }

    /// Decoder configuration derived from this config.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload: self.max_payload,
            stale_timeout: self.stale_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = StreamConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.channel_capacity, 256);
        assert_eq!(config.frame_config(), FrameConfig::default());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            StreamConfig::from_json(r#"{"channel_capacity": 64, "stale_timeout_ms": 250}"#)
                .unwrap();

        assert_eq!(config.channel_capacity, 64);
        assert_eq!(config.stale_timeout(), Duration::from_millis(250));
        assert_eq!(config.max_payload, DEFAULT_MAX_PAYLOAD);
        assert_eq!(config.thread_name, DEFAULT_THREAD_NAME);
    }

    #[test]
    fn empty_json_is_default() {
        assert_eq!(StreamConfig::from_json("{}").unwrap(), StreamConfig::default());
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = StreamConfig::from_json(r#"{"capacity": 64}"#).unwrap_err();
        assert!(matches!(err, StreamError::Config(_)));
    }

    #[test]
    fn rejects_max_payload_over_length_field() {
        let err = StreamConfig::from_json(r#"{"max_payload": 300}"#).unwrap_err();
        assert!(matches!(err, StreamError::Config(_)));
    }

    #[test]
    fn rejects_tiny_capacity() {
        let err = StreamConfig::from_json(r#"{"channel_capacity": 1}"#).unwrap_err();
        assert!(matches!(err, StreamError::InvalidConfig(msg) if msg.contains("channel_capacity")));
    }

    #[test]
    fn rejects_zero_timeout() {
        let config = StreamConfig {
            stale_timeout_ms: 0,
            ..StreamConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StreamError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_nul_in_thread_name() {
        let config = StreamConfig {
            thread_name: "bad\0name".to_string(),
            ..StreamConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
