use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// First preamble byte.
pub const SYNC1: u8 = 0xAA;

/// Second preamble byte.
pub const SYNC2: u8 = 0x55;

/// Frame header: sync1 (1) + sync2 (1) + length (1) = 3 bytes.
pub const HEADER_SIZE: usize = 3;

/// Frame trailer: checksum (1) = 1 byte.
pub const TRAILER_SIZE: usize = 1;

/// Default maximum payload size.
pub const DEFAULT_MAX_PAYLOAD: u8 = 32;

/// Hard ceiling imposed by the one-byte length field.
pub const MAX_PAYLOAD_LIMIT: usize = u8::MAX as usize;

/// Default gap between two bytes after which a partial frame is discarded.
pub const DEFAULT_STALE_TIMEOUT: Duration = Duration::from_millis(1000);

/// A validated frame payload.
///
/// Frames coming out of [`FrameDecoder`](crate::FrameDecoder) own a copy of
/// their bytes; nothing here points back into decoder storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    payload: Bytes,
}

impl Frame {
    /// Create a frame for sending. Fails if the payload cannot be described by
    /// the one-byte length field.
    pub fn new(payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_LIMIT {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_LIMIT,
            });
        }
        Ok(Self { payload })
    }

    pub(crate) fn from_validated(payload: &[u8]) -> Self {
        Self {
            payload: Bytes::copy_from_slice(payload),
        }
    }

    /// Declared payload length, as carried in the length byte.
    pub fn len(&self) -> u8 {
        self.payload.len() as u8
    }

    /// True for a zero-length frame.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// The payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the frame and return its payload.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// The checksum byte this frame carries on the wire.
    pub fn checksum(&self) -> u8 {
        checksum(&self.payload)
    }

    /// The total wire size of this frame (header + payload + trailer).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len() + TRAILER_SIZE
    }
}

/// Checksum of a payload: the length byte plus every payload byte, mod 256.
pub fn checksum(payload: &[u8]) -> u8 {
    payload
        .iter()
        .fold(payload.len() as u8, |acc, &byte| acc.wrapping_add(byte))
}

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────┬────────┬──────────┬──────────────────┬──────────┐
/// │ Sync1  │ Sync2  │ Length   │ Payload          │ Checksum │
/// │ 0xAA   │ 0x55   │ (1B)     │ (Length bytes)   │ (1B)     │
/// └────────┴────────┴──────────┴──────────────────┴──────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD_LIMIT {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_LIMIT,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len() + TRAILER_SIZE);
    dst.put_u8(SYNC1);
    dst.put_u8(SYNC2);
    dst.put_u8(payload.len() as u8);
    dst.put_slice(payload);
    dst.put_u8(checksum(payload));
    Ok(())
}

/// Configuration for the frame decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Largest accepted length byte. Default: 32.
    pub max_payload: u8,
    /// Largest gap between consecutive bytes inside one frame. Default: 1s.
    pub stale_timeout: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
            stale_timeout: DEFAULT_STALE_TIMEOUT,
        }
    }
}
