//! `tokio_util::codec` adapter, for byte sources that are `AsyncRead`.

use std::time::Instant;

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, Frame, FrameConfig};
use crate::decoder::FrameDecoder;
use crate::error::{FrameError, Result};

/// Frame codec for `FramedRead`/`FramedWrite`.
///
/// Decoding drives a [`FrameDecoder`], so the same resynchronization and
/// staleness rules apply. Every read buffer is stamped with the time it was
/// handed to the codec.
#[derive(Debug)]
pub struct SerialCodec {
    decoder: FrameDecoder,
}

impl SerialCodec {
    /// Create a codec with explicit configuration.
    pub fn new(config: FrameConfig) -> Self {
        Self {
            decoder: FrameDecoder::new(config),
        }
    }

    /// Decoder state and counters.
    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }
}

impl Default for SerialCodec {
    fn default() -> Self {
        Self::new(FrameConfig::default())
    }
}

impl Decoder for SerialCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        let now = Instant::now();
        while src.has_remaining() {
            let byte = src.get_u8();
            if let Some(frame) = self.decoder.feed(byte, now) {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }
}

impl Encoder<&[u8]> for SerialCodec {
    type Error = FrameError;

    fn encode(&mut self, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
        let max = usize::from(self.decoder.config().max_payload);
        if payload.len() > max {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max,
            });
        }
        encode_frame(payload, dst)
    }
}

impl Encoder<Frame> for SerialCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        <Self as Encoder<&[u8]>>::encode(self, frame.payload(), dst)
    }
}
