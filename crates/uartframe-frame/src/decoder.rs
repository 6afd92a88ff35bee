use std::time::{Duration, Instant};

use crate::codec::{Frame, FrameConfig, SYNC1, SYNC2};

/// Where the decoder is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderState {
    /// Hunting for the first preamble byte.
    WaitSync1,
    /// Saw sync1, expecting sync2.
    WaitSync2,
    /// Preamble complete, next byte is the payload length.
    ReadLength,
    /// Collecting payload bytes.
    ReadPayload,
    /// Payload complete, next byte is the checksum.
    ReadChecksum,
}

/// Why the decoder dropped what it had and went back to hunting for sync1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// A byte arrived that cannot start or continue a preamble.
    SyncLost { byte: u8 },
    /// The length byte exceeds the configured maximum.
    OversizedLength { length: u8, max: u8 },
    /// The checksum byte does not match the received length and payload.
    ChecksumMismatch { expected: u8, received: u8 },
    /// Too much time passed since the previous byte of a partial frame.
    Stale { elapsed: Duration },
}

/// Running counters kept by a [`FrameDecoder`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Frames that passed the checksum.
    pub frames: u64,
    /// Bytes discarded while looking for a preamble.
    pub sync_losses: u64,
    /// Frames dropped for declaring too long a payload.
    pub oversized_lengths: u64,
    /// Frames dropped for a bad checksum.
    pub checksum_mismatches: u64,
    /// Partial frames discarded because the link went quiet.
    pub stale_resets: u64,
    /// Most recent rejection, if any.
    pub last_rejection: Option<Rejection>,
}

impl DecodeStats {
    fn record(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::SyncLost { .. } => self.sync_losses += 1,
            Rejection::OversizedLength { .. } => self.oversized_lengths += 1,
            Rejection::ChecksumMismatch { .. } => self.checksum_mismatches += 1,
            Rejection::Stale { .. } => self.stale_resets += 1,
        }
        self.last_rejection = Some(rejection);
    }
}

/// Reassembles frames from a byte stream, one byte per call.
///
/// The decoder never fails. Garbage, oversized lengths, checksum mismatches
/// and stale partial frames all send it back to [`DecoderState::WaitSync1`],
/// from where it finds the next valid frame on its own.
#[derive(Debug)]
pub struct FrameDecoder {
    config: FrameConfig,
    state: DecoderState,
    length: u8,
    index: usize,
    checksum: u8,
    scratch: Box<[u8]>,
    last_arrival: Option<Instant>,
    stats: DecodeStats,
}

impl FrameDecoder {
    /// Create a decoder. The scratch buffer is allocated here, once.
    pub fn new(config: FrameConfig) -> Self {
        Self {
            config,
            state: DecoderState::WaitSync1,
            length: 0,
            index: 0,
            checksum: 0,
            scratch: vec![0u8; usize::from(config.max_payload)].into_boxed_slice(),
            last_arrival: None,
            stats: DecodeStats::default(),
        }
    }

    /// Consume one byte that arrived at `arrival`.
    ///
    /// Returns a frame when this byte was a matching checksum, `None`
    /// otherwise. If more than the stale timeout passed since the previous
    /// byte, any partial frame is dropped before this byte is looked at.
    pub fn feed(&mut self, byte: u8, arrival: Instant) -> Option<Frame> {
        if let Some(last) = self.last_arrival {
            // Clocks that step backwards count as no time passing.
            let elapsed = arrival.saturating_duration_since(last);
            if elapsed > self.config.stale_timeout {
                self.expire(elapsed);
            }
        }
        self.last_arrival = Some(arrival);

        self.step(byte)
    }

    /// Feed a chunk of bytes that all arrived at `arrival`, handing each
    /// completed frame to `on_frame`. Returns the number of frames produced.
    pub fn feed_slice(
        &mut self,
        bytes: &[u8],
        arrival: Instant,
        mut on_frame: impl FnMut(Frame),
    ) -> usize {
        let mut produced = 0;
        for &byte in bytes {
            if let Some(frame) = self.feed(byte, arrival) {
                produced += 1;
                on_frame(frame);
            }
        }
        produced
    }

    /// Drop any partial frame and go back to hunting for sync1.
    pub fn reset(&mut self) {
        self.state = DecoderState::WaitSync1;
        self.length = 0;
        self.index = 0;
        self.checksum = 0;
    }

    /// Current parse state.
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Counters accumulated since construction.
    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    /// Decoder configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn step(&mut self, byte: u8) -> Option<Frame> {
        match self.state {
            DecoderState::WaitSync1 => {
                if byte == SYNC1 {
                    self.state = DecoderState::WaitSync2;
                } else {
                    self.reject(Rejection::SyncLost { byte });
                }
            }
            DecoderState::WaitSync2 => {
                if byte == SYNC2 {
                    self.state = DecoderState::ReadLength;
                } else if byte != SYNC1 {
                    self.reject(Rejection::SyncLost { byte });
                }
                // A repeated sync1 restarts the preamble; stay in WaitSync2.
            }
            DecoderState::ReadLength => {
                if byte > self.config.max_payload {
                    self.reject(Rejection::OversizedLength {
                        length: byte,
                        max: self.config.max_payload,
                    });
                } else {
                    self.length = byte;
                    self.index = 0;
                    self.checksum = byte;
                    self.state = if byte == 0 {
                        DecoderState::ReadChecksum
                    } else {
                        DecoderState::ReadPayload
                    };
                }
            }
            DecoderState::ReadPayload => {
                self.scratch[self.index] = byte;
                self.checksum = self.checksum.wrapping_add(byte);
                self.index += 1;
                if self.index == usize::from(self.length) {
                    self.state = DecoderState::ReadChecksum;
                }
            }
            DecoderState::ReadChecksum => {
                if byte == self.checksum {
                    let frame = Frame::from_validated(&self.scratch[..self.index]);
                    self.stats.frames += 1;
                    tracing::trace!(length = self.length, "frame decoded");
                    self.reset();
                    return Some(frame);
                }
                self.reject(Rejection::ChecksumMismatch {
                    expected: self.checksum,
                    received: byte,
                });
            }
        }
        None
    }

    fn expire(&mut self, elapsed: Duration) {
        if self.state != DecoderState::WaitSync1 {
            let rejection = Rejection::Stale { elapsed };
            tracing::debug!(?rejection, state = ?self.state, "partial frame expired");
            self.stats.record(rejection);
        }
        self.reset();
    }

    fn reject(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::SyncLost { .. } => tracing::trace!(?rejection, "byte dropped"),
            _ => tracing::debug!(?rejection, "frame rejected"),
        }
        self.stats.record(rejection);
        self.reset();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(FrameConfig::default())
    }
}
