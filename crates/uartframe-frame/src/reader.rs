use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::time::Instant;

use crate::codec::{Frame, FrameConfig};
use crate::decoder::FrameDecoder;
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 256;

/// Reads complete frames from any `Read` byte source, such as an opened
/// serial device.
///
/// Handles partial reads and line noise internally: callers only ever get
/// frames whose checksum matched. Every chunk is stamped with the time it was
/// read, so a long pause in the middle of a frame discards it.
pub struct FrameReader<T> {
    inner: T,
    decoder: FrameDecoder,
    pending: VecDeque<Frame>,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            decoder: FrameDecoder::new(config),
            pending: VecDeque::new(),
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            let pending = &mut self.pending;
            self.decoder
                .feed_slice(&chunk[..read], Instant::now(), |frame| {
                    pending.push_back(frame)
                });
        }
    }

    /// Decoder state and counters.
    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying source.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner source. Frames already decoded
    /// but not yet returned are dropped.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read> Iterator for FrameReader<T> {
    type Item = Result<Frame>;

    /// Yields frames until the source reaches EOF.
    fn next(&mut self) -> Option<Self::Item> {
        match self.read_frame() {
            Ok(frame) => Some(Ok(frame)),
            Err(FrameError::ConnectionClosed) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
