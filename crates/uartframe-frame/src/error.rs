/// Errors that can occur while encoding frames or moving them over I/O.
///
/// Decoding itself never fails: malformed input is dropped and the decoder
/// resynchronizes on its own.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload does not fit in a single frame.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte source ended before another complete frame arrived.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
