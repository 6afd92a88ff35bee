//! Streaming decoder for checksummed serial frames.
//!
//! Every frame on the wire is:
//! - A 2-byte preamble (`0xAA 0x55`) for stream synchronization
//! - A 1-byte payload length
//! - The payload itself
//! - A 1-byte checksum: length plus every payload byte, mod 256
//!
//! [`FrameDecoder`] consumes one byte at a time and silently resynchronizes on
//! garbage, oversized lengths, bad checksums, and stale partial frames.

pub mod codec;
pub mod decoder;
pub mod error;
#[cfg(feature = "async")]
pub mod framed;
pub mod reader;
pub mod writer;

pub use codec::{
    checksum, encode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, DEFAULT_STALE_TIMEOUT,
    HEADER_SIZE, MAX_PAYLOAD_LIMIT, SYNC1, SYNC2, TRAILER_SIZE,
};
pub use decoder::{DecodeStats, DecoderState, FrameDecoder, Rejection};
pub use error::{FrameError, Result};
#[cfg(feature = "async")]
pub use framed::SerialCodec;
pub use reader::FrameReader;
pub use writer::FrameWriter;
