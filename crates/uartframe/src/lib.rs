//! Streaming decoder for checksummed serial frames.
//!
//! uartframe turns an arbitrarily fragmented byte stream (a UART, a pipe, a
//! socket) into validated frames, with byte arrival and decoding running on
//! separate threads.
//!
//! # Crate Structure
//!
//! - [`ring`] — Lock-free single-producer/single-consumer byte ring
//! - [`frame`] — Wire format, checksum, and the byte-at-a-time decoder
//! - [`stream`] — Decode thread, submitter, and frame sinks
//! - `logging` — `tracing-subscriber` bootstrap (behind `logging` feature)

/// Re-export ring types.
pub mod ring {
    pub use uartframe_ring::*;
}

/// Re-export frame types.
pub mod frame {
    pub use uartframe_frame::*;
}

/// Re-export stream types.
pub mod stream {
    pub use uartframe_stream::*;
}

pub mod level;

#[cfg(feature = "logging")]
pub mod logging;

pub use frame::{Frame, FrameConfig, FrameDecoder};
pub use level::{LogFormat, LogLevel};
pub use stream::{ChannelSink, FrameSink, StreamConfig, StreamCoordinator, SubmitOutcome, Submitter};
