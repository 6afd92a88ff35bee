//! Decode serial frames on a dedicated thread.
//!
//! This is the "just works" layer. Hand bytes to a [`Submitter`] from
//! wherever they arrive; completed frames come out of a [`FrameSink`] on the
//! decode thread. The two sides share nothing but a lock-free byte ring.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod sink;

pub use config::StreamConfig;
pub use coordinator::{RejectReason, StreamCoordinator, StreamReport, SubmitOutcome, Submitter};
pub use error::{Result, StreamError};
pub use sink::{ChannelSink, FrameSink};
