use std::sync::mpsc::{self, Receiver, Sender};

use uartframe_frame::Frame;

/// Receives every validated frame, in arrival order, on the decode thread.
///
/// Each frame is an owned copy; the sink may keep it as long as it likes.
/// A slow sink stalls decoding, and the ring fills up behind it.
pub trait FrameSink: Send + 'static {
    /// Called once per frame whose checksum matched.
    fn on_frame(&mut self, frame: Frame);
}

impl<F> FrameSink for F
where
    F: FnMut(Frame) + Send + 'static,
{
    fn on_frame(&mut self, frame: Frame) {
        self(frame)
    }
}

/// Sink that forwards frames to an `mpsc` receiver on another thread.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<Frame>,
}

impl ChannelSink {
    /// Create a sink and the receiver its frames go to.
    pub fn pair() -> (Self, Receiver<Frame>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl FrameSink for ChannelSink {
    fn on_frame(&mut self, frame: Frame) {
        if let Err(err) = self.tx.send(frame) {
            tracing::warn!(length = err.0.len(), "frame receiver dropped; frame discarded");
        }
    }
}
