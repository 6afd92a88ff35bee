use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, Thread};
use std::time::Instant;

use uartframe_frame::{DecodeStats, FrameDecoder};
use uartframe_ring::{Consumer, Producer};

use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::sink::FrameSink;

/// Why a submitted byte was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The ring is full; the decode thread has fallen behind.
    ChannelFull,
    /// The decode thread has stopped and nothing will drain the ring.
    Closed,
}

/// Result of handing one byte to a [`Submitter`].
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The byte is queued for decoding.
    Accepted,
    /// The byte was not stored. What to do with it is up to the caller.
    Rejected(RejectReason),
}

impl SubmitOutcome {
    /// True if the byte was queued.
    pub fn is_accepted(self) -> bool {
        matches!(self, SubmitOutcome::Accepted)
    }
}

/// Totals collected over the life of a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamReport {
    /// Bytes the submitter queued.
    pub bytes_accepted: u64,
    /// Bytes the submitter refused.
    pub bytes_rejected: u64,
    /// Decoder counters at the moment the decode thread exited.
    pub decode: DecodeStats,
}

#[derive(Debug, Default)]
struct Shared {
    stop: AtomicBool,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

/// Producer side of a running stream.
///
/// Call [`submit`](Self::submit) from wherever bytes arrive. It never blocks:
/// a full ring is reported straight back as [`RejectReason::ChannelFull`].
/// There is one submitter per stream; move it to the producing thread.
#[derive(Debug)]
pub struct Submitter {
    producer: Producer,
    shared: Arc<Shared>,
    worker: Thread,
}

impl Submitter {
    /// Queue one byte and wake the decode thread.
    pub fn submit(&mut self, byte: u8) -> SubmitOutcome {
        if self.shared.stop.load(Ordering::Acquire) {
            return self.reject(1, RejectReason::Closed);
        }
        if !self.producer.try_push(byte) {
            return self.reject(1, RejectReason::ChannelFull);
        }

        self.shared.accepted.fetch_add(1, Ordering::Relaxed);
        self.worker.unpark();
        SubmitOutcome::Accepted
    }

    /// Queue as many leading bytes of `bytes` as fit and wake the decode
    /// thread once. Returns how many were queued; the rest were rejected.
    pub fn submit_slice(&mut self, bytes: &[u8]) -> usize {
        if bytes.is_empty() {
            return 0;
        }
        if self.shared.stop.load(Ordering::Acquire) {
            let _ = self.reject(bytes.len(), RejectReason::Closed);
            return 0;
        }

        let queued = self.producer.push_slice(bytes);
        if queued > 0 {
            self.shared
                .accepted
                .fetch_add(queued as u64, Ordering::Relaxed);
            self.worker.unpark();
        }
        if queued < bytes.len() {
            let _ = self.reject(bytes.len() - queued, RejectReason::ChannelFull);
        }
        queued
    }

    /// True once the coordinator has been shut down or the decode thread
    /// has died.
    pub fn is_closed(&self) -> bool {
        self.shared.stop.load(Ordering::Acquire)
    }

    /// Bytes queued and not yet picked up by the decode thread.
    pub fn queued(&self) -> usize {
        self.producer.len()
    }

    fn reject(&self, count: usize, reason: RejectReason) -> SubmitOutcome {
        self.shared
            .rejected
            .fetch_add(count as u64, Ordering::Relaxed);
        tracing::debug!(
            count,
            ?reason,
            capacity = self.producer.capacity(),
            "submission rejected"
        );
        SubmitOutcome::Rejected(reason)
    }
}

/// Owns the decode thread of one stream.
///
/// Built idle by [`new`](Self::new); [`start`](Self::start) spawns the
/// decode thread and hands out the [`Submitter`]. [`shutdown`](Self::shutdown)
/// (or dropping the coordinator) stops the thread and waits for it to exit.
pub struct StreamCoordinator {
    config: StreamConfig,
    shared: Arc<Shared>,
    idle: Option<(Worker, Producer)>,
    handle: Option<JoinHandle<DecodeStats>>,
}

impl StreamCoordinator {
    /// Validate the config and build the ring and decoder.
    pub fn new(config: StreamConfig, sink: impl FrameSink) -> Result<Self> {
        config.validate()?;
        let (producer, consumer) = uartframe_ring::channel(config.channel_capacity)?;
        let shared = Arc::new(Shared::default());

        let worker = Worker {
            consumer,
            decoder: FrameDecoder::new(config.frame_config()),
            sink: Box::new(sink),
            shared: Arc::clone(&shared),
        };

        Ok(Self {
            config,
            shared,
            idle: Some((worker, producer)),
            handle: None,
        })
    }

    /// Spawn the decode thread and return the producer handle.
    pub fn start(&mut self) -> Result<Submitter> {
        let (worker, producer) = self.idle.take().ok_or(StreamError::AlreadyStarted)?;

        let handle = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || worker.run())
            .map_err(StreamError::Spawn)?;

        tracing::info!(
            thread = %self.config.thread_name,
            capacity = self.config.channel_capacity,
            max_payload = self.config.max_payload,
            stale_timeout_ms = self.config.stale_timeout_ms,
            "decode thread started"
        );

        let worker = handle.thread().clone();
        self.handle = Some(handle);

        Ok(Submitter {
            producer,
            shared: Arc::clone(&self.shared),
            worker,
        })
    }

    /// True while the decode thread is running.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Configuration this stream was built with.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Stop the decode thread and wait for it to exit.
    ///
    /// Bytes still queued and any partial frame are abandoned; no partial
    /// frame ever reaches the sink.
    pub fn shutdown(mut self) -> Result<StreamReport> {
        let decode = match self.handle.take() {
            Some(handle) => {
                self.stop(&handle);
                handle.join().map_err(|_| StreamError::WorkerPanicked)?
            }
            None => {
                self.shared.stop.store(true, Ordering::Release);
                self.idle
                    .take()
                    .map(|(worker, _)| *worker.decoder.stats())
                    .unwrap_or_default()
            }
        };

        let report = StreamReport {
            bytes_accepted: self.shared.accepted.load(Ordering::Relaxed),
            bytes_rejected: self.shared.rejected.load(Ordering::Relaxed),
            decode,
        };
        tracing::info!(
            frames = report.decode.frames,
            accepted = report.bytes_accepted,
            rejected = report.bytes_rejected,
            "stream shut down"
        );
        Ok(report)
    }

    fn stop(&self, handle: &JoinHandle<DecodeStats>) {
        self.shared.stop.store(true, Ordering::Release);
        handle.thread().unpark();
    }
}

impl Drop for StreamCoordinator {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop(&handle);
            if handle.join().is_err() {
                tracing::warn!("decode thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for StreamCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCoordinator")
            .field("config", &self.config)
            .field("started", &self.idle.is_none())
            .field("running", &self.is_running())
            .finish()
    }
}

struct Worker {
    consumer: Consumer,
    decoder: FrameDecoder,
    sink: Box<dyn FrameSink>,
    shared: Arc<Shared>,
}

/// Marks the stream closed when the decode thread exits, unwinding included.
struct CloseOnExit(Arc<Shared>);

impl Drop for CloseOnExit {
    fn drop(&mut self) {
        self.0.stop.store(true, Ordering::Release);
    }
}

impl Worker {
    fn run(mut self) -> DecodeStats {
        let _close = CloseOnExit(Arc::clone(&self.shared));
        // The stop flag is checked before every byte, so a stop request is
        // honoured within one byte or one wakeup.
        while !self.shared.stop.load(Ordering::Acquire) {
            match self.consumer.try_pop() {
                Some(byte) => {
                    if let Some(frame) = self.decoder.feed(byte, Instant::now()) {
                        self.sink.on_frame(frame);
                    }
                }
                // Spurious wakeups just go round the loop again.
                None => thread::park(),
            }
        }

        tracing::debug!(
            abandoned = self.consumer.len(),
            state = ?self.decoder.state(),
            "decode thread exiting"
        );
        *self.decoder.stats()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use uartframe_frame::{Frame, SYNC1, SYNC2};

    use super::*;
    use crate::sink::ChannelSink;

    const REFERENCE: [u8; 9] = [0xAA, 0x55, 0x05, 0x01, 0x02, 0x03, 0x04, 0x05, 0x14];
    const WAIT: Duration = Duration::from_secs(5);

    fn small_config(capacity: usize) -> StreamConfig {
        StreamConfig {
            channel_capacity: capacity,
            ..StreamConfig::default()
        }
    }

    fn submit_all(submitter: &mut Submitter, bytes: &[u8]) {
        for &byte in bytes {
            while !submitter.submit(byte).is_accepted() {
                thread::yield_now();
            }
        }
    }

    #[test]
    fn decodes_reference_frame() {
        let (sink, rx) = ChannelSink::pair();
        let mut coordinator = StreamCoordinator::new(StreamConfig::default(), sink).unwrap();
        let mut submitter = coordinator.start().unwrap();

        for &byte in &REFERENCE {
            assert_eq!(submitter.submit(byte), SubmitOutcome::Accepted);
        }

        let frame = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(frame.len(), 5);
        assert_eq!(frame.payload(), &[1, 2, 3, 4, 5]);

        let report = coordinator.shutdown().unwrap();
        assert_eq!(report.bytes_accepted, 9);
        assert_eq!(report.bytes_rejected, 0);
        assert_eq!(report.decode.frames, 1);
    }

    #[test]
    fn bad_checksum_delivers_nothing() {
        let (sink, rx) = ChannelSink::pair();
        let mut coordinator = StreamCoordinator::new(StreamConfig::default(), sink).unwrap();
        let mut submitter = coordinator.start().unwrap();

        let mut bad = REFERENCE;
        bad[8] = 0x00;
        submit_all(&mut submitter, &bad);
        // A good frame afterwards proves the bad one was fully consumed.
        submit_all(&mut submitter, &REFERENCE);

        assert_eq!(rx.recv_timeout(WAIT).unwrap().payload(), &[1, 2, 3, 4, 5]);
        let report = coordinator.shutdown().unwrap();
        assert_eq!(report.decode.frames, 1);
        assert_eq!(report.decode.checksum_mismatches, 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn frames_from_producer_thread_arrive_in_order() {
        let (sink, rx) = ChannelSink::pair();
        let mut coordinator = StreamCoordinator::new(small_config(16), sink).unwrap();
        let mut submitter = coordinator.start().unwrap();

        let producer = thread::spawn(move || {
            for i in 0..200u8 {
                let payload = [i, i.wrapping_mul(3), 0xAA, 0x55];
                let checksum = uartframe_frame::checksum(&payload);
                submit_all(&mut submitter, &[0x00, SYNC1, SYNC2, 4]);
                submit_all(&mut submitter, &payload);
                submit_all(&mut submitter, &[checksum]);
            }
        });

        for i in 0..200u8 {
            let frame = rx.recv_timeout(WAIT).unwrap();
            assert_eq!(frame.payload(), &[i, i.wrapping_mul(3), 0xAA, 0x55]);
        }
        producer.join().unwrap();

        let report = coordinator.shutdown().unwrap();
        assert_eq!(report.decode.frames, 200);
    }

    #[test]
    fn full_channel_rejects_submission() {
        // Large enough that the setup frame never hits backpressure.
        let capacity = 16;
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        // Park the decode thread inside the sink so nothing drains the ring.
        let sink = move |_frame: Frame| {
            let _ = entered_tx.send(());
            let _ = release_rx.recv();
        };

        let mut coordinator = StreamCoordinator::new(small_config(capacity), sink).unwrap();
        let mut submitter = coordinator.start().unwrap();

        submit_all(&mut submitter, &REFERENCE);
        entered_rx.recv_timeout(WAIT).unwrap();

        let outcomes: Vec<SubmitOutcome> =
            (0..=capacity as u8).map(|byte| submitter.submit(byte)).collect();

        assert!(outcomes[..capacity - 1].iter().all(|o| o.is_accepted()));
        assert_eq!(
            outcomes[capacity],
            SubmitOutcome::Rejected(RejectReason::ChannelFull)
        );
        assert_eq!(submitter.queued(), capacity - 1);

        release_tx.send(()).unwrap();
        let report = coordinator.shutdown().unwrap();
        assert_eq!(report.bytes_rejected, 2);
    }

    #[test]
    fn submit_slice_reports_accepted_prefix() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let sink = move |_frame: Frame| {
            let _ = entered_tx.send(());
            let _ = release_rx.recv();
        };

        let mut coordinator = StreamCoordinator::new(small_config(4), sink).unwrap();
        let mut submitter = coordinator.start().unwrap();

        let frame = [SYNC1, SYNC2, 0x00, 0x00];
        let mut sent = 0;
        while sent < frame.len() {
            sent += submitter.submit_slice(&frame[sent..]);
        }
        entered_rx.recv_timeout(WAIT).unwrap();

        assert_eq!(submitter.submit_slice(&[1, 2, 3, 4, 5]), 3);
        assert_eq!(submitter.submit_slice(&[]), 0);

        release_tx.send(()).unwrap();
        coordinator.shutdown().unwrap();
    }

    #[test]
    fn shutdown_abandons_partial_frame() {
        let (sink, rx) = ChannelSink::pair();
        let mut coordinator = StreamCoordinator::new(StreamConfig::default(), sink).unwrap();
        let mut submitter = coordinator.start().unwrap();

        submit_all(&mut submitter, &REFERENCE[..6]);
        let report = coordinator.shutdown().unwrap();

        assert_eq!(report.decode.frames, 0);
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(
            submitter.submit(0x14),
            SubmitOutcome::Rejected(RejectReason::Closed)
        );
        assert!(submitter.is_closed());
    }

    #[test]
    fn shutdown_of_idle_thread_returns_promptly() {
        let (sink, _rx) = ChannelSink::pair();
        let mut coordinator = StreamCoordinator::new(StreamConfig::default(), sink).unwrap();
        let _submitter = coordinator.start().unwrap();
        assert!(coordinator.is_running());

        let started = Instant::now();
        coordinator.shutdown().unwrap();
        assert!(started.elapsed() < WAIT);
    }

    #[test]
    fn shutdown_without_start() {
        let (sink, _rx) = ChannelSink::pair();
        let coordinator = StreamCoordinator::new(StreamConfig::default(), sink).unwrap();
        assert!(!coordinator.is_running());

        let report = coordinator.shutdown().unwrap();
        assert_eq!(report, StreamReport::default());
    }

    #[test]
    fn start_twice_fails() {
        let (sink, _rx) = ChannelSink::pair();
        let mut coordinator = StreamCoordinator::new(StreamConfig::default(), sink).unwrap();
        let _submitter = coordinator.start().unwrap();

        assert!(matches!(
            coordinator.start(),
            Err(StreamError::AlreadyStarted)
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let (sink, _rx) = ChannelSink::pair();
        let err = StreamCoordinator::new(small_config(1), sink).unwrap_err();
        assert!(matches!(err, StreamError::InvalidConfig(_)));
    }

    #[test]
    fn sink_panic_surfaces_on_shutdown() {
        let sink = |_frame: Frame| panic!("sink failed");
        let mut coordinator = StreamCoordinator::new(StreamConfig::default(), sink).unwrap();
        let mut submitter = coordinator.start().unwrap();

        submit_all(&mut submitter, &REFERENCE);
        let deadline = Instant::now() + WAIT;
        while coordinator.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        assert!(matches!(
            coordinator.shutdown(),
            Err(StreamError::WorkerPanicked)
        ));
    }

    #[test]
    fn dead_decode_thread_closes_submitter() {
        let sink = |_frame: Frame| panic!("sink failed");
        let mut coordinator = StreamCoordinator::new(StreamConfig::default(), sink).unwrap();
        let mut submitter = coordinator.start().unwrap();

        submit_all(&mut submitter, &REFERENCE);
        let deadline = Instant::now() + WAIT;
        while coordinator.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!coordinator.is_running());

        assert!(submitter.is_closed());
        assert_eq!(
            submitter.submit(SYNC1),
            SubmitOutcome::Rejected(RejectReason::Closed)
        );
        assert_eq!(submitter.submit_slice(&REFERENCE), 0);
        assert!(matches!(
            coordinator.shutdown(),
            Err(StreamError::WorkerPanicked)
        ));
    }

    #[test]
    fn drop_stops_decode_thread() {
        let (sink, rx) = ChannelSink::pair();
        let mut coordinator = StreamCoordinator::new(StreamConfig::default(), sink).unwrap();
        let _submitter = coordinator.start().unwrap();

        drop(coordinator);

        // The sink (and its sender) went away with the joined thread.
        assert!(matches!(
            rx.recv_timeout(WAIT),
            Err(mpsc::RecvTimeoutError::Disconnected)
        ));
    }

    #[test]
    fn thread_uses_configured_name() {
        let (tx, rx) = mpsc::channel();
        let sink = move |_frame: Frame| {
            let _ = tx.send(thread::current().name().map(str::to_string));
        };
        let config = StreamConfig {
            thread_name: "serial-rx".to_string(),
            ..StreamConfig::default()
        };

        let mut coordinator = StreamCoordinator::new(config, sink).unwrap();
        let mut submitter = coordinator.start().unwrap();
        submit_all(&mut submitter, &REFERENCE);

        assert_eq!(rx.recv_timeout(WAIT).unwrap().as_deref(), Some("serial-rx"));
        coordinator.shutdown().unwrap();
    }
}
