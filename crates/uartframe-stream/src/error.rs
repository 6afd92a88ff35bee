/// Errors that can occur while configuring or running a stream.
///
/// Decode-level problems never show up here: the decoder recovers from them
/// on its own and only counts them.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The byte ring could not be built.
    #[error("ring error: {0}")]
    Ring(#[from] uartframe_ring::RingError),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration document could not be parsed.
    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),

    /// The decode thread could not be spawned.
    #[error("failed to spawn decode thread: {0}")]
    Spawn(std::io::Error),

    /// `start` was called on a coordinator that already started.
    #[error("stream already started")]
    AlreadyStarted,

    /// The decode thread panicked, most likely inside the sink.
    #[error("decode thread panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, StreamError>;
