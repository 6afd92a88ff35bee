/// Errors that can occur while building a byte ring.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RingError {
    /// The requested capacity leaves no usable slot.
    #[error("ring capacity too small ({capacity} slots, min {min})")]
    CapacityTooSmall { capacity: usize, min: usize },
}

pub type Result<T> = std::result::Result<T, RingError>;
