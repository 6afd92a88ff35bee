//! Lock-free single-producer/single-consumer byte ring.
//!
//! This is the lowest layer of uartframe. It decouples byte arrival (an
//! interrupt handler, a DMA callback, a reader thread) from frame decoding:
//! - [`Producer`] pushes bytes and never blocks
//! - [`Consumer`] pops bytes and never blocks
//!
//! One slot is sacrificed to tell "full" from "empty", so a ring built with
//! capacity `n` holds at most `n - 1` bytes.

pub mod error;
pub mod ring;

pub use error::{Result, RingError};
pub use ring::{channel, Consumer, Producer, MIN_CAPACITY};
