use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Result, RingError};

/// Smallest capacity that leaves one usable slot.
pub const MIN_CAPACITY: usize = 2;

struct Shared {
    slots: Box<[AtomicU8]>,
    /// Next slot the producer writes. Stored only by the producer.
    head: AtomicUsize,
    /// Next slot the consumer reads. Stored only by the consumer.
    tail: AtomicUsize,
}

impl Shared {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn next(&self, index: usize) -> usize {
        let next = index + 1;
        if next == self.capacity() {
            0
        } else {
            next
        }
    }

    fn occupancy(&self, head: usize, tail: usize) -> usize {
        if head >= tail {
            head - tail
        } else {
            self.capacity() - tail + head
        }
    }
}

/// Create a byte ring with `capacity` slots and split it into its two ends.
///
/// Capacity is fixed for the life of the ring; no allocation happens after
/// this call. A power of two is a good choice but not required.
pub fn channel(capacity: usize) -> Result<(Producer, Consumer)> {
    if capacity < MIN_CAPACITY {
        return Err(RingError::CapacityTooSmall {
            capacity,
            min: MIN_CAPACITY,
        });
    }

    let slots = (0..capacity).map(|_| AtomicU8::new(0)).collect();
    let shared = Arc::new(Shared {
        slots,
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
    });

    tracing::debug!(capacity, "byte ring created");

    Ok((
        Producer {
            shared: Arc::clone(&shared),
            head: 0,
        },
        Consumer { shared, tail: 0 },
    ))
}

/// Writing end of a byte ring.
///
/// There is exactly one producer per ring: the handle is not `Clone` and
/// pushing takes `&mut self`.
pub struct Producer {
    shared: Arc<Shared>,
    head: usize,
}

impl Producer {
    /// Push one byte. Returns `false` (byte not stored) when the ring is full.
    pub fn try_push(&mut self, byte: u8) -> bool {
        let next = self.shared.next(self.head);
        // Acquire pairs with the consumer's release store: the slot it
        // vacated is really free before we overwrite it.
        if next == self.shared.tail.load(Ordering::Acquire) {
            return false;
        }

        self.shared.slots[self.head].store(byte, Ordering::Relaxed);
        // Release publishes the slot write above to the consumer.
        self.shared.head.store(next, Ordering::Release);
        self.head = next;
        true
    }

    /// Push bytes until the ring fills up. Returns how many were stored.
    pub fn push_slice(&mut self, bytes: &[u8]) -> usize {
        bytes.iter().take_while(|&&byte| self.try_push(byte)).count()
    }

    /// Number of slots, including the sacrificed one.
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Largest number of bytes the ring can hold at once.
    pub fn usable_capacity(&self) -> usize {
        self.shared.capacity() - 1
    }

    /// Bytes currently queued. May grow stale as the consumer drains.
    pub fn len(&self) -> usize {
        let tail = self.shared.tail.load(Ordering::Acquire);
        self.shared.occupancy(self.head, tail)
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the next push would be rejected.
    pub fn is_full(&self) -> bool {
        self.shared.next(self.head) == self.shared.tail.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

/// Reading end of a byte ring.
///
/// There is exactly one consumer per ring: the handle is not `Clone` and
/// popping takes `&mut self`.
pub struct Consumer {
    shared: Arc<Shared>,
    tail: usize,
}

impl Consumer {
    /// Pop the oldest byte, or `None` when the ring is empty.
    pub fn try_pop(&mut self) -> Option<u8> {
        // Acquire pairs with the producer's release store so the slot
        // contents written before the head moved are visible here.
        if self.tail == self.shared.head.load(Ordering::Acquire) {
            return None;
        }

        let byte = self.shared.slots[self.tail].load(Ordering::Relaxed);
        let next = self.shared.next(self.tail);
        // Release hands the slot back to the producer.
        self.shared.tail.store(next, Ordering::Release);
        self.tail = next;
        Some(byte)
    }

    /// Pop everything currently queued into `dst`. Returns the count moved.
    pub fn drain_into(&mut self, dst: &mut Vec<u8>) -> usize {
        let before = dst.len();
        while let Some(byte) = self.try_pop() {
            dst.push(byte);
        }
        dst.len() - before
    }

    /// Number of slots, including the sacrificed one.
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Bytes currently queued. May grow stale as the producer pushes.
    pub fn len(&self) -> usize {
        let head = self.shared.head.load(Ordering::Acquire);
        self.shared.occupancy(head, self.tail)
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.tail == self.shared.head.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}
