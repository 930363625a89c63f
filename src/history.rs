//! Bounded latency history
//!
//! This module holds the durable record of recent probe outcomes: a
//! fixed-capacity ring buffer guarded by a single reader/writer lock.
//! Once full, new samples overwrite the oldest slot - bounded memory is
//! the point, losing old samples is expected behavior.
//!
//! The manager is the only writer; any number of consumers read
//! concurrently. All accessors hand out owned copies so no reference
//! into the buffer ever escapes the lock.

use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Default number of samples retained when no capacity is given.
pub const DEFAULT_CAPACITY: usize = 60;

/// A single probe outcome. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// When the probe resolved.
    pub timestamp: DateTime<Utc>,

    /// Measured round-trip latency. Zero when the probe failed.
    pub latency: Duration,

    /// Whether the probe failed (unreachable, timeout, resolution error).
    pub failed: bool,

    /// Short human-readable outcome, e.g. "ok" or the error text.
    pub description: String,
}

impl Sample {
    /// A successful probe with the given round-trip latency.
    pub fn ok(latency: Duration) -> Self {
        Self {
            timestamp: Utc::now(),
            latency,
            failed: false,
            description: String::from("ok"),
        }
    }

    /// A failed probe carrying the error text as description.
    pub fn failure(description: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            latency: Duration::ZERO,
            failed: true,
            description: description.into(),
        }
    }

    /// Latency in fractional milliseconds, for averaging and plotting.
    pub fn latency_ms(&self) -> f64 {
        self.latency.as_secs_f64() * 1000.0
    }
}

/// Ring state behind the lock. `buffer` grows up to `capacity` and is
/// never reallocated afterwards; `next` is the write cursor.
#[derive(Debug)]
struct Ring {
    buffer: Vec<Sample>,
    next: usize,
}

/// Fixed-capacity circular buffer of [`Sample`]s, safe to share across
/// tasks behind an `Arc`.
#[derive(Debug)]
pub struct History {
    capacity: usize,
    ring: RwLock<Ring>,
}

impl History {
    /// Create an empty history. A zero capacity is normalized to
    /// [`DEFAULT_CAPACITY`] rather than rejected.
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            capacity
        };
        Self {
            capacity,
            ring: RwLock::new(Ring {
                buffer: Vec::with_capacity(capacity),
                next: 0,
            }),
        }
    }

    /// Maximum number of samples retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples currently retained.
    pub fn len(&self) -> usize {
        self.ring.read().expect("history lock poisoned").buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a sample at the write cursor. O(1); once the buffer is
    /// full this overwrites the oldest retained sample.
    pub fn add(&self, sample: Sample) {
        let mut ring = self.ring.write().expect("history lock poisoned");
        if ring.buffer.len() < self.capacity {
            ring.buffer.push(sample);
        } else {
            let next = ring.next;
            ring.buffer[next] = sample;
        }
        ring.next = (ring.next + 1) % self.capacity;
    }

    /// Up to `n` most recent samples, newest first. `n` is clamped to
    /// the current size; an empty history yields an empty vec.
    pub fn latest(&self, n: usize) -> Vec<Sample> {
        let ring = self.ring.read().expect("history lock poisoned");
        let size = ring.buffer.len();
        let n = n.min(size);
        let mut out = Vec::with_capacity(n);
        // Walk backward from the slot written last.
        let mut idx = (ring.next + self.capacity - 1) % self.capacity;
        for _ in 0..n {
            out.push(ring.buffer[idx].clone());
            idx = (idx + self.capacity - 1) % self.capacity;
        }
        out
    }

    /// All retained samples in chronological order, oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        let ring = self.ring.read().expect("history lock poisoned");
        let size = ring.buffer.len();
        let start = (ring.next + self.capacity - size) % self.capacity;
        let mut out = Vec::with_capacity(size);
        for i in 0..size {
            out.push(ring.buffer[(start + i) % self.capacity].clone());
        }
        out
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
