use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between the logger handles and the writer task.
#[derive(Debug, Default)]
pub struct Stats {
    /// Accepted into the submission queue.
    pub submitted: AtomicU64,
    /// Encoded and handed to the file layers.
    pub written: AtomicU64,
    /// Dropped because they could not be encoded.
    pub encode_errors: AtomicU64,
    /// Lines that failed at the I/O layer.
    pub write_errors: AtomicU64,
    pub flushes: AtomicU64,
    pub flush_errors: AtomicU64,
    pub rotations: AtomicU64,
}

impl Stats {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            encode_errors: self.encode_errors.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flush_errors: self.flush_errors.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`Stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub written: u64,
    pub encode_errors: u64,
    pub write_errors: u64,
    pub flushes: u64,
    pub flush_errors: u64,
    pub rotations: u64,
}
