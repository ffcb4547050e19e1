//! Activity counters shared between a session and its frame reader.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated lock-free from the reader thread and senders.
#[derive(Debug, Default)]
pub struct LinkCounters {
    opens: AtomicU64,
    frames_received: AtomicU64,
    bytes_received: AtomicU64,
    bytes_written: AtomicU64,
    read_timeouts: AtomicU64,
    write_failures: AtomicU64,
}

impl LinkCounters {
    pub fn record_open(&self) {
        self.opens.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_byte_received(&self) {
        self.bytes_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_timeout(&self) {
        self.read_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self, bytes: usize) {
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SessionStats {
        SessionStats {
            opens: self.opens.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            read_timeouts: self.read_timeouts.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a session's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub opens: u64,
    pub frames_received: u64,
    pub bytes_received: u64,
    pub bytes_written: u64,
    pub read_timeouts: u64,
    pub write_failures: u64,
}
