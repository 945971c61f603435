//! Display resources for in-flight frames

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;

/// Identifies a frame assigned as display source
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(pub u64);

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame-{}", self.0)
    }
}

/// Hands out leases and counts how many are still alive
#[derive(Debug, Clone, Default)]
pub struct LeaseTracker {
    live: Arc<AtomicUsize>,
    acquired: Arc<AtomicU64>,
}

impl LeaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a display resource for a payload
    pub fn acquire(&self, payload: Bytes) -> FrameLease {
        let id = FrameId(self.acquired.fetch_add(1, Ordering::AcqRel) + 1);
        self.live.fetch_add(1, Ordering::AcqRel);
        FrameLease {
            id,
            payload,
            live: Arc::clone(&self.live),
        }
    }

    /// Leases acquired but not yet released
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Leases acquired over the tracker's lifetime
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::Acquire)
    }
}

/// An allocated display resource; released when dropped
#[derive(Debug)]
pub struct FrameLease {
    id: FrameId,
    payload: Bytes,
    live: Arc<AtomicUsize>,
}

impl FrameLease {
    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

impl Drop for FrameLease {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_released_on_drop() {
        let tracker = LeaseTracker::new();
        let first = tracker.acquire(Bytes::from_static(b"a"));
        let second = tracker.acquire(Bytes::from_static(b"b"));
        assert_eq!(tracker.live(), 2);
        assert_eq!(first.id(), FrameId(1));
        assert_eq!(second.id(), FrameId(2));

        drop(first);
        assert_eq!(tracker.live(), 1);
        drop(second);
        assert_eq!(tracker.live(), 0);
        assert_eq!(tracker.acquired(), 2);
    }

    #[test]
    fn test_clones_share_counters() {
        let tracker = LeaseTracker::new();
        let other = tracker.clone();
        let lease = other.acquire(Bytes::from_static(b"x"));
        assert_eq!(tracker.live(), 1);
        assert_eq!(lease.payload().as_ref(), b"x");
    }
}
