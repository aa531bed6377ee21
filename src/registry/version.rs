//! Monotonic schema version.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::schema::SchemaSnapshot;

/// Schema version derived from file modification times.
///
/// The value only moves forward: a reload that brings in an older file keeps
/// the current version.
#[derive(Debug, Default)]
pub struct VersionClock {
    current: AtomicU64,
}

impl VersionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Largest mtime among the present snapshots, or `None` if there are none.
    pub fn compute(snapshots: &[Option<&SchemaSnapshot>]) -> Option<u64> {
        snapshots.iter().flatten().map(|s| s.mtime_ms()).max()
    }

    /// Move the clock to `candidate` if that is later. Returns the resulting
    /// version.
    pub fn advance(&self, candidate: u64) -> u64 {
        let previous = self.current.fetch_max(candidate, Ordering::AcqRel);
        previous.max(candidate)
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SchemaFormat;
    use crate::schema::Direction;

    fn snapshot(mtime_ms: u64) -> SchemaSnapshot {
        SchemaSnapshot::new(Direction::Outbound, "out.desc", SchemaFormat::BinaryDescriptor, Vec::new(), mtime_ms)
    }

    #[test]
    fn test_compute_takes_max_of_present() {
        let a = snapshot(1_000);
        let b = snapshot(2_500);
        assert_eq!(VersionClock::compute(&[Some(&a), Some(&b)]), Some(2_500));
        assert_eq!(VersionClock::compute(&[None, Some(&a)]), Some(1_000));
        assert_eq!(VersionClock::compute(&[None, None]), None);
    }

    #[test]
    fn test_advance_never_goes_backwards() {
        let clock = VersionClock::new();
        assert_eq!(clock.current(), 0);
        assert_eq!(clock.advance(5_000), 5_000);
        assert_eq!(clock.advance(3_000), 5_000);
        assert_eq!(clock.advance(7_000), 7_000);
        assert_eq!(clock.current(), 7_000);
    }
}
