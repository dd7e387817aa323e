//! Participant statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-participant statistics
pub struct ParticipantStats {
    /// Successful joins
    pub joins: AtomicU64,
    /// Joins refused for validation, conflict or storage reasons
    pub join_rejections: AtomicU64,
    /// Complete callbacks received
    pub complete_requests: AtomicU64,
    /// Executor calls that succeeded
    pub mutations_applied: AtomicU64,
    /// Executor calls that failed
    pub mutations_failed: AtomicU64,
    /// Complete callbacks answered from the journal without work
    pub duplicate_completes: AtomicU64,
    /// Complete callbacks for sagas this participant never joined
    pub unknown_completes: AtomicU64,
    /// Compensate callbacks received
    pub compensate_requests: AtomicU64,
    /// Entries moved to `Compensated`
    pub compensations: AtomicU64,
    /// Compensate callbacks refused because the work was already applied
    pub rejected_compensations: AtomicU64,
    /// Compare-and-set transitions lost to a concurrent callback
    pub lost_races: AtomicU64,
    /// Journal reads or writes that failed
    pub storage_errors: AtomicU64,
    /// After-saga callbacks received
    pub after_saga_notifications: AtomicU64,
}

impl ParticipantStats {
    /// All counters at zero
    pub fn new() -> Self {
        Self {
            joins: AtomicU64::new(0),
            join_rejections: AtomicU64::new(0),
            complete_requests: AtomicU64::new(0),
            mutations_applied: AtomicU64::new(0),
            mutations_failed: AtomicU64::new(0),
            duplicate_completes: AtomicU64::new(0),
            unknown_completes: AtomicU64::new(0),
            compensate_requests: AtomicU64::new(0),
            compensations: AtomicU64::new(0),
            rejected_compensations: AtomicU64::new(0),
            lost_races: AtomicU64::new(0),
            storage_errors: AtomicU64::new(0),
            after_saga_notifications: AtomicU64::new(0),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> ParticipantStatsSnapshot {
        ParticipantStatsSnapshot {
            joins: self.joins.load(Ordering::Relaxed),
            join_rejections: self.join_rejections.load(Ordering::Relaxed),
            complete_requests: self.complete_requests.load(Ordering::Relaxed),
            mutations_applied: self.mutations_applied.load(Ordering::Relaxed),
            mutations_failed: self.mutations_failed.load(Ordering::Relaxed),
            duplicate_completes: self.duplicate_completes.load(Ordering::Relaxed),
            unknown_completes: self.unknown_completes.load(Ordering::Relaxed),
            compensate_requests: self.compensate_requests.load(Ordering::Relaxed),
            compensations: self.compensations.load(Ordering::Relaxed),
            rejected_compensations: self.rejected_compensations.load(Ordering::Relaxed),
            lost_races: self.lost_races.load(Ordering::Relaxed),
            storage_errors: self.storage_errors.load(Ordering::Relaxed),
            after_saga_notifications: self.after_saga_notifications.load(Ordering::Relaxed),
        }
    }
}

impl Default for ParticipantStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain-value copy of [`ParticipantStats`]; fields mirror its counters
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParticipantStatsSnapshot {
    pub joins: u64,
    pub join_rejections: u64,
    pub complete_requests: u64,
    pub mutations_applied: u64,
    pub mutations_failed: u64,
    pub duplicate_completes: u64,
    pub unknown_completes: u64,
    pub compensate_requests: u64,
    pub compensations: u64,
    pub rejected_compensations: u64,
    pub lost_races: u64,
    pub storage_errors: u64,
    pub after_saga_notifications: u64,
}
