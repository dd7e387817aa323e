//! Participant observer trait

use crate::{JournalEntry, MutationError, SagaOutcome};

/// Observer trait for notification publication and retention bookkeeping.
///
/// Called after the corresponding transition has been persisted.
pub trait ParticipantObserver: Send + Sync + 'static {
    /// A new entry was journaled
    fn on_joined(&self, entry: &JournalEntry);
    /// The mutation was applied and recorded; `duration_millis` runs from
    /// the claim to the record
    fn on_completed(&self, entry: &JournalEntry, duration_millis: u64);
    /// The executor refused the mutation
    fn on_complete_failed(&self, entry: &JournalEntry, error: &MutationError);
    /// The entry was marked compensated
    fn on_compensated(&self, entry: &JournalEntry);
    /// The saga has concluded; `entry` is this participant's final record.
    /// Retention or archival policies hook in here.
    fn on_after_saga(&self, entry: &JournalEntry, outcome: &SagaOutcome);
}

/// No-op observer
pub struct NoOpObserver;

impl ParticipantObserver for NoOpObserver {
    fn on_joined(&self, _entry: &JournalEntry) {}
    fn on_completed(&self, _entry: &JournalEntry, _duration_millis: u64) {}
    fn on_complete_failed(&self, _entry: &JournalEntry, _error: &MutationError) {}
    fn on_compensated(&self, _entry: &JournalEntry) {}
    fn on_after_saga(&self, _entry: &JournalEntry, _outcome: &SagaOutcome) {}
}

/// Tracing-based observer
pub struct TracingObserver;

impl ParticipantObserver for TracingObserver {
    fn on_joined(&self, entry: &JournalEntry) {
        tracing::info!(saga_id = %entry.saga_id, kind = %entry.kind, account = %entry.account_id, amount = entry.amount, "Joined saga");
    }

    fn on_completed(&self, entry: &JournalEntry, duration_millis: u64) {
        tracing::info!(saga_id = %entry.saga_id, kind = %entry.kind, account = %entry.account_id, duration_ms = duration_millis, "Work completed");
    }

    fn on_complete_failed(&self, entry: &JournalEntry, error: &MutationError) {
        tracing::warn!(saga_id = %entry.saga_id, kind = %entry.kind, error = %error, "Work failed to complete");
    }

    fn on_compensated(&self, entry: &JournalEntry) {
        tracing::info!(saga_id = %entry.saga_id, kind = %entry.kind, "Work compensated");
    }

    fn on_after_saga(&self, entry: &JournalEntry, outcome: &SagaOutcome) {
        tracing::info!(saga_id = %entry.saga_id, kind = %entry.kind, state = %entry.state, outcome = %outcome, "Saga ended");
    }
}
