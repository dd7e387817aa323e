//! The participant state machine.
//!
//! Every coordinator callback is answered from the journal. The only writes
//! are journal compare-and-sets along declared edges of
//! [`ParticipantStatus`], so two callbacks racing on one entry are decided by
//! whichever compare-and-set lands first; the loser reports the state the
//! winner left behind. No lock is held across the mutation.

use crate::{
    AccountId, JoinError, JournalEntry, JournalError, JournalKey, MutationExecutor,
    OperationKind, ParticipantConfig, ParticipantJournal, ParticipantObserver, ParticipantStats,
    ParticipantStatus, SagaId, SagaOutcome, TracingObserver, MAX_SAGA_ID_BYTES,
};
use std::sync::Arc;

/// Source of "now", in milliseconds since UNIX epoch
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Enlistment request
#[derive(Clone, Debug)]
pub struct JoinRequest {
    /// Saga being joined; must be non-blank
    pub saga_id: SagaId,
    /// Enclosing saga, if the coordinator nests them
    pub parent_saga_id: Option<SagaId>,
    /// Which journal the entry goes into
    pub kind: OperationKind,
    /// Account the mutation will apply to
    pub account_id: AccountId,
    /// Amount in minor units
    pub amount: u64,
}

/// A saga participant for one ledger.
///
/// Cheap to share behind an `Arc`; all methods take `&self` and may be
/// called concurrently. Journal and executor calls are blocking.
pub struct Participant {
    journal: Arc<dyn ParticipantJournal>,
    executor: Arc<dyn MutationExecutor>,
    observer: Arc<dyn ParticipantObserver>,
    stats: Arc<ParticipantStats>,
    config: ParticipantConfig,
    clock: Clock,
}

/// Builder for [`Participant`]
pub struct ParticipantBuilder {
    journal: Arc<dyn ParticipantJournal>,
    executor: Arc<dyn MutationExecutor>,
    observer: Arc<dyn ParticipantObserver>,
    stats: Arc<ParticipantStats>,
    config: ParticipantConfig,
    clock: Clock,
}

impl ParticipantBuilder {
    /// Replace the default [`TracingObserver`]
    pub fn observer(mut self, observer: Arc<dyn ParticipantObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Share an existing stats handle
    pub fn stats(mut self, stats: Arc<ParticipantStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Set tunables
    pub fn config(mut self, config: ParticipantConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the wall clock, mostly for tests
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Finish building
    pub fn build(self) -> Participant {
        Participant {
            journal: self.journal,
            executor: self.executor,
            observer: self.observer,
            stats: self.stats,
            config: self.config,
            clock: self.clock,
        }
    }
}

/// Why a journal transition did not happen
enum TransitionError {
    /// Another callback moved the entry first; carries its state
    Lost(ParticipantStatus),
    /// The journal could not be read or written
    Storage,
}

impl Participant {
    /// Start building a participant over `journal` and `executor`
    pub fn builder(
        journal: Arc<dyn ParticipantJournal>,
        executor: Arc<dyn MutationExecutor>,
    ) -> ParticipantBuilder {
        ParticipantBuilder {
            journal,
            executor,
            observer: Arc::new(TracingObserver),
            stats: Arc::new(ParticipantStats::new()),
            config: ParticipantConfig::default(),
            clock: Arc::new(crate::now_millis),
        }
    }

    /// Live counters
    pub fn stats(&self) -> &Arc<ParticipantStats> {
        &self.stats
    }

    /// The journal this participant writes to
    pub fn journal(&self) -> &Arc<dyn ParticipantJournal> {
        &self.journal
    }

    /// Record intent to take part in a saga.
    ///
    /// Creates an `Active` journal entry. The balance is not touched until
    /// the coordinator completes the saga, so cancelling costs nothing.
    pub fn join(&self, request: JoinRequest) -> Result<JournalEntry, JoinError> {
        let result = self.try_join(request);
        if let Err(error) = &result {
            ParticipantStats::incr(&self.stats.join_rejections);
            tracing::warn!(error = %error, "Join rejected");
        }
        result
    }

    fn try_join(&self, request: JoinRequest) -> Result<JournalEntry, JoinError> {
        if request.saga_id.is_blank() {
            return Err(JoinError::Validation("saga id is required".into()));
        }
        if request.saga_id.as_str().len() > MAX_SAGA_ID_BYTES {
            return Err(JoinError::Validation(
                format!("saga id exceeds {MAX_SAGA_ID_BYTES} bytes").into(),
            ));
        }
        if request.account_id.as_str().trim().is_empty() {
            return Err(JoinError::Validation("account id is required".into()));
        }

        let entry = JournalEntry::active(
            request.saga_id,
            request.parent_saga_id,
            request.kind,
            request.account_id,
            request.amount,
            (self.clock)(),
        );

        // Persist
        if let Err(error) = self.journal.create(entry.clone()) {
            if !matches!(error, JournalError::Conflict(_)) {
                self.storage_failure(&entry.key(), &error);
            }
            return Err(error.into());
        }

        ParticipantStats::incr(&self.stats.joins);
        self.observer.on_joined(&entry);
        Ok(entry)
    }

    /// Commit the journaled work. Idempotent; never errors.
    ///
    /// Returns `FailedToComplete` when nothing was applied and the
    /// coordinator may safely call again.
    pub fn complete(&self, saga_id: &SagaId, kind: OperationKind) -> ParticipantStatus {
        let key = JournalKey::new(saga_id.clone(), kind);
        ParticipantStats::incr(&self.stats.complete_requests);
        tracing::debug!(saga_id = %saga_id, %kind, "Complete called");

        let entry = match self.journal.get(&key) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                tracing::warn!(saga_id = %saga_id, %kind, "Journal entry does not exist, nothing to complete");
                ParticipantStats::incr(&self.stats.unknown_completes);
                return ParticipantStatus::Completed;
            }
            Err(error) => {
                self.storage_failure(&key, &error);
                return ParticipantStatus::FailedToComplete;
            }
        };

        if matches!(
            entry.state,
            ParticipantStatus::Completing | ParticipantStatus::Completed
        ) {
            ParticipantStats::incr(&self.stats.duplicate_completes);
            return entry.state;
        }

        // State: Active | FailedToComplete -> Completing
        let entry = match self.transition(&key, ParticipantStatus::Completing) {
            Ok(entry) => entry,
            Err(TransitionError::Lost(actual)) => return actual,
            Err(TransitionError::Storage) => return ParticipantStatus::FailedToComplete,
        };

        // This caller now owns the entry until it leaves Completing
        match self.executor.apply(&entry.account_id, entry.amount, kind) {
            Ok(()) => {
                ParticipantStats::incr(&self.stats.mutations_applied);

                // State: Completing -> Completed
                match self.transition(&key, ParticipantStatus::Completed) {
                    Ok(completed) => {
                        let duration = completed
                            .updated_at_millis
                            .saturating_sub(entry.updated_at_millis);
                        self.observer.on_completed(&completed, duration);
                        ParticipantStatus::Completed
                    }
                    Err(TransitionError::Lost(actual)) => actual,
                    // Applied but not recorded: the entry stays Completing so
                    // a retry can never apply it twice
                    Err(TransitionError::Storage) => ParticipantStatus::Completing,
                }
            }
            Err(error) => {
                ParticipantStats::incr(&self.stats.mutations_failed);

                // State: Completing -> FailedToComplete
                match self.transition(&key, ParticipantStatus::FailedToComplete) {
                    Ok(failed) => {
                        self.observer.on_complete_failed(&failed, &error);
                        ParticipantStatus::FailedToComplete
                    }
                    Err(TransitionError::Lost(actual)) => actual,
                    // Still claimed in the journal, so re-drives short-circuit
                    // until `stalled_entries` surfaces it
                    Err(TransitionError::Storage) => ParticipantStatus::Completing,
                }
            }
        }
    }

    /// Undo the journaled work. Idempotent; never errors.
    ///
    /// Work is only applied on completion, so compensating an entry that
    /// never completed just marks it. An entry that has already completed is
    /// not reversed: its `Completed` state is reported back instead.
    pub fn compensate(&self, saga_id: &SagaId, kind: OperationKind) -> ParticipantStatus {
        let key = JournalKey::new(saga_id.clone(), kind);
        ParticipantStats::incr(&self.stats.compensate_requests);
        tracing::debug!(saga_id = %saga_id, %kind, "Compensate called");

        let entry = match self.journal.get(&key) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                tracing::info!(saga_id = %saga_id, %kind, "Journal entry does not exist, nothing to compensate");
                return ParticipantStatus::Compensated;
            }
            Err(error) => {
                self.storage_failure(&key, &error);
                return ParticipantStatus::Compensating;
            }
        };

        match entry.state {
            ParticipantStatus::Compensating | ParticipantStatus::Compensated => return entry.state,
            ParticipantStatus::Completing => {
                tracing::debug!(saga_id = %saga_id, %kind, "Completion in flight, not compensating");
                return ParticipantStatus::Completing;
            }
            ParticipantStatus::Completed => {
                tracing::warn!(saga_id = %saga_id, %kind, account = %entry.account_id, "Work already completed, refusing to compensate");
                ParticipantStats::incr(&self.stats.rejected_compensations);
                return ParticipantStatus::Completed;
            }
            ParticipantStatus::Active | ParticipantStatus::FailedToComplete => {}
        }

        // State: Active | FailedToComplete -> Compensated
        match self.transition(&key, ParticipantStatus::Compensated) {
            Ok(compensated) => {
                ParticipantStats::incr(&self.stats.compensations);
                self.observer.on_compensated(&compensated);
                ParticipantStatus::Compensated
            }
            Err(TransitionError::Lost(actual)) => actual,
            Err(TransitionError::Storage) => ParticipantStatus::Compensating,
        }
    }

    /// Current state of an entry, or `None` if this participant never joined
    pub fn status(
        &self,
        saga_id: &SagaId,
        kind: OperationKind,
    ) -> Result<Option<ParticipantStatus>, JournalError> {
        let key = JournalKey::new(saga_id.clone(), kind);
        Ok(self.journal.get(&key)?.map(|entry| entry.state))
    }

    /// The saga has concluded. Bookkeeping only: state is never changed,
    /// and unknown sagas are ignored. Covers every operation kind.
    pub fn after_saga(&self, saga_id: &SagaId, outcome: &SagaOutcome) {
        ParticipantStats::incr(&self.stats.after_saga_notifications);
        for kind in OperationKind::ALL {
            self.conclude(&JournalKey::new(saga_id.clone(), kind), outcome);
        }
    }

    /// [`after_saga`](Self::after_saga) for a single operation kind
    pub fn after_saga_for(&self, saga_id: &SagaId, kind: OperationKind, outcome: &SagaOutcome) {
        ParticipantStats::incr(&self.stats.after_saga_notifications);
        self.conclude(&JournalKey::new(saga_id.clone(), kind), outcome);
    }

    fn conclude(&self, key: &JournalKey, outcome: &SagaOutcome) {
        let entry = match self.journal.get(key) {
            Ok(Some(entry)) => entry,
            Ok(None) => return,
            Err(error) => {
                self.storage_failure(key, &error);
                return;
            }
        };

        match outcome.expected_status() {
            Some(expected) if entry.state != expected => {
                tracing::warn!(
                    saga_id = %entry.saga_id,
                    kind = %entry.kind,
                    state = %entry.state,
                    outcome = %outcome,
                    "Participant state diverges from saga outcome"
                );
            }
            _ => {}
        }

        self.observer.on_after_saga(&entry, outcome);
    }

    /// Entries stuck in `Completing` or `Compensating` for longer than the
    /// stall threshold, usually left by a crash mid-callback.
    ///
    /// Report only. For a stalled `Completing` entry it is unknown whether
    /// the mutation landed, so resolving it is left to an operator.
    pub fn stalled_entries(&self) -> Result<Vec<JournalEntry>, JournalError> {
        let now = (self.clock)();
        let threshold = self.config.stall_threshold_millis();

        let stalled: Vec<JournalEntry> = self
            .journal
            .list()?
            .into_iter()
            .filter(|entry| {
                entry.state.is_transitional()
                    && now.saturating_sub(entry.updated_at_millis) >= threshold
            })
            .collect();

        for entry in &stalled {
            tracing::warn!(
                saga_id = %entry.saga_id,
                kind = %entry.kind,
                state = %entry.state,
                idle_ms = now.saturating_sub(entry.updated_at_millis),
                "Stalled journal entry"
            );
        }

        Ok(stalled)
    }

    fn transition(
        &self,
        key: &JournalKey,
        to: ParticipantStatus,
    ) -> Result<JournalEntry, TransitionError> {
        match self
            .journal
            .compare_and_set_state(key, to.predecessors(), to, (self.clock)())
        {
            Ok(entry) => Ok(entry),
            Err(JournalError::StaleState { actual, .. }) => {
                tracing::debug!(saga_id = %key.saga_id, kind = %key.kind, %actual, target = %to, "Lost transition race");
                ParticipantStats::incr(&self.stats.lost_races);
                Err(TransitionError::Lost(actual))
            }
            Err(error) => {
                self.storage_failure(key, &error);
                Err(TransitionError::Storage)
            }
        }
    }

    fn storage_failure(&self, key: &JournalKey, error: &JournalError) {
        ParticipantStats::incr(&self.stats.storage_errors);
        tracing::error!(saga_id = %key.saga_id, kind = %key.kind, error = %error, "Journal operation failed");
    }
}
