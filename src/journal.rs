//! Participant journal storage trait

use crate::{AccountId, JournalError, JournalKey, OperationKind, ParticipantStatus, SagaId};
use serde::{Deserialize, Serialize};

/// Journal storage trait.
///
/// `compare_and_set_state` is the only write after `create`, and the only
/// point where concurrent callbacks for one key are serialized.
pub trait ParticipantJournal: Send + Sync + 'static {
    /// Insert a new entry. Fails with `Conflict` if the key exists.
    fn create(&self, entry: JournalEntry) -> Result<(), JournalError>;

    /// Read one entry
    fn get(&self, key: &JournalKey) -> Result<Option<JournalEntry>, JournalError>;

    /// Atomically move the entry to `new_state` if its current state is in
    /// `expected`, stamping `updated_at_millis`. Returns the updated entry.
    fn compare_and_set_state(
        &self,
        key: &JournalKey,
        expected: &[ParticipantStatus],
        new_state: ParticipantStatus,
        now_millis: u64,
    ) -> Result<JournalEntry, JournalError>;

    /// Every entry, in no particular order
    fn list(&self) -> Result<Vec<JournalEntry>, JournalError>;
}

/// One participant's record of one operation in one saga.
///
/// Everything but `state` and `updated_at_millis` is write-once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Saga this entry belongs to
    pub saga_id: SagaId,
    /// Enclosing saga for nested sagas; carried, not interpreted
    pub parent_saga_id: Option<SagaId>,
    /// Operation the entry governs
    pub kind: OperationKind,
    /// Account the mutation applies to
    pub account_id: AccountId,
    /// Magnitude of the pending mutation, in minor units
    pub amount: u64,
    /// Current lifecycle state
    pub state: ParticipantStatus,
    /// When the entry was joined
    pub created_at_millis: u64,
    /// When `state` last changed
    pub updated_at_millis: u64,
}

impl JournalEntry {
    /// A freshly joined entry
    pub fn active(
        saga_id: SagaId,
        parent_saga_id: Option<SagaId>,
        kind: OperationKind,
        account_id: AccountId,
        amount: u64,
        now_millis: u64,
    ) -> Self {
        Self {
            saga_id,
            parent_saga_id,
            kind,
            account_id,
            amount,
            state: ParticipantStatus::Active,
            created_at_millis: now_millis,
            updated_at_millis: now_millis,
        }
    }

    /// Key this entry is stored under
    pub fn key(&self) -> JournalKey {
        JournalKey::new(self.saga_id.clone(), self.kind)
    }
}

/// In-memory journal for testing and embedding
pub struct InMemoryJournal {
    data: std::sync::RwLock<std::collections::HashMap<JournalKey, JournalEntry>>,
}

impl InMemoryJournal {
    /// Empty journal
    pub fn new() -> Self {
        Self {
            data: std::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }
}

impl ParticipantJournal for InMemoryJournal {
    fn create(&self, entry: JournalEntry) -> Result<(), JournalError> {
        let mut data = self.data.write().map_err(|e| JournalError::Storage(e.to_string().into()))?;
        match data.entry(entry.key()) {
            std::collections::hash_map::Entry::Occupied(occupied) => {
                Err(JournalError::Conflict(occupied.key().clone()))
            }
            std::collections::hash_map::Entry::Vacant(vacant) => {
                vacant.insert(entry);
                Ok(())
            }
        }
    }

    fn get(&self, key: &JournalKey) -> Result<Option<JournalEntry>, JournalError> {
        let data = self.data.read().map_err(|e| JournalError::Storage(e.to_string().into()))?;
        Ok(data.get(key).cloned())
    }

    fn compare_and_set_state(
        &self,
        key: &JournalKey,
        expected: &[ParticipantStatus],
        new_state: ParticipantStatus,
        now_millis: u64,
    ) -> Result<JournalEntry, JournalError> {
        let mut data = self.data.write().map_err(|e| JournalError::Storage(e.to_string().into()))?;
        let entry = data
            .get_mut(key)
            .ok_or_else(|| JournalError::NotFound(key.clone()))?;

        if !expected.contains(&entry.state) {
            return Err(JournalError::StaleState {
                key: key.clone(),
                actual: entry.state,
            });
        }

        entry.state = new_state;
        entry.updated_at_millis = now_millis;
        Ok(entry.clone())
    }

    fn list(&self) -> Result<Vec<JournalEntry>, JournalError> {
        let data = self.data.read().map_err(|e| JournalError::Storage(e.to_string().into()))?;
        let mut entries: Vec<_> = data.values().cloned().collect();
        entries.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(entries)
    }
}

impl Default for InMemoryJournal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ParticipantStatus::*;

    fn entry(saga: &str, kind: OperationKind) -> JournalEntry {
        JournalEntry::active(SagaId::new(saga), None, kind, AccountId::new("acct-A"), 100, 1_000)
    }

    #[test]
    fn test_create_conflict_leaves_existing_entry() {
        let journal = InMemoryJournal::new();
        journal.create(entry("S1", OperationKind::Deposit)).unwrap();

        let mut duplicate = entry("S1", OperationKind::Deposit);
        duplicate.amount = 999;
        let err = journal.create(duplicate).unwrap_err();
        assert!(matches!(err, JournalError::Conflict(_)));

        let key = JournalKey::new(SagaId::new("S1"), OperationKind::Deposit);
        assert_eq!(journal.get(&key).unwrap().unwrap().amount, 100);
    }

    #[test]
    fn test_same_saga_different_kinds_are_independent() {
        let journal = InMemoryJournal::new();
        journal.create(entry("S1", OperationKind::Deposit)).unwrap();
        journal.create(entry("S1", OperationKind::Withdraw)).unwrap();
        assert_eq!(journal.list().unwrap().len(), 2);
    }

    #[test]
    fn test_compare_and_set() {
        let journal = InMemoryJournal::new();
        journal.create(entry("S1", OperationKind::Deposit)).unwrap();
        let key = JournalKey::new(SagaId::new("S1"), OperationKind::Deposit);

        let updated = journal
            .compare_and_set_state(&key, &[Active], Completing, 2_000)
            .unwrap();
        assert_eq!(updated.state, Completing);
        assert_eq!(updated.updated_at_millis, 2_000);
        assert_eq!(updated.created_at_millis, 1_000);

        let err = journal
            .compare_and_set_state(&key, &[Active], Compensated, 3_000)
            .unwrap_err();
        match err {
            JournalError::StaleState { actual, .. } => assert_eq!(actual, Completing),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(journal.get(&key).unwrap().unwrap().updated_at_millis, 2_000);
    }

    #[test]
    fn test_compare_and_set_missing() {
        let journal = InMemoryJournal::new();
        let key = JournalKey::new(SagaId::new("nope"), OperationKind::Deposit);
        assert!(journal.get(&key).unwrap().is_none());
        assert!(matches!(
            journal.compare_and_set_state(&key, &[Active], Completing, 1),
            Err(JournalError::NotFound(_))
        ));
    }
}
