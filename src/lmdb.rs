//! LMDB-backed participant journal.
//!
//! One named database maps `saga_id \x1f KIND` to an rkyv-encoded record.
//! LMDB admits a single writer at a time, so a compare-and-set done inside
//! one write transaction is atomic across threads and processes.

use crate::{
    AccountId, JournalEntry, JournalError, JournalKey, LmdbJournalConfig, OperationKind,
    ParticipantJournal, ParticipantStatus, SagaId,
};
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};

const DB_NAME: &str = "participant_journal";
const KEY_SEPARATOR: char = '\u{1f}';

/// On-disk record. Kept apart from [`JournalEntry`] so the public type
/// stays free of storage derives.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
struct StoredEntry {
    saga_id: String,
    parent_saga_id: Option<String>,
    kind: u8,
    account_id: String,
    amount: u64,
    state: u8,
    created_at_millis: u64,
    updated_at_millis: u64,
}

impl From<&JournalEntry> for StoredEntry {
    fn from(entry: &JournalEntry) -> Self {
        Self {
            saga_id: entry.saga_id.as_str().to_owned(),
            parent_saga_id: entry.parent_saga_id.as_ref().map(|p| p.as_str().to_owned()),
            kind: entry.kind.code(),
            account_id: entry.account_id.as_str().to_owned(),
            amount: entry.amount,
            state: entry.state.code(),
            created_at_millis: entry.created_at_millis,
            updated_at_millis: entry.updated_at_millis,
        }
    }
}

impl StoredEntry {
    fn into_entry(self) -> Result<JournalEntry, JournalError> {
        let kind = OperationKind::from_code(self.kind).ok_or_else(|| {
            JournalError::Storage(format!("unknown operation kind {}", self.kind).into())
        })?;
        let state = ParticipantStatus::from_code(self.state).ok_or_else(|| {
            JournalError::Storage(format!("unknown participant status {}", self.state).into())
        })?;
        Ok(JournalEntry {
            saga_id: SagaId::new(self.saga_id),
            parent_saga_id: self.parent_saga_id.map(SagaId::new),
            kind,
            account_id: AccountId::new(self.account_id),
            amount: self.amount,
            state,
            created_at_millis: self.created_at_millis,
            updated_at_millis: self.updated_at_millis,
        })
    }
}

/// Durable journal in an LMDB environment
pub struct LmdbJournal {
    env: Env,
    db: Database<Str, Bytes>,
}

impl LmdbJournal {
    /// Open (creating if needed) the journal database under `config.path`
    pub fn open(config: &LmdbJournalConfig) -> Result<Self, JournalError> {
        // SAFETY: the environment is opened once per path by this process
        // and never truncated or modified outside LMDB.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(config.map_size_bytes)
                .max_dbs(1)
                .open(&config.path)
        }
        .map_err(storage)?;

        let mut wtxn = env.write_txn().map_err(storage)?;
        let db: Database<Str, Bytes> = env
            .create_database(&mut wtxn, Some(DB_NAME))
            .map_err(storage)?;
        wtxn.commit().map_err(storage)?;

        tracing::debug!(path = %config.path.display(), "Opened LMDB journal");
        Ok(Self { env, db })
    }
}

fn storage(error: impl std::fmt::Display) -> JournalError {
    JournalError::Storage(error.to_string().into())
}

fn encode_key(key: &JournalKey) -> String {
    format!("{}{}{}", key.saga_id, KEY_SEPARATOR, key.kind.as_str())
}

fn encode(entry: &JournalEntry) -> Result<rkyv::util::AlignedVec, JournalError> {
    rkyv::to_bytes::<rkyv::rancor::Error>(&StoredEntry::from(entry)).map_err(storage)
}

fn decode(bytes: &[u8]) -> Result<JournalEntry, JournalError> {
    // LMDB hands out pages with no alignment guarantee
    let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
    aligned.extend_from_slice(bytes);
    let stored = rkyv::from_bytes::<StoredEntry, rkyv::rancor::Error>(&aligned).map_err(storage)?;
    stored.into_entry()
}

impl ParticipantJournal for LmdbJournal {
    fn create(&self, entry: JournalEntry) -> Result<(), JournalError> {
        let key = entry.key();
        let encoded_key = encode_key(&key);
        let value = encode(&entry)?;

        let mut wtxn = self.env.write_txn().map_err(storage)?;
        if self.db.get(&wtxn, &encoded_key).map_err(storage)?.is_some() {
            return Err(JournalError::Conflict(key));
        }
        self.db
            .put(&mut wtxn, &encoded_key, &value)
            .map_err(storage)?;
        wtxn.commit().map_err(storage)
    }

    fn get(&self, key: &JournalKey) -> Result<Option<JournalEntry>, JournalError> {
        let rtxn = self.env.read_txn().map_err(storage)?;
        self.db
            .get(&rtxn, &encode_key(key))
            .map_err(storage)?
            .map(decode)
            .transpose()
    }

    fn compare_and_set_state(
        &self,
        key: &JournalKey,
        expected: &[ParticipantStatus],
        new_state: ParticipantStatus,
        now_millis: u64,
    ) -> Result<JournalEntry, JournalError> {
        let encoded_key = encode_key(key);

        let mut wtxn = self.env.write_txn().map_err(storage)?;
        let mut entry = match self.db.get(&wtxn, &encoded_key).map_err(storage)? {
            Some(bytes) => decode(bytes)?,
            None => return Err(JournalError::NotFound(key.clone())),
        };

        if !expected.contains(&entry.state) {
            return Err(JournalError::StaleState {
                key: key.clone(),
                actual: entry.state,
            });
        }

        entry.state = new_state;
        entry.updated_at_millis = now_millis;
        let value = encode(&entry)?;
        self.db
            .put(&mut wtxn, &encoded_key, &value)
            .map_err(storage)?;
        wtxn.commit().map_err(storage)?;
        Ok(entry)
    }

    fn list(&self) -> Result<Vec<JournalEntry>, JournalError> {
        let rtxn = self.env.read_txn().map_err(storage)?;
        let mut entries = Vec::new();
        for item in self.db.iter(&rtxn).map_err(storage)? {
            let (_, bytes) = item.map_err(storage)?;
            entries.push(decode(bytes)?);
        }
        Ok(entries)
    }
}
