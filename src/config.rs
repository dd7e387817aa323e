//! Participant configuration

use std::time::Duration;

/// Tunables for a [`Participant`](crate::Participant)
#[derive(Clone, Debug)]
pub struct ParticipantConfig {
    /// How long an entry may sit in `Completing` or `Compensating` before
    /// `stalled_entries` reports it
    pub stall_threshold: Duration,
}

impl Default for ParticipantConfig {
    fn default() -> Self {
        Self {
            stall_threshold: Duration::from_secs(60),
        }
    }
}

impl ParticipantConfig {
    /// [`stall_threshold`](Self::stall_threshold) in milliseconds, saturating
    pub fn stall_threshold_millis(&self) -> u64 {
        u64::try_from(self.stall_threshold.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Location and sizing of an LMDB-backed journal
#[cfg(feature = "lmdb")]
#[derive(Clone, Debug)]
pub struct LmdbJournalConfig {
    /// Directory holding the LMDB environment; must exist
    pub path: std::path::PathBuf,
    /// Upper bound on the memory map, and so on the journal's size
    pub map_size_bytes: usize,
}

#[cfg(feature = "lmdb")]
impl LmdbJournalConfig {
    /// Journal under `path` with a 64 MiB map
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            path: path.into(),
            map_size_bytes: 64 * 1024 * 1024,
        }
    }
}
