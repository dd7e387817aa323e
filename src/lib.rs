//! Coordinator-Driven SAGA Participant
//!
//! A participant joins a saga run by an external coordinator, journals its
//! intent, and later commits or undoes one local balance mutation when the
//! coordinator calls back. Callbacks may arrive any number of times and
//! concurrently; the journal's compare-and-set makes the mutation happen at
//! most once per `(saga, operation kind)`.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! // 1. Pick a journal and a ledger
//! let journal: Arc<dyn ParticipantJournal> = Arc::new(InMemoryJournal::new());
//! let ledger = Arc::new(InMemoryLedger::new());
//!
//! // 2. Build the participant
//! let participant = Arc::new(Participant::builder(journal, ledger).build());
//!
//! // 3. Expose one gateway per operation kind to the transport
//! let deposit = ParticipantGateway::new(participant.clone(), OperationKind::Deposit);
//! let response = deposit.complete("http://coordinator/saga/42").await;
//! ```

#![warn(missing_docs)]

// === Core Types ===
mod context;
mod errors;
mod state;

// === Configuration ===
mod config;

// === Storage ===
mod journal;
#[cfg(feature = "lmdb")]
mod lmdb;

// === Execution ===
mod ledger;
mod participant;

// === Coordinator Surface ===
mod gateway;

// === Observability ===
mod observer;
mod stats;

// === Re-exports ===

// Types
pub use context::{
    now_millis, AccountId, JournalKey, OperationKind, SagaId, MAX_SAGA_ID_BYTES,
};
pub use state::{ParticipantStatus, SagaOutcome};

// Errors
pub use errors::{JoinError, JournalError, MutationError};

// Configuration
#[cfg(feature = "lmdb")]
pub use config::LmdbJournalConfig;
pub use config::ParticipantConfig;

// Storage
pub use journal::{InMemoryJournal, JournalEntry, ParticipantJournal};
#[cfg(feature = "lmdb")]
pub use lmdb::LmdbJournal;

// Execution
pub use ledger::{InMemoryLedger, MutationExecutor};
pub use participant::{Clock, JoinRequest, Participant, ParticipantBuilder};

// Coordinator surface
pub use gateway::{CallbackResponse, ParticipantGateway};

// Observability
pub use observer::{NoOpObserver, ParticipantObserver, TracingObserver};
pub use stats::{ParticipantStats, ParticipantStatsSnapshot};
