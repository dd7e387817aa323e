//! Error types for journaling, mutation and enlistment

use crate::{JournalKey, ParticipantStatus};

/// Journal storage error
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// `create` found an entry for the key already
    #[error("Entry already exists: {0}")]
    Conflict(JournalKey),
    /// Compare-and-set on a key with no entry
    #[error("Not found: {0}")]
    NotFound(JournalKey),
    /// Compare-and-set lost: the entry is no longer in an expected state.
    /// Carries what the store observed, so callers need not re-read.
    #[error("Stale state for {key}: entry is {actual}")]
    StaleState {
        /// Entry key
        key: JournalKey,
        /// State found at the time of the compare
        actual: ParticipantStatus,
    },
    /// The backing store failed
    #[error("Storage error: {0}")]
    Storage(Box<str>),
}

/// Error from applying a local mutation.
///
/// All variants are recoverable from the coordinator's point of view: the
/// entry is reported `FailedToComplete` and Complete may be re-driven.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    /// No such account
    #[error("Account not found: {0}")]
    AccountNotFound(Box<str>),
    /// A withdrawal would take the balance below zero
    #[error("Insufficient funds in {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Account debited
        account: Box<str>,
        /// Balance before the attempt
        balance: u64,
        /// Amount asked for
        requested: u64,
    },
    /// A deposit would overflow the balance
    #[error("Balance overflow in {0}")]
    Overflow(Box<str>),
    /// The ledger itself is unavailable
    #[error("Backend error: {0}")]
    Backend(Box<str>),
}

/// Rejection of a Join request. These are the coordinator's (or
/// initiator's) own protocol mistakes and are returned to it as-is.
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    /// Request is malformed; nothing was journaled
    #[error("Invalid join request: {0}")]
    Validation(Box<str>),
    /// Already joined; the existing entry is untouched
    #[error("Already joined: {0}")]
    Conflict(JournalKey),
    /// The journal could not record the entry
    #[error("Storage error: {0}")]
    Storage(Box<str>),
}

impl From<JournalError> for JoinError {
    fn from(error: JournalError) -> Self {
        match error {
            JournalError::Conflict(key) => Self::Conflict(key),
            other => Self::Storage(other.to_string().into()),
        }
    }
}
