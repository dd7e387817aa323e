//! Saga correlation and identity types

use serde::{Deserialize, Serialize};

/// Longest saga id accepted at Join, in bytes. Journal keys are the saga id
/// plus a short kind suffix and must fit LMDB's 511-byte key limit.
pub const MAX_SAGA_ID_BYTES: usize = 480;

/// Coordinator-issued saga identifier.
///
/// Opaque to the participant: in practice it is often the coordinator's URL
/// for the saga, so it is carried as a string and never parsed.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SagaId(pub Box<str>);

impl SagaId {
    /// Create a new saga ID
    pub fn new(id: impl Into<Box<str>>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the ID carries no correlation information
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for SagaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SagaId({})", self.0)
    }
}

impl std::fmt::Display for SagaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the account a mutation applies to
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub Box<str>);

impl AccountId {
    /// Create a new account ID
    pub fn new(id: impl Into<Box<str>>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The local operation a journal entry governs.
///
/// One account can take part in the same saga through several independent
/// journals, one per kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperationKind {
    /// Credit the account
    Deposit,
    /// Debit the account
    Withdraw,
}

impl OperationKind {
    /// Every kind, in key order
    pub const ALL: [OperationKind; 2] = [OperationKind::Deposit, OperationKind::Withdraw];

    /// Wire and key name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "DEPOSIT",
            Self::Withdraw => "WITHDRAW",
        }
    }

    /// Stable numeric tag used by persistent journals
    pub fn code(&self) -> u8 {
        match self {
            Self::Deposit => 0,
            Self::Withdraw => 1,
        }
    }

    /// Inverse of [`code`](Self::code)
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Deposit),
            1 => Some(Self::Withdraw),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Journal key: one entry per `(saga, kind)` pair
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JournalKey {
    /// The saga this entry belongs to
    pub saga_id: SagaId,
    /// The operation the entry governs
    pub kind: OperationKind,
}

impl JournalKey {
    /// Key for `saga_id`'s entry of the given kind
    pub fn new(saga_id: SagaId, kind: OperationKind) -> Self {
        Self { saga_id, kind }
    }
}

impl std::fmt::Display for JournalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.saga_id, self.kind)
    }
}

/// Get current time in milliseconds since UNIX epoch
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_saga_id() {
        assert!(SagaId::new("").is_blank());
        assert!(SagaId::new("  \t").is_blank());
        assert!(!SagaId::new("http://coordinator/lra/1").is_blank());
    }

    #[test]
    fn test_operation_kind_codes() {
        for kind in OperationKind::ALL {
            assert_eq!(OperationKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(OperationKind::from_code(7), None);
    }

    #[test]
    fn test_journal_key_display() {
        let key = JournalKey::new(SagaId::new("S1"), OperationKind::Withdraw);
        assert_eq!(key.to_string(), "S1[WITHDRAW]");
    }
}
