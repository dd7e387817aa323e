//! Participant status and the declared transition table

use serde::{Deserialize, Serialize};

/// Lifecycle state of one journal entry, as reported to the coordinator.
///
/// ```text
/// Active ──► Completing ──► Completed
///   │            │
///   │            └────────► FailedToComplete ──► Completing (re-driven)
///   │                              │
///   ├──► Compensating ──► Compensated ◄──────────┘
///   └─────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantStatus {
    /// Joined; intent recorded, nothing applied
    Active,
    /// Commit claimed; the mutation is in flight
    Completing,
    /// Mutation applied
    Completed,
    /// Mutation failed; nothing applied, may be re-driven
    FailedToComplete,
    /// Undo in progress
    Compensating,
    /// Undone (or never applied)
    Compensated,
}

impl ParticipantStatus {
    /// States an entry may move into from `self`.
    pub fn successors(&self) -> &'static [ParticipantStatus] {
        use ParticipantStatus::*;
        match self {
            Active => &[Completing, Compensating, Compensated],
            Completing => &[Completed, FailedToComplete],
            FailedToComplete => &[Completing, Compensated],
            Compensating => &[Compensated],
            Completed | Compensated => &[],
        }
    }

    /// States from which an entry may move into `self`.
    ///
    /// Used as the expected-state list of a journal compare-and-set, so a
    /// transition can only ever be persisted along a declared edge.
    pub fn predecessors(&self) -> &'static [ParticipantStatus] {
        use ParticipantStatus::*;
        match self {
            Active => &[],
            Completing => &[Active, FailedToComplete],
            Completed | FailedToComplete => &[Completing],
            Compensating => &[Active],
            Compensated => &[Active, FailedToComplete, Compensating],
        }
    }

    /// `next` is a declared successor of `self`
    pub fn can_transition_to(&self, next: ParticipantStatus) -> bool {
        self.successors().contains(&next)
    }

    /// No further transitions are possible
    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }

    /// Waiting on an in-flight callback; a crash here leaves the entry stalled
    pub fn is_transitional(&self) -> bool {
        matches!(self, Self::Completing | Self::Compensating)
    }

    /// Name reported to the coordinator
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Completing => "Completing",
            Self::Completed => "Completed",
            Self::FailedToComplete => "FailedToComplete",
            Self::Compensating => "Compensating",
            Self::Compensated => "Compensated",
        }
    }

    /// Stable numeric tag used by persistent journals
    pub fn code(&self) -> u8 {
        match self {
            Self::Active => 0,
            Self::Completing => 1,
            Self::Completed => 2,
            Self::FailedToComplete => 3,
            Self::Compensating => 4,
            Self::Compensated => 5,
        }
    }

    /// Inverse of [`code`](Self::code)
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Active,
            1 => Self::Completing,
            2 => Self::Completed,
            3 => Self::FailedToComplete,
            4 => Self::Compensating,
            5 => Self::Compensated,
            _ => return None,
        })
    }
}

impl std::fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the coordinator concluded the saga as a whole.
///
/// Delivered with the after-saga notification. Independent of this
/// participant's own state, which is why a mismatch is only logged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SagaOutcome {
    /// Every participant completed
    Closed,
    /// Every participant compensated
    Cancelled,
    /// Some participant could not complete
    FailedToClose,
    /// Some participant could not compensate
    FailedToCancel,
    /// Anything the coordinator sent that we do not recognise
    Unknown(Box<str>),
}

impl SagaOutcome {
    /// Parse the coordinator's outcome text. Never fails: after-saga must
    /// be acknowledged whatever it carries.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().trim_matches('"') {
            "Closed" => Self::Closed,
            "Cancelled" => Self::Cancelled,
            "FailedToClose" => Self::FailedToClose,
            "FailedToCancel" => Self::FailedToCancel,
            other => Self::Unknown(other.into()),
        }
    }

    /// The local state a participant should have reached for this outcome
    pub fn expected_status(&self) -> Option<ParticipantStatus> {
        match self {
            Self::Closed => Some(ParticipantStatus::Completed),
            Self::Cancelled => Some(ParticipantStatus::Compensated),
            _ => None,
        }
    }
}

impl std::fmt::Display for SagaOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => f.write_str("Closed"),
            Self::Cancelled => f.write_str("Cancelled"),
            Self::FailedToClose => f.write_str("FailedToClose"),
            Self::FailedToCancel => f.write_str("FailedToCancel"),
            Self::Unknown(raw) => write!(f, "Unknown({raw})"),
        }
    }
}
