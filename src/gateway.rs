//! Coordinator-facing callback surface.
//!
//! A transport (an HTTP router, a message consumer) parses the coordinator's
//! request and hands the raw values to a [`ParticipantGateway`]; the
//! [`CallbackResponse`] it gets back carries the status code and body to send.
//! Journal and ledger calls block, so each callback runs on tokio's blocking
//! pool.

use crate::{
    AccountId, JoinError, JoinRequest, OperationKind, Participant, ParticipantStatus, SagaId,
    SagaOutcome,
};
use http::StatusCode;
use std::sync::Arc;

/// What to send back to the coordinator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackResponse {
    /// HTTP status to answer with
    pub status: StatusCode,
    /// Participant status reported in the body, if any
    pub participant_status: Option<ParticipantStatus>,
    /// Human readable reason for a rejection
    pub message: Option<Box<str>>,
}

impl CallbackResponse {
    fn ok(participant_status: ParticipantStatus) -> Self {
        Self {
            status: StatusCode::OK,
            participant_status: Some(participant_status),
            message: None,
        }
    }

    fn ack() -> Self {
        Self {
            status: StatusCode::OK,
            participant_status: None,
            message: None,
        }
    }

    fn rejected(status: StatusCode, message: impl Into<Box<str>>) -> Self {
        Self {
            status,
            participant_status: None,
            message: Some(message.into()),
        }
    }

    /// Body text: the participant status name, else the rejection reason
    pub fn body(&self) -> &str {
        match (&self.participant_status, &self.message) {
            (Some(status), _) => status.as_str(),
            (None, Some(message)) => &**message,
            (None, None) => "",
        }
    }
}

/// Callback endpoints for one operation kind, e.g. the deposit resource
#[derive(Clone)]
pub struct ParticipantGateway {
    participant: Arc<Participant>,
    kind: OperationKind,
}

impl ParticipantGateway {
    /// Gateway serving `kind` callbacks for `participant`
    pub fn new(participant: Arc<Participant>, kind: OperationKind) -> Self {
        Self { participant, kind }
    }

    /// Operation kind this gateway serves
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Enlist in a saga. `saga_id` is `None` when the request carried no
    /// saga context at all.
    pub async fn join(
        &self,
        saga_id: Option<&str>,
        parent_saga_id: Option<&str>,
        account_id: &str,
        amount: u64,
    ) -> CallbackResponse {
        let Some(saga_id) = saga_id else {
            return CallbackResponse::rejected(StatusCode::BAD_REQUEST, "missing saga context");
        };
        let request = JoinRequest {
            saga_id: SagaId::new(saga_id),
            parent_saga_id: parent_saga_id.map(SagaId::new),
            kind: self.kind,
            account_id: AccountId::new(account_id),
            amount,
        };

        match self.run(move |p| p.join(request)).await {
            Some(Ok(entry)) => CallbackResponse::ok(entry.state),
            Some(Err(error)) => {
                let status = match &error {
                    JoinError::Validation(_) => StatusCode::BAD_REQUEST,
                    JoinError::Conflict(_) => StatusCode::CONFLICT,
                    JoinError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
                };
                CallbackResponse::rejected(status, error.to_string())
            }
            None => Self::worker_lost(),
        }
    }

    /// Complete callback. 200 with the participant status, 500 only if the
    /// worker task died.
    pub async fn complete(&self, saga_id: &str) -> CallbackResponse {
        let saga_id = SagaId::new(saga_id);
        let kind = self.kind;
        match self.run(move |p| p.complete(&saga_id, kind)).await {
            Some(status) => CallbackResponse::ok(status),
            None => Self::worker_lost(),
        }
    }

    /// Always answers 200. If the worker dies the coordinator is told the
    /// compensation is still in progress, so it calls again.
    pub async fn compensate(&self, saga_id: &str) -> CallbackResponse {
        let saga_id = SagaId::new(saga_id);
        let kind = self.kind;
        let status = self
            .run(move |p| p.compensate(&saga_id, kind))
            .await
            .unwrap_or(ParticipantStatus::Compensating);
        CallbackResponse::ok(status)
    }

    /// Status callback. 404 for a saga this participant never joined.
    pub async fn status(&self, saga_id: &str, parent_saga_id: Option<&str>) -> CallbackResponse {
        tracing::trace!(saga_id, parent_saga_id = ?parent_saga_id, kind = %self.kind, "Status requested");
        let saga_id = SagaId::new(saga_id);
        let kind = self.kind;
        match self.run(move |p| p.status(&saga_id, kind)).await {
            Some(Ok(Some(status))) => CallbackResponse::ok(status),
            Some(Ok(None)) => CallbackResponse::rejected(StatusCode::NOT_FOUND, "unknown saga"),
            Some(Err(error)) => {
                CallbackResponse::rejected(StatusCode::SERVICE_UNAVAILABLE, error.to_string())
            }
            None => Self::worker_lost(),
        }
    }

    /// Always acknowledged, whatever the outcome text says
    pub async fn after_saga(&self, saga_id: &str, outcome: &str) -> CallbackResponse {
        let outcome = SagaOutcome::parse(outcome);
        if let SagaOutcome::Unknown(raw) = &outcome {
            tracing::warn!(saga_id, outcome = %raw, "Unrecognised saga outcome");
        }
        let saga_id = SagaId::new(saga_id);
        let kind = self.kind;
        // Nothing to report back either way
        let _ = self
            .run(move |p| p.after_saga_for(&saga_id, kind, &outcome))
            .await;
        CallbackResponse::ack()
    }

    /// Run a participant call on the blocking pool. `None` if the task
    /// panicked or the runtime is shutting down.
    async fn run<T, F>(&self, f: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&Participant) -> T + Send + 'static,
    {
        let participant = self.participant.clone();
        match tokio::task::spawn_blocking(move || f(&participant)).await {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::error!(kind = %self.kind, error = %error, "Participant task failed");
                None
            }
        }
    }

    fn worker_lost() -> CallbackResponse {
        CallbackResponse::rejected(StatusCode::INTERNAL_SERVER_ERROR, "participant task failed")
    }
}
