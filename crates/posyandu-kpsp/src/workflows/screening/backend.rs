use std::future::Future;

use crate::auth::SessionContext;

use super::domain::{
    AgeBracket, Child, ChildId, Questionnaire, ScreeningRecord, ScreeningResult,
    SubmissionPayload,
};

/// The Posyandu backend as seen by the screening wizard.
///
/// Every call is a suspension point; implementations neither retry nor time out
/// beyond what their transport does by default.
pub trait ScreeningBackend: Send + Sync {
    /// Children the logged-in account may screen.
    fn children(&self) -> impl Future<Output = Result<Vec<Child>, BackendError>> + Send;

    /// The active questionnaire for a bracket, or `None` when the backend has none.
    fn questionnaire_for(
        &self,
        bracket: AgeBracket,
    ) -> impl Future<Output = Result<Option<Questionnaire>, BackendError>> + Send;

    /// Screenings already recorded for a child.
    fn history_for(
        &self,
        child_id: &ChildId,
    ) -> impl Future<Output = Result<Vec<ScreeningRecord>, BackendError>> + Send;

    /// Sends the answers as one payload and returns the backend's classification.
    fn submit(
        &self,
        payload: &SubmissionPayload,
    ) -> impl Future<Output = Result<ScreeningResult, BackendError>> + Send;
}

/// A backend that can act for one caller.
///
/// The wizard API hands every session a handle carrying the credential of the
/// request that opened it.
pub trait ScopedBackend: ScreeningBackend + Sized {
    fn scoped(&self, credential: SessionContext) -> Self;
}

/// Failure talking to the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Transport(String),
    #[error("backend rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("session credential missing or expired")]
    Unauthorized,
    #[error("unexpected backend payload: {0}")]
    InvalidPayload(String),
}
