//! KPSP screening wizard: child selection, questionnaire, answers, review, and
//! the classification returned by the backend.
//!
//! `wizard` is a pure state machine; `session` drives it against a
//! `ScreeningBackend` and `router` serves it over HTTP.

pub mod answers;
pub mod backend;
pub mod domain;
pub mod memory;
pub mod registry;
pub mod rest;
pub mod roster;
pub mod router;
pub mod session;
pub mod views;
pub(crate) mod wire;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use answers::{AnswerStore, AnswerTally};
pub use backend::{BackendError, ScopedBackend, ScreeningBackend};
pub use domain::{
    age_in_months, AgeBracket, AnswerEntry, Child, ChildId, Classification, DevelopmentArea,
    Question, QuestionId, Questionnaire, QuestionnaireId, ScreeningId, ScreeningRecord,
    ScreeningResult, SubmissionPayload,
};
pub use memory::InMemoryScreeningBackend;
pub use registry::{SessionId, SessionLimits, SessionRegistry};
pub use rest::RestScreeningBackend;
pub use roster::{ChildHistory, ChildRoster, Eligibility, RosterEntry};
pub use router::{screening_router, SessionResponse};
pub use session::{ScreeningSession, SessionError};
pub use views::WizardView;
pub use wizard::{
    ChildSelection, Notice, Progress, RetryTarget, ScreeningSheet, ScreeningWizard, WizardError,
    WizardFault, WizardStage, WizardState,
};
