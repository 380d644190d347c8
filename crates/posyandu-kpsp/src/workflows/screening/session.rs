use std::sync::Arc;

use tracing::{info, warn};

use super::backend::{BackendError, ScreeningBackend};
use super::domain::{AgeBracket, ChildId, QuestionId, ScreeningResult};
use super::roster::{ChildHistory, ChildRoster};
use super::views::WizardView;
use super::wizard::{RetryTarget, ScreeningWizard, WizardError, WizardStage, WizardState};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Wizard(#[from] WizardError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// One wizard bound to one backend handle.
///
/// Fetches and the submission happen here; their outcomes are fed into the
/// wizard so every failure is visible in the next view.
pub struct ScreeningSession<B> {
    backend: Arc<B>,
    wizard: ScreeningWizard,
}

impl<B> ScreeningSession<B>
where
    B: ScreeningBackend + 'static,
{
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            wizard: ScreeningWizard::new(),
        }
    }

    pub fn wizard(&self) -> &ScreeningWizard {
        &self.wizard
    }

    pub fn view(&self) -> WizardView {
        self.wizard.view()
    }

    /// Loads the children and their histories into the roster.
    pub async fn load_children(&mut self) -> Result<(), SessionError> {
        match self.fetch_roster().await {
            Ok(roster) => {
                info!(
                    children = roster.len(),
                    eligible = roster.eligible().count(),
                    "roster loaded"
                );
                self.wizard.load_roster(roster)?;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "roster fetch failed");
                self.wizard.roster_failed(err.to_string())?;
                Err(err.into())
            }
        }
    }

    async fn fetch_roster(&self) -> Result<ChildRoster, BackendError> {
        let children = self.backend.children().await?;
        let mut histories = Vec::with_capacity(children.len());
        for child in children {
            let records = self.backend.history_for(&child.id).await?;
            histories.push(ChildHistory { child, records });
        }
        Ok(ChildRoster::build(histories))
    }

    /// Selects a child and fetches the questionnaire for its bracket.
    pub async fn select_child(&mut self, child_id: &ChildId) -> Result<(), SessionError> {
        let bracket = self.wizard.select_child(child_id)?.bracket;
        info!(child_id = %child_id, bracket = bracket.code(), "child selected");
        self.fetch_questionnaire().await
    }

    async fn fetch_questionnaire(&mut self) -> Result<(), SessionError> {
        let Some(bracket) = self.pending_bracket() else {
            return Err(WizardError::InvalidTransition {
                operation: "fetch_questionnaire",
                stage: self.wizard.stage(),
            }
            .into());
        };

        match self.backend.questionnaire_for(bracket).await {
            Ok(questionnaire) => {
                if questionnaire.is_none() {
                    warn!(bracket = bracket.code(), "questionnaire not found");
                }
                self.wizard.questionnaire_loaded(questionnaire)?;
                Ok(())
            }
            Err(err) => {
                warn!(bracket = bracket.code(), error = %err, "questionnaire fetch failed");
                self.wizard.questionnaire_failed(err.to_string())?;
                Err(err.into())
            }
        }
    }

    fn pending_bracket(&self) -> Option<AgeBracket> {
        match self.wizard.state() {
            WizardState::SelectQuestionnaire {
                selection,
                questionnaire: None,
            } => Some(selection.bracket),
            _ => None,
        }
    }

    pub fn confirm(&mut self) -> Result<(), SessionError> {
        Ok(self.wizard.confirm_questionnaire()?)
    }

    pub fn answer(&mut self, value: bool) -> Result<(), SessionError> {
        Ok(self.wizard.answer(value)?)
    }

    pub fn answer_question(
        &mut self,
        question_id: &QuestionId,
        value: bool,
    ) -> Result<(), SessionError> {
        Ok(self.wizard.answer_question(question_id, value)?)
    }

    pub fn next(&mut self) -> Result<WizardStage, SessionError> {
        Ok(self.wizard.next()?)
    }

    pub fn previous(&mut self) -> Result<(), SessionError> {
        Ok(self.wizard.previous()?)
    }

    pub fn edit(&mut self) -> Result<(), SessionError> {
        Ok(self.wizard.edit()?)
    }

    pub fn set_notes(&mut self, notes: Option<String>) -> Result<(), SessionError> {
        Ok(self.wizard.set_notes(notes)?)
    }

    /// Sends the answers once. On failure the wizard stays on review with the
    /// answers intact and the error is returned as well. If this future is
    /// dropped before the backend answers, the attempt counts as failed.
    pub async fn submit(&mut self) -> Result<ScreeningResult, SessionError> {
        let payload = self.wizard.begin_submission()?;
        info!(
            child_id = %payload.child_id,
            questionnaire_id = %payload.questionnaire_id,
            answers = payload.answers.len(),
            "submitting screening"
        );

        let backend = Arc::clone(&self.backend);
        let mut pending = PendingSubmission {
            wizard: &mut self.wizard,
            settled: false,
        };
        let outcome = backend.submit(&payload).await;
        pending.settled = true;
        let wizard = &mut *pending.wizard;

        match outcome {
            Ok(result) => {
                info!(
                    child_id = %payload.child_id,
                    classification = result.classification.label(),
                    "screening classified"
                );
                wizard.submission_succeeded(result.clone())?;
                Ok(result)
            }
            Err(err) => {
                warn!(child_id = %payload.child_id, error = %err, "submission failed");
                wizard.submission_failed(err.to_string())?;
                Err(err.into())
            }
        }
    }

    /// Re-runs the fetch that put the wizard into its retryable error.
    pub async fn retry(&mut self) -> Result<(), SessionError> {
        match self.wizard.begin_retry()? {
            RetryTarget::Roster => {
                info!("retrying roster fetch");
                self.load_children().await
            }
            RetryTarget::Questionnaire(selection) => {
                info!(child_id = %selection.child.id, "retrying questionnaire fetch");
                self.fetch_questionnaire().await
            }
        }
    }

    /// "New Assessment": back to child selection with a freshly loaded roster.
    pub async fn new_assessment(&mut self) -> Result<(), SessionError> {
        self.wizard.reset();
        self.load_children().await
    }
}

/// Releases the in-flight flag when a submission is abandoned mid-call.
struct PendingSubmission<'a> {
    wizard: &'a mut ScreeningWizard,
    settled: bool,
}

impl Drop for PendingSubmission<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!("submission abandoned before the backend answered");
        if let Err(err) = self
            .wizard
            .submission_failed("pengiriman terputus sebelum server menjawab")
        {
            warn!(error = %err, "could not release abandoned submission");
        }
    }
}
