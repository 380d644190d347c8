use std::fmt;

use serde::Serialize;

use super::answers::AnswerStore;
use super::domain::{
    AgeBracket, Child, ChildId, Question, QuestionId, Questionnaire, QuestionnaireId,
    ScreeningResult, SubmissionPayload,
};
use super::roster::{ChildRoster, Eligibility};
use super::views::{self, WizardView};

/// Coarse position in the flow, used for labels and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStage {
    SelectChild,
    SelectQuestionnaire,
    Answering,
    Review,
    Submitted,
    Error,
}

impl WizardStage {
    pub const fn label(self) -> &'static str {
        match self {
            Self::SelectChild => "Pilih Anak",
            Self::SelectQuestionnaire => "Pilih Kuesioner",
            Self::Answering => "Pengisian",
            Self::Review => "Tinjau Jawaban",
            Self::Submitted => "Hasil Skrining",
            Self::Error => "Terjadi Kesalahan",
        }
    }
}

impl fmt::Display for WizardStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The child chosen for this session and the bracket its questionnaire comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildSelection {
    pub child: Child,
    pub bracket: AgeBracket,
}

/// Position of the current question within the questionnaire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub position: usize,
    pub total: usize,
    pub percent: u8,
}

/// Working state shared by `Answering` and `Review`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreeningSheet {
    selection: ChildSelection,
    questionnaire: Questionnaire,
    answers: AnswerStore,
    index: usize,
    notes: Option<String>,
    submitting: bool,
}

impl ScreeningSheet {
    fn new(selection: ChildSelection, questionnaire: Questionnaire) -> Self {
        Self {
            selection,
            questionnaire,
            answers: AnswerStore::new(),
            index: 0,
            notes: None,
            submitting: false,
        }
    }

    pub fn selection(&self) -> &ChildSelection {
        &self.selection
    }

    pub fn questionnaire(&self) -> &Questionnaire {
        &self.questionnaire
    }

    pub fn answers(&self) -> &AnswerStore {
        &self.answers
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    // Questionnaires are only accepted when non-empty and `index` never leaves their bounds.
    pub fn current_question(&self) -> &Question {
        &self.questionnaire.questions[self.index]
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.questionnaire.len()
    }

    pub fn is_complete(&self) -> bool {
        self.answers.all_answered(&self.questionnaire.questions)
    }

    /// Progress bar value; the percentage is truncated and never stored.
    pub fn progress(&self) -> Progress {
        let total = self.questionnaire.len();
        let position = self.index + 1;
        Progress {
            position,
            total,
            percent: (position * 100 / total.max(1)).min(100) as u8,
        }
    }

    fn payload(&self) -> SubmissionPayload {
        SubmissionPayload {
            child_id: self.selection.child.id.clone(),
            questionnaire_id: self.questionnaire.id.clone(),
            answers: self.answers.entries(&self.questionnaire.questions),
            age_in_months: self.selection.child.age_in_months,
            notes: self.notes.clone(),
        }
    }
}

/// Outcome of a successful submission, kept for the result screen.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedScreening {
    pub selection: ChildSelection,
    pub questionnaire_id: QuestionnaireId,
    pub questionnaire_name: String,
    pub result: ScreeningResult,
}

/// Failures that end the normal flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardFault {
    RosterUnavailable {
        reason: String,
    },
    QuestionnaireUnavailable {
        selection: ChildSelection,
        reason: String,
    },
    QuestionnaireMissing {
        bracket: AgeBracket,
    },
}

impl WizardFault {
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::QuestionnaireMissing { .. })
    }

    pub fn message(&self) -> String {
        match self {
            Self::RosterUnavailable { reason } => format!("Gagal memuat daftar anak: {reason}"),
            Self::QuestionnaireUnavailable { selection, reason } => format!(
                "Gagal memuat kuesioner usia {}: {reason}",
                selection.bracket.label()
            ),
            Self::QuestionnaireMissing { bracket } => format!(
                "Kuesioner untuk usia {} belum tersedia.",
                bracket.label()
            ),
        }
    }
}

/// Inline or blocking message attached to the current view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    Unanswered {
        question_id: QuestionId,
        message: String,
    },
    Incomplete {
        missing: Vec<QuestionId>,
        message: String,
    },
    SubmissionFailed {
        message: String,
    },
}

impl Notice {
    fn unanswered(question_id: QuestionId) -> Self {
        Self::Unanswered {
            question_id,
            message: "Silakan pilih jawaban Ya atau Tidak sebelum melanjutkan.".to_string(),
        }
    }

    fn incomplete(missing: Vec<QuestionId>) -> Self {
        let message = format!(
            "Masih ada {} pertanyaan yang belum dijawab.",
            missing.len()
        );
        Self::Incomplete { missing, message }
    }

    fn submission_failed(reason: &str) -> Self {
        Self::SubmissionFailed {
            message: format!(
                "Gagal mengirim hasil skrining: {reason}. Jawaban tetap tersimpan, silakan kirim ulang."
            ),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Unanswered { message, .. }
            | Self::Incomplete { message, .. }
            | Self::SubmissionFailed { message } => message,
        }
    }

    /// Blocking notices are shown as an alert rather than inline.
    pub const fn is_blocking(&self) -> bool {
        matches!(self, Self::SubmissionFailed { .. })
    }
}

/// Wizard state; each variant carries exactly the data its screen needs.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardState {
    SelectChild,
    SelectQuestionnaire {
        selection: ChildSelection,
        questionnaire: Option<Questionnaire>,
    },
    Answering(ScreeningSheet),
    Review(ScreeningSheet),
    Submitted(CompletedScreening),
    Error(WizardFault),
}

impl WizardState {
    pub fn stage(&self) -> WizardStage {
        match self {
            Self::SelectChild => WizardStage::SelectChild,
            Self::SelectQuestionnaire { .. } => WizardStage::SelectQuestionnaire,
            Self::Answering(_) => WizardStage::Answering,
            Self::Review(_) => WizardStage::Review,
            Self::Submitted(_) => WizardStage::Submitted,
            Self::Error(_) => WizardStage::Error,
        }
    }
}

/// What a manual retry has to fetch again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryTarget {
    Roster,
    Questionnaire(ChildSelection),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("`{operation}` is not available on the {stage} screen")]
    InvalidTransition {
        operation: &'static str,
        stage: WizardStage,
    },
    #[error("child {0} is not on the roster")]
    UnknownChild(ChildId),
    #[error("child {child} cannot be screened ({})", .eligibility.label())]
    ChildNotEligible {
        child: ChildId,
        eligibility: Eligibility,
    },
    #[error("the questionnaire is still loading")]
    QuestionnairePending,
    #[error("question {0} is not part of this questionnaire")]
    UnknownQuestion(QuestionId),
    #[error("question {0} must be answered before continuing")]
    Unanswered(QuestionId),
    #[error("{} question(s) are still unanswered", .0.len())]
    Incomplete(Vec<QuestionId>),
    #[error("a submission is already in progress")]
    SubmissionInFlight,
}

impl WizardError {
    /// Errors caused by user input rather than by calling an operation out of order.
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownChild(_)
                | Self::UnknownQuestion(_)
                | Self::Unanswered(_)
                | Self::Incomplete(_)
        )
    }
}

/// Drives one screening session from child selection to the classified result.
///
/// The wizard performs no I/O: callers fetch from the backend and report the
/// outcome through the `*_loaded`, `*_failed` and `submission_*` methods.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningWizard {
    state: WizardState,
    roster: ChildRoster,
    notice: Option<Notice>,
}

impl Default for ScreeningWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreeningWizard {
    pub fn new() -> Self {
        Self {
            state: WizardState::SelectChild,
            roster: ChildRoster::default(),
            notice: None,
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn stage(&self) -> WizardStage {
        self.state.stage()
    }

    pub fn roster(&self) -> &ChildRoster {
        &self.roster
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// The sheet being answered or reviewed, if any.
    pub fn sheet(&self) -> Option<&ScreeningSheet> {
        match &self.state {
            WizardState::Answering(sheet) | WizardState::Review(sheet) => Some(sheet),
            _ => None,
        }
    }

    pub fn view(&self) -> WizardView {
        views::render(self)
    }

    fn invalid(&self, operation: &'static str) -> WizardError {
        WizardError::InvalidTransition {
            operation,
            stage: self.stage(),
        }
    }

    fn accepts_roster(&self) -> bool {
        matches!(
            self.state,
            WizardState::SelectChild | WizardState::Error(WizardFault::RosterUnavailable { .. })
        )
    }

    pub fn load_roster(&mut self, roster: ChildRoster) -> Result<(), WizardError> {
        if !self.accepts_roster() {
            return Err(self.invalid("load_roster"));
        }
        self.roster = roster;
        self.state = WizardState::SelectChild;
        self.notice = None;
        Ok(())
    }

    pub fn roster_failed(&mut self, reason: impl Into<String>) -> Result<(), WizardError> {
        if !self.accepts_roster() {
            return Err(self.invalid("roster_failed"));
        }
        self.state = WizardState::Error(WizardFault::RosterUnavailable {
            reason: reason.into(),
        });
        self.notice = None;
        Ok(())
    }

    pub fn select_child(&mut self, child_id: &ChildId) -> Result<&ChildSelection, WizardError> {
        if !matches!(self.state, WizardState::SelectChild) {
            return Err(self.invalid("select_child"));
        }

        let entry = self
            .roster
            .find(child_id)
            .ok_or_else(|| WizardError::UnknownChild(child_id.clone()))?;

        let bracket = match (entry.eligibility, entry.bracket) {
            (Eligibility::Eligible, Some(bracket)) => bracket,
            (eligibility, _) => {
                return Err(WizardError::ChildNotEligible {
                    child: child_id.clone(),
                    eligibility,
                })
            }
        };

        self.state = WizardState::SelectQuestionnaire {
            selection: ChildSelection {
                child: entry.child.clone(),
                bracket,
            },
            questionnaire: None,
        };
        self.notice = None;

        match &self.state {
            WizardState::SelectQuestionnaire { selection, .. } => Ok(selection),
            _ => Err(self.invalid("select_child")),
        }
    }

    /// Records the questionnaire lookup. `None`, an empty question list, or a
    /// questionnaire for another bracket is a fatal fault.
    pub fn questionnaire_loaded(
        &mut self,
        questionnaire: Option<Questionnaire>,
    ) -> Result<(), WizardError> {
        let stage = self.stage();
        let WizardState::SelectQuestionnaire {
            selection,
            questionnaire: slot,
        } = &mut self.state
        else {
            return Err(WizardError::InvalidTransition {
                operation: "questionnaire_loaded",
                stage,
            });
        };

        let bracket = selection.bracket;
        match questionnaire {
            Some(questionnaire)
                if !questionnaire.is_empty() && questionnaire.bracket == bracket =>
            {
                *slot = Some(questionnaire);
            }
            _ => {
                self.state = WizardState::Error(WizardFault::QuestionnaireMissing { bracket });
            }
        }
        self.notice = None;
        Ok(())
    }

    pub fn questionnaire_failed(&mut self, reason: impl Into<String>) -> Result<(), WizardError> {
        let state = std::mem::replace(&mut self.state, WizardState::SelectChild);
        match state {
            WizardState::SelectQuestionnaire { selection, .. } => {
                self.state = WizardState::Error(WizardFault::QuestionnaireUnavailable {
                    selection,
                    reason: reason.into(),
                });
                self.notice = None;
                Ok(())
            }
            other => {
                self.state = other;
                Err(self.invalid("questionnaire_failed"))
            }
        }
    }

    /// Starts answering with an empty answer store at the first question.
    pub fn confirm_questionnaire(&mut self) -> Result<(), WizardError> {
        match &self.state {
            WizardState::SelectQuestionnaire {
                questionnaire: None,
                ..
            } => return Err(WizardError::QuestionnairePending),
            WizardState::SelectQuestionnaire { .. } => {}
            _ => return Err(self.invalid("confirm_questionnaire")),
        }

        let state = std::mem::replace(&mut self.state, WizardState::SelectChild);
        self.state = match state {
            WizardState::SelectQuestionnaire {
                selection,
                questionnaire: Some(questionnaire),
            } => WizardState::Answering(ScreeningSheet::new(selection, questionnaire)),
            other => other,
        };
        self.notice = None;
        Ok(())
    }

    /// Answers the question currently on screen.
    pub fn answer(&mut self, value: bool) -> Result<(), WizardError> {
        let stage = self.stage();
        let WizardState::Answering(sheet) = &mut self.state else {
            return Err(WizardError::InvalidTransition {
                operation: "answer",
                stage,
            });
        };

        let question_id = sheet.current_question().id.clone();
        sheet.answers.set(question_id, value);
        self.notice = None;
        Ok(())
    }

    /// Answers a question by id; ids outside the questionnaire are rejected.
    pub fn answer_question(
        &mut self,
        question_id: &QuestionId,
        value: bool,
    ) -> Result<(), WizardError> {
        let stage = self.stage();
        let WizardState::Answering(sheet) = &mut self.state else {
            return Err(WizardError::InvalidTransition {
                operation: "answer",
                stage,
            });
        };

        if sheet.questionnaire.position(question_id).is_none() {
            return Err(WizardError::UnknownQuestion(question_id.clone()));
        }
        sheet.answers.set(question_id.clone(), value);

        if matches!(&self.notice, Some(Notice::Unanswered { question_id: pending, .. }) if pending == question_id)
        {
            self.notice = None;
        }
        Ok(())
    }

    /// Advances to the next question, or to `Review` from the last one.
    pub fn next(&mut self) -> Result<WizardStage, WizardError> {
        let stage = self.stage();
        let WizardState::Answering(sheet) = &mut self.state else {
            return Err(WizardError::InvalidTransition {
                operation: "next",
                stage,
            });
        };

        let current = sheet.current_question().id.clone();
        if sheet.answers.get(&current).is_none() {
            self.notice = Some(Notice::unanswered(current.clone()));
            return Err(WizardError::Unanswered(current));
        }

        self.notice = None;
        if !sheet.is_last() {
            sheet.index += 1;
            return Ok(WizardStage::Answering);
        }

        let state = std::mem::replace(&mut self.state, WizardState::SelectChild);
        self.state = match state {
            WizardState::Answering(sheet) => WizardState::Review(sheet),
            other => other,
        };
        Ok(self.stage())
    }

    /// Steps back one question without validation; a no-op on the first question.
    pub fn previous(&mut self) -> Result<(), WizardError> {
        let stage = self.stage();
        let WizardState::Answering(sheet) = &mut self.state else {
            return Err(WizardError::InvalidTransition {
                operation: "previous",
                stage,
            });
        };

        sheet.index = sheet.index.saturating_sub(1);
        self.notice = None;
        Ok(())
    }

    /// Returns from `Review` to `Answering` at the same question, keeping answers.
    pub fn edit(&mut self) -> Result<(), WizardError> {
        match &self.state {
            WizardState::Review(sheet) if sheet.submitting => {
                return Err(WizardError::SubmissionInFlight)
            }
            WizardState::Review(_) => {}
            _ => return Err(self.invalid("edit")),
        }

        let state = std::mem::replace(&mut self.state, WizardState::SelectChild);
        self.state = match state {
            WizardState::Review(sheet) => WizardState::Answering(sheet),
            other => other,
        };
        self.notice = None;
        Ok(())
    }

    /// Attaches the optional free-text note; blank input clears it.
    pub fn set_notes(&mut self, notes: Option<String>) -> Result<(), WizardError> {
        let stage = self.stage();
        let (WizardState::Answering(sheet) | WizardState::Review(sheet)) = &mut self.state else {
            return Err(WizardError::InvalidTransition {
                operation: "set_notes",
                stage,
            });
        };

        sheet.notes = notes
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        Ok(())
    }

    /// Re-validates the answers and marks the submission as in flight.
    pub fn begin_submission(&mut self) -> Result<SubmissionPayload, WizardError> {
        let stage = self.stage();
        let WizardState::Review(sheet) = &mut self.state else {
            return Err(WizardError::InvalidTransition {
                operation: "submit",
                stage,
            });
        };

        if sheet.submitting {
            return Err(WizardError::SubmissionInFlight);
        }

        let missing: Vec<QuestionId> = sheet
            .answers
            .missing(&sheet.questionnaire.questions)
            .into_iter()
            .cloned()
            .collect();
        if !missing.is_empty() {
            self.notice = Some(Notice::incomplete(missing.clone()));
            return Err(WizardError::Incomplete(missing));
        }

        sheet.submitting = true;
        self.notice = None;
        Ok(sheet.payload())
    }

    pub fn submission_succeeded(&mut self, result: ScreeningResult) -> Result<(), WizardError> {
        match &self.state {
            WizardState::Review(sheet) if sheet.submitting => {}
            _ => return Err(self.invalid("submission_succeeded")),
        }

        let state = std::mem::replace(&mut self.state, WizardState::SelectChild);
        self.state = match state {
            WizardState::Review(sheet) => {
                self.roster
                    .mark_screened(&sheet.selection.child.id, result.screening_date);
                WizardState::Submitted(CompletedScreening {
                    selection: sheet.selection,
                    questionnaire_id: sheet.questionnaire.id,
                    questionnaire_name: sheet.questionnaire.name,
                    result,
                })
            }
            other => other,
        };
        self.notice = None;
        Ok(())
    }

    /// Keeps the user on `Review` with every answer intact so they can retry.
    pub fn submission_failed(&mut self, reason: impl Into<String>) -> Result<(), WizardError> {
        let stage = self.stage();
        let WizardState::Review(sheet) = &mut self.state else {
            return Err(WizardError::InvalidTransition {
                operation: "submission_failed",
                stage,
            });
        };
        if !sheet.submitting {
            return Err(WizardError::InvalidTransition {
                operation: "submission_failed",
                stage,
            });
        }

        sheet.submitting = false;
        self.notice = Some(Notice::submission_failed(&reason.into()));
        Ok(())
    }

    /// Moves a retryable fault back to the screen that failed and reports what to refetch.
    /// A questionnaire lookup that never reported back is retried the same way.
    pub fn begin_retry(&mut self) -> Result<RetryTarget, WizardError> {
        let state = std::mem::replace(&mut self.state, WizardState::SelectChild);
        match state {
            WizardState::SelectQuestionnaire {
                selection,
                questionnaire: None,
            } => {
                self.state = WizardState::SelectQuestionnaire {
                    selection: selection.clone(),
                    questionnaire: None,
                };
                self.notice = None;
                Ok(RetryTarget::Questionnaire(selection))
            }
            WizardState::Error(WizardFault::RosterUnavailable { .. }) => {
                self.state = WizardState::SelectChild;
                Ok(RetryTarget::Roster)
            }
            WizardState::Error(WizardFault::QuestionnaireUnavailable { selection, .. }) => {
                self.state = WizardState::SelectQuestionnaire {
                    selection: selection.clone(),
                    questionnaire: None,
                };
                Ok(RetryTarget::Questionnaire(selection))
            }
            other => {
                self.state = other;
                Err(self.invalid("retry"))
            }
        }
    }

    /// "New Assessment": clears the selection, questionnaire and answers.
    pub fn reset(&mut self) {
        self.state = WizardState::SelectChild;
        self.notice = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::screening::domain::DevelopmentArea;

    fn selection() -> ChildSelection {
        ChildSelection {
            child: Child {
                id: ChildId::from("c-ayu"),
                full_name: "Ayu Lestari".to_string(),
                age_in_months: 8,
                birth_date: None,
                mother_name: None,
            },
            bracket: AgeBracket::SixToTwelve,
        }
    }

    fn questionnaire() -> Questionnaire {
        Questionnaire {
            id: QuestionnaireId::from("kpsp-6-12"),
            name: "KPSP 6-12 Bulan".to_string(),
            bracket: AgeBracket::SixToTwelve,
            questions: (1..=3)
                .map(|n| Question {
                    id: QuestionId(format!("q{n}")),
                    text: format!("Pertanyaan {n}?"),
                    instruction: None,
                    area: DevelopmentArea::FineMotor,
                })
                .collect(),
        }
    }

    fn reviewing_with_gap() -> ScreeningWizard {
        let mut sheet = ScreeningSheet::new(selection(), questionnaire());
        sheet.answers.set(QuestionId::from("q1"), true);
        sheet.answers.set(QuestionId::from("q3"), false);
        sheet.index = 2;

        let mut wizard = ScreeningWizard::new();
        wizard.state = WizardState::Review(sheet);
        wizard
    }

    #[test]
    fn submit_with_gaps_is_refused_and_not_marked_in_flight() {
        let mut wizard = reviewing_with_gap();

        let err = wizard.begin_submission().expect_err("gap blocks submit");
        assert_eq!(err, WizardError::Incomplete(vec![QuestionId::from("q2")]));
        assert!(err.is_validation());

        match wizard.notice() {
            Some(Notice::Incomplete { missing, message }) => {
                assert_eq!(missing, &vec![QuestionId::from("q2")]);
                assert_eq!(message, "Masih ada 1 pertanyaan yang belum dijawab.");
            }
            other => panic!("expected incomplete notice, got {other:?}"),
        }
        assert!(!wizard.notice().expect("notice shown").is_blocking());

        let sheet = wizard.sheet().expect("still reviewing");
        assert!(!sheet.is_submitting());
        assert_eq!(wizard.stage(), WizardStage::Review);
    }

    #[test]
    fn filling_the_gap_allows_submission() {
        let mut wizard = reviewing_with_gap();
        wizard.begin_submission().expect_err("gap blocks submit");

        wizard.edit().expect("back to answering");
        wizard
            .answer_question(&QuestionId::from("q2"), true)
            .expect("q2 answered");
        assert_eq!(wizard.next().expect("last question"), WizardStage::Review);

        let payload = wizard.begin_submission().expect("complete sheet submits");
        assert_eq!(payload.answers.len(), 3);
        assert!(wizard.notice().is_none());
        assert!(wizard.sheet().expect("reviewing").is_submitting());
    }

    #[test]
    fn unanswered_questionnaire_lookup_can_be_retried() {
        let mut wizard = ScreeningWizard::new();
        wizard.state = WizardState::SelectQuestionnaire {
            selection: selection(),
            questionnaire: None,
        };

        assert_eq!(
            wizard.confirm_questionnaire(),
            Err(WizardError::QuestionnairePending)
        );
        assert_eq!(
            wizard.begin_retry(),
            Ok(RetryTarget::Questionnaire(selection()))
        );

        wizard
            .questionnaire_loaded(Some(questionnaire()))
            .expect("lookup recorded");
        wizard.confirm_questionnaire().expect("answering starts");
        assert_eq!(wizard.stage(), WizardStage::Answering);
    }
}
