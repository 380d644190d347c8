use chrono::NaiveDate;
use serde::Serialize;

use super::answers::AnswerTally;
use super::domain::{AgeBracket, ChildId, Classification, QuestionId, QuestionnaireId};
use super::roster::{Eligibility, RosterEntry};
use super::wizard::{
    ChildSelection, CompletedScreening, Notice, ScreeningSheet, ScreeningWizard, WizardFault,
    WizardStage, WizardState,
};

#[derive(Debug, Clone, Serialize)]
pub struct RosterEntryView {
    pub child_id: ChildId,
    pub full_name: String,
    pub age_in_months: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bracket: Option<AgeBracket>,
    pub status_label: &'static str,
    pub selectable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screened_on: Option<NaiveDate>,
}

impl From<&RosterEntry> for RosterEntryView {
    fn from(entry: &RosterEntry) -> Self {
        let screened_on = match entry.eligibility {
            Eligibility::AlreadyScreened { screened_on } => Some(screened_on),
            _ => None,
        };

        Self {
            child_id: entry.child.id.clone(),
            full_name: entry.child.full_name.clone(),
            age_in_months: entry.child.age_in_months,
            bracket: entry.bracket,
            status_label: entry.eligibility.label(),
            selectable: entry.eligibility.is_selectable(),
            screened_on,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionView {
    pub child_id: ChildId,
    pub full_name: String,
    pub age_in_months: u32,
    pub bracket: AgeBracket,
    pub bracket_label: &'static str,
}

impl From<&ChildSelection> for SelectionView {
    fn from(selection: &ChildSelection) -> Self {
        Self {
            child_id: selection.child.id.clone(),
            full_name: selection.child.full_name.clone(),
            age_in_months: selection.child.age_in_months,
            bracket: selection.bracket,
            bracket_label: selection.bracket.label(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionnaireView {
    pub id: QuestionnaireId,
    pub name: String,
    pub bracket_label: &'static str,
    pub total_questions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub position: usize,
    pub total: usize,
    pub progress_percent: u8,
    pub question_id: QuestionId,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    pub area_label: String,
    pub answer: Option<bool>,
    pub is_last: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewItem {
    pub position: usize,
    pub question_id: QuestionId,
    pub text: String,
    pub area_label: String,
    pub answer: Option<bool>,
    pub answer_label: &'static str,
}

/// Every question with its current answer plus the yes/no tally.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewSummary {
    pub items: Vec<ReviewItem>,
    pub tally: AnswerTally,
    pub percentage: f64,
    pub display_percentage: u32,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultView {
    pub child_name: String,
    pub questionnaire_name: String,
    pub classification: Classification,
    pub classification_label: &'static str,
    pub interpretation: &'static str,
    pub total_yes: u32,
    pub total_no: u32,
    pub percentage: u32,
    pub recommended_action: String,
    pub screening_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct FaultView {
    pub message: String,
    pub retryable: bool,
}

/// Serializable snapshot of the wizard for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct WizardView {
    pub stage: WizardStage,
    pub stage_label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roster: Vec<RosterEntryView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questionnaire: Option<QuestionnaireView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<FaultView>,
    pub can_submit: bool,
    pub submitting: bool,
}

pub const fn answer_label(answer: Option<bool>) -> &'static str {
    match answer {
        Some(true) => "Ya",
        Some(false) => "Tidak",
        None => "Belum dijawab",
    }
}

pub fn review_summary(sheet: &ScreeningSheet) -> ReviewSummary {
    let questions = &sheet.questionnaire().questions;
    let answers = sheet.answers();

    let items = questions
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let answer = answers.get(&question.id);
            ReviewItem {
                position: index + 1,
                question_id: question.id.clone(),
                text: question.text.clone(),
                area_label: question.area.label().to_string(),
                answer,
                answer_label: answer_label(answer),
            }
        })
        .collect();

    let tally = answers.tally(questions);
    let percentage = tally.percentage();

    ReviewSummary {
        items,
        tally,
        percentage,
        display_percentage: percentage.round() as u32,
        complete: tally.unanswered == 0,
        notes: sheet.notes().map(str::to_string),
    }
}

pub fn question_view(sheet: &ScreeningSheet) -> QuestionView {
    let question = sheet.current_question();
    let progress = sheet.progress();

    QuestionView {
        position: progress.position,
        total: progress.total,
        progress_percent: progress.percent,
        question_id: question.id.clone(),
        text: question.text.clone(),
        instruction: question.instruction.clone(),
        area_label: question.area.label().to_string(),
        answer: sheet.answers().get(&question.id),
        is_last: sheet.is_last(),
    }
}

pub fn result_view(completed: &CompletedScreening) -> ResultView {
    let result = &completed.result;
    ResultView {
        child_name: completed.selection.child.full_name.clone(),
        questionnaire_name: completed.questionnaire_name.clone(),
        classification: result.classification,
        classification_label: result.classification.label(),
        interpretation: result.classification.interpretation(),
        total_yes: result.total_yes,
        total_no: result.total_no,
        percentage: result.display_percentage(),
        recommended_action: result.recommended_action.clone(),
        screening_date: result.screening_date,
    }
}

fn questionnaire_view(
    id: &QuestionnaireId,
    name: &str,
    bracket: AgeBracket,
    total_questions: usize,
) -> QuestionnaireView {
    QuestionnaireView {
        id: id.clone(),
        name: name.to_string(),
        bracket_label: bracket.label(),
        total_questions,
    }
}

fn fault_view(fault: &WizardFault) -> FaultView {
    FaultView {
        message: fault.message(),
        retryable: fault.is_retryable(),
    }
}

pub(super) fn render(wizard: &ScreeningWizard) -> WizardView {
    let stage = wizard.stage();
    let mut view = WizardView {
        stage,
        stage_label: stage.label(),
        notice: wizard.notice().cloned(),
        roster: Vec::new(),
        selection: None,
        questionnaire: None,
        question: None,
        review: None,
        result: None,
        fault: None,
        can_submit: false,
        submitting: false,
    };

    match wizard.state() {
        WizardState::SelectChild => {
            view.roster = wizard
                .roster()
                .entries()
                .iter()
                .map(RosterEntryView::from)
                .collect();
        }
        WizardState::SelectQuestionnaire {
            selection,
            questionnaire,
        } => {
            view.selection = Some(SelectionView::from(selection));
            view.questionnaire = questionnaire.as_ref().map(|questionnaire| {
                questionnaire_view(
                    &questionnaire.id,
                    &questionnaire.name,
                    questionnaire.bracket,
                    questionnaire.len(),
                )
            });
        }
        WizardState::Answering(sheet) => {
            view.selection = Some(SelectionView::from(sheet.selection()));
            view.questionnaire = Some(sheet_questionnaire(sheet));
            view.question = Some(question_view(sheet));
        }
        WizardState::Review(sheet) => {
            view.selection = Some(SelectionView::from(sheet.selection()));
            view.questionnaire = Some(sheet_questionnaire(sheet));
            view.review = Some(review_summary(sheet));
            view.can_submit = sheet.is_complete() && !sheet.is_submitting();
            view.submitting = sheet.is_submitting();
        }
        WizardState::Submitted(completed) => {
            view.selection = Some(SelectionView::from(&completed.selection));
            view.result = Some(result_view(completed));
        }
        WizardState::Error(fault) => {
            if let WizardFault::QuestionnaireUnavailable { selection, .. } = fault {
                view.selection = Some(SelectionView::from(selection));
            }
            view.fault = Some(fault_view(fault));
        }
    }

    view
}

fn sheet_questionnaire(sheet: &ScreeningSheet) -> QuestionnaireView {
    let questionnaire = sheet.questionnaire();
    questionnaire_view(
        &questionnaire.id,
        &questionnaire.name,
        questionnaire.bracket,
        questionnaire.len(),
    )
}
