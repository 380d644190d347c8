//! JSON shapes returned by the Posyandu backend.
//!
//! Fields the backend may omit are `Option`s here and are checked once while
//! converting into domain types, so nothing past this module has to guess.

use chrono::NaiveDate;
use serde::Deserialize;

use super::backend::BackendError;
use super::domain::{
    age_in_months, AgeBracket, Child, ChildId, Classification, DevelopmentArea, Question,
    QuestionId, Questionnaire, QuestionnaireId, ScreeningId, ScreeningRecord, ScreeningResult,
};

/// `{ success, message, data }` wrapper around every response.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

/// Error bodies only need the message.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default, alias = "error")]
    pub message: Option<String>,
}

/// Identifiers arrive as strings or as numbers depending on the table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
        }
    }
}

fn invalid(message: impl Into<String>) -> BackendError {
    BackendError::InvalidPayload(message.into())
}

/// Accepts `YYYY-MM-DD` or any ISO-8601 timestamp starting with one.
pub(crate) fn parse_backend_date(raw: &str) -> Result<NaiveDate, BackendError> {
    let trimmed = raw.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|err| invalid(format!("'{raw}' is not a date ({err})")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireChild {
    pub id: RawId,
    #[serde(default, alias = "name")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub age_in_months: Option<i64>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub mother_name: Option<String>,
}

impl WireChild {
    /// `ageInMonths` wins when present; otherwise the age is derived from `birthDate`.
    pub fn into_child(self, today: NaiveDate) -> Result<Child, BackendError> {
        let id = self.id.into_string();
        let full_name = self
            .full_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| invalid(format!("child {id} has no name")))?;

        let birth_date = self
            .birth_date
            .as_deref()
            .map(parse_backend_date)
            .transpose()?;

        let age_in_months = match (self.age_in_months, birth_date) {
            (Some(age), _) => u32::try_from(age)
                .map_err(|_| invalid(format!("child {id} has a negative age ({age})")))?,
            (None, Some(birth)) => age_in_months(birth, today)
                .ok_or_else(|| invalid(format!("child {id} is born in the future")))?,
            (None, None) => {
                return Err(invalid(format!(
                    "child {id} has neither ageInMonths nor birthDate"
                )))
            }
        };

        Ok(Child {
            id: ChildId(id),
            full_name,
            age_in_months,
            birth_date,
            mother_name: self.mother_name.filter(|name| !name.trim().is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireQuestion {
    pub id: RawId,
    #[serde(default, alias = "question", alias = "text")]
    pub question_text: Option<String>,
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default, alias = "aspect", alias = "area")]
    pub development_area: Option<String>,
    #[serde(default)]
    pub order_number: Option<i64>,
}

impl WireQuestion {
    fn into_question(self) -> Result<Question, BackendError> {
        let id = self.id.into_string();
        let text = self
            .question_text
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| invalid(format!("question {id} has no text")))?;

        Ok(Question {
            id: QuestionId(id),
            text,
            instruction: self
                .instruction
                .filter(|instruction| !instruction.trim().is_empty()),
            area: self
                .development_area
                .as_deref()
                .map(DevelopmentArea::from_tag)
                .unwrap_or_else(|| DevelopmentArea::Other("Umum".to_string())),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireQuestionnaire {
    pub id: RawId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "ageGroup")]
    pub age_range: Option<String>,
    #[serde(default)]
    pub questions: Option<Vec<WireQuestion>>,
}

impl WireQuestionnaire {
    /// Questions are ordered by `orderNumber` when the backend sends one, else kept as sent.
    pub fn into_questionnaire(self, requested: AgeBracket) -> Result<Questionnaire, BackendError> {
        let id = self.id.into_string();
        let bracket = match self.age_range.as_deref() {
            Some(code) => AgeBracket::from_code(code)
                .ok_or_else(|| invalid(format!("questionnaire {id} has unknown age range '{code}'")))?,
            None => requested,
        };

        let mut wire_questions = self.questions.unwrap_or_default();
        wire_questions.sort_by_key(|question| question.order_number.unwrap_or(i64::MAX));
        let questions = wire_questions
            .into_iter()
            .map(WireQuestion::into_question)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Questionnaire {
            name: self
                .name
                .unwrap_or_else(|| format!("KPSP {}", bracket.label())),
            id: QuestionnaireId(id),
            bracket,
            questions,
        })
    }
}

fn parse_classification(raw: Option<String>, context: &str) -> Result<Classification, BackendError> {
    let raw = raw.ok_or_else(|| invalid(format!("{context} has no classification")))?;
    Classification::parse(&raw)
        .ok_or_else(|| invalid(format!("{context} has unknown classification '{raw}'")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireScreening {
    pub id: RawId,
    pub child_id: RawId,
    #[serde(alias = "categoryId")]
    pub questionnaire_id: RawId,
    #[serde(default, alias = "ageGroup")]
    pub age_range: Option<String>,
    #[serde(default, alias = "result")]
    pub classification: Option<String>,
    #[serde(default)]
    pub screening_date: Option<String>,
}

impl WireScreening {
    pub fn into_record(self) -> Result<ScreeningRecord, BackendError> {
        let id = self.id.into_string();
        let context = format!("screening {id}");
        let screening_date = self
            .screening_date
            .as_deref()
            .map(parse_backend_date)
            .transpose()?
            .ok_or_else(|| invalid(format!("{context} has no screening date")))?;

        Ok(ScreeningRecord {
            classification: parse_classification(self.classification, &context)?,
            id: ScreeningId(id),
            child_id: ChildId(self.child_id.into_string()),
            questionnaire_id: QuestionnaireId(self.questionnaire_id.into_string()),
            bracket: self.age_range.as_deref().and_then(AgeBracket::from_code),
            screening_date,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireResult {
    #[serde(default)]
    pub id: Option<RawId>,
    pub total_yes: u32,
    pub total_no: u32,
    #[serde(default, alias = "result")]
    pub classification: Option<String>,
    #[serde(default, alias = "recommendation")]
    pub recommended_action: Option<String>,
    #[serde(default)]
    pub screening_date: Option<String>,
}

impl WireResult {
    /// A missing screening date falls back to `today`.
    pub fn into_result(self, today: NaiveDate) -> Result<ScreeningResult, BackendError> {
        let screening_date = self
            .screening_date
            .as_deref()
            .map(parse_backend_date)
            .transpose()?
            .unwrap_or(today);

        Ok(ScreeningResult {
            classification: parse_classification(self.classification, "screening result")?,
            screening_id: self.id.map(|id| ScreeningId(id.into_string())),
            total_yes: self.total_yes,
            total_no: self.total_no,
            recommended_action: self.recommended_action.unwrap_or_default(),
            screening_date,
        })
    }
}
