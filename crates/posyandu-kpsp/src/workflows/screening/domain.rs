use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

identifier!(
    /// Identifier of a child registered by the family-data service.
    ChildId
);
identifier!(
    /// Identifier of a KPSP questionnaire (category) on the backend.
    QuestionnaireId
);
identifier!(QuestionId);
identifier!(ScreeningId);

/// The four fixed KPSP age brackets, in months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgeBracket {
    #[serde(rename = "0-6")]
    ZeroToSix,
    #[serde(rename = "6-12")]
    SixToTwelve,
    #[serde(rename = "12-18")]
    TwelveToEighteen,
    #[serde(rename = "18-24")]
    EighteenToTwentyFour,
}

impl AgeBracket {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::ZeroToSix,
            Self::SixToTwelve,
            Self::TwelveToEighteen,
            Self::EighteenToTwentyFour,
        ]
    }

    /// Code used by the backend when looking up a questionnaire.
    pub const fn code(self) -> &'static str {
        match self {
            Self::ZeroToSix => "0-6",
            Self::SixToTwelve => "6-12",
            Self::TwelveToEighteen => "12-18",
            Self::EighteenToTwentyFour => "18-24",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::ZeroToSix => "0-6 bulan",
            Self::SixToTwelve => "6-12 bulan",
            Self::TwelveToEighteen => "12-18 bulan",
            Self::EighteenToTwentyFour => "18-24 bulan",
        }
    }

    /// Resolves the bracket for an age. Lower bounds are inclusive; only the last
    /// bracket also includes its upper bound.
    pub const fn for_age(age_in_months: u32) -> Option<Self> {
        match age_in_months {
            0..=5 => Some(Self::ZeroToSix),
            6..=11 => Some(Self::SixToTwelve),
            12..=17 => Some(Self::TwelveToEighteen),
            18..=24 => Some(Self::EighteenToTwentyFour),
            _ => None,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let normalized: String = code
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| if c == '_' || c == '–' { '-' } else { c })
            .collect::<String>()
            .to_ascii_lowercase();
        let normalized = normalized.trim_end_matches("bulan");

        Self::ordered()
            .into_iter()
            .find(|bracket| bracket.code() == normalized)
    }
}

impl fmt::Display for AgeBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whole months elapsed between `birth_date` and `today`, or `None` for future birth dates.
pub fn age_in_months(birth_date: NaiveDate, today: NaiveDate) -> Option<u32> {
    if birth_date > today {
        return None;
    }

    let mut months = (today.year() - birth_date.year()) * 12
        + (today.month() as i32 - birth_date.month() as i32);
    if today.day() < birth_date.day() {
        months -= 1;
    }

    u32::try_from(months).ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    pub id: ChildId,
    pub full_name: String,
    pub age_in_months: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother_name: Option<String>,
}

impl Child {
    pub fn bracket(&self) -> Option<AgeBracket> {
        AgeBracket::for_age(self.age_in_months)
    }
}

/// Developmental area a KPSP question probes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevelopmentArea {
    GrossMotor,
    FineMotor,
    SpeechLanguage,
    SocialIndependence,
    Other(String),
}

impl DevelopmentArea {
    pub fn from_tag(tag: &str) -> Self {
        let key: String = tag
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        match key.as_str() {
            "grossmotor" | "gerakkasar" | "motorikkasar" => Self::GrossMotor,
            "finemotor" | "geraklaus" | "gerakhalus" | "motorikhalus" => Self::FineMotor,
            "speech" | "language" | "speechlanguage" | "bicara" | "bicarabahasa"
            | "bicaradanbahasa" => Self::SpeechLanguage,
            "social" | "socialindependence" | "sosial" | "sosialisasikemandirian"
            | "sosialisasidankemandirian" | "sosialdankemandirian" => Self::SocialIndependence,
            _ => Self::Other(tag.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::GrossMotor => "Gerak Kasar",
            Self::FineMotor => "Gerak Halus",
            Self::SpeechLanguage => "Bicara & Bahasa",
            Self::SocialIndependence => "Sosialisasi & Kemandirian",
            Self::Other(tag) => tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    pub area: DevelopmentArea,
}

/// Ordered question set bound to one age bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Questionnaire {
    pub id: QuestionnaireId,
    pub name: String,
    pub bracket: AgeBracket,
    pub questions: Vec<Question>,
}

impl Questionnaire {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn position(&self, id: &QuestionId) -> Option<usize> {
        self.questions.iter().position(|question| &question.id == id)
    }
}

/// Backend-assigned developmental classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Sesuai,
    Meragukan,
    Penyimpangan,
}

impl Classification {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SESUAI" => Some(Self::Sesuai),
            "MERAGUKAN" => Some(Self::Meragukan),
            "PENYIMPANGAN" => Some(Self::Penyimpangan),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Sesuai => "SESUAI",
            Self::Meragukan => "MERAGUKAN",
            Self::Penyimpangan => "PENYIMPANGAN",
        }
    }

    /// Caregiver-facing explanation; the percentage bands are display copy only.
    pub const fn interpretation(self) -> &'static str {
        match self {
            Self::Sesuai => {
                "Perkembangan anak sesuai dengan tahapan usianya (jawaban Ya 80% atau lebih)."
            }
            Self::Meragukan => {
                "Perkembangan anak meragukan dan perlu stimulasi lebih (jawaban Ya 50-79%)."
            }
            Self::Penyimpangan => {
                "Kemungkinan ada penyimpangan perkembangan, segera konsultasikan ke tenaga kesehatan (jawaban Ya kurang dari 50%)."
            }
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Share of "yes" answers, in percent. Zero when nothing was answered.
pub fn yes_percentage(total_yes: u32, total_no: u32) -> f64 {
    let total = f64::from(total_yes) + f64::from(total_no);
    if total == 0.0 {
        return 0.0;
    }
    f64::from(total_yes) / total * 100.0
}

/// Classification returned by the backend after a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screening_id: Option<ScreeningId>,
    pub total_yes: u32,
    pub total_no: u32,
    pub classification: Classification,
    pub recommended_action: String,
    pub screening_date: NaiveDate,
}

impl ScreeningResult {
    pub fn percentage(&self) -> f64 {
        yes_percentage(self.total_yes, self.total_no)
    }

    pub fn display_percentage(&self) -> u32 {
        self.percentage().round() as u32
    }
}

/// One prior screening for a child, used to enforce the single-submission rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningRecord {
    pub id: ScreeningId,
    pub child_id: ChildId,
    pub questionnaire_id: QuestionnaireId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bracket: Option<AgeBracket>,
    pub classification: Classification,
    pub screening_date: NaiveDate,
}

impl ScreeningRecord {
    /// Records without a bracket are treated as covering every bracket.
    pub fn covers(&self, bracket: AgeBracket) -> bool {
        self.bracket.map_or(true, |recorded| recorded == bracket)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEntry {
    pub question_id: QuestionId,
    pub answer: bool,
}

/// Atomic submission sent to the backend classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub child_id: ChildId,
    pub questionnaire_id: QuestionnaireId,
    pub answers: Vec<AnswerEntry>,
    pub age_in_months: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn brackets_resolve_on_lower_bounds() {
        assert_eq!(AgeBracket::for_age(0), Some(AgeBracket::ZeroToSix));
        assert_eq!(AgeBracket::for_age(5), Some(AgeBracket::ZeroToSix));
        assert_eq!(AgeBracket::for_age(6), Some(AgeBracket::SixToTwelve));
        assert_eq!(AgeBracket::for_age(12), Some(AgeBracket::TwelveToEighteen));
        assert_eq!(AgeBracket::for_age(18), Some(AgeBracket::EighteenToTwentyFour));
        assert_eq!(AgeBracket::for_age(24), Some(AgeBracket::EighteenToTwentyFour));
        assert_eq!(AgeBracket::for_age(25), None);
    }

    #[test]
    fn bracket_codes_parse_loosely() {
        assert_eq!(AgeBracket::from_code("0-6"), Some(AgeBracket::ZeroToSix));
        assert_eq!(
            AgeBracket::from_code("12 - 18 bulan"),
            Some(AgeBracket::TwelveToEighteen)
        );
        assert_eq!(
            AgeBracket::from_code("18_24"),
            Some(AgeBracket::EighteenToTwentyFour)
        );
        assert_eq!(AgeBracket::from_code("24-36"), None);
    }

    #[test]
    fn age_counts_completed_months_only() {
        let birth = date(2024, 1, 15);
        assert_eq!(age_in_months(birth, date(2024, 1, 15)), Some(0));
        assert_eq!(age_in_months(birth, date(2024, 2, 14)), Some(0));
        assert_eq!(age_in_months(birth, date(2024, 2, 15)), Some(1));
        assert_eq!(age_in_months(birth, date(2026, 1, 20)), Some(24));
        assert_eq!(age_in_months(birth, date(2023, 12, 31)), None);
    }

    #[test]
    fn development_area_tags_map_to_known_areas() {
        assert_eq!(
            DevelopmentArea::from_tag("Gerak Kasar"),
            DevelopmentArea::GrossMotor
        );
        assert_eq!(
            DevelopmentArea::from_tag("fine_motor"),
            DevelopmentArea::FineMotor
        );
        assert_eq!(
            DevelopmentArea::from_tag("Bicara dan Bahasa"),
            DevelopmentArea::SpeechLanguage
        );
        assert_eq!(
            DevelopmentArea::from_tag("Sosialisasi & Kemandirian"),
            DevelopmentArea::SocialIndependence
        );
        let other = DevelopmentArea::from_tag(" Kognitif ");
        assert_eq!(other.label(), "Kognitif");
    }

    #[test]
    fn percentage_is_cosmetic_and_rounds_for_display() {
        let result = ScreeningResult {
            screening_id: None,
            total_yes: 2,
            total_no: 1,
            classification: Classification::Meragukan,
            recommended_action: "Stimulasi".to_string(),
            screening_date: date(2025, 3, 1),
        };
        assert!((result.percentage() - 66.67).abs() < 0.01);
        assert_eq!(result.display_percentage(), 67);
        assert_eq!(yes_percentage(0, 0), 0.0);
    }

    #[test]
    fn percentage_handles_totals_beyond_u32() {
        assert_eq!(yes_percentage(u32::MAX, u32::MAX), 50.0);
        assert_eq!(yes_percentage(u32::MAX, 0), 100.0);
    }

    #[test]
    fn classification_serializes_in_backend_casing() {
        let json = serde_json::to_string(&Classification::Penyimpangan).expect("serializes");
        assert_eq!(json, "\"PENYIMPANGAN\"");
        assert_eq!(
            Classification::parse("sesuai"),
            Some(Classification::Sesuai)
        );
    }

    #[test]
    fn record_without_bracket_covers_every_bracket() {
        let record = ScreeningRecord {
            id: ScreeningId::from("s-1"),
            child_id: ChildId::from("c-1"),
            questionnaire_id: QuestionnaireId::from("q-1"),
            bracket: None,
            classification: Classification::Sesuai,
            screening_date: date(2025, 1, 1),
        };
        assert!(AgeBracket::ordered()
            .into_iter()
            .all(|bracket| record.covers(bracket)));
    }
}
