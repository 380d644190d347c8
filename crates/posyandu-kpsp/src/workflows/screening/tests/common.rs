use std::sync::Arc;

use axum::body::to_bytes;
use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::workflows::screening::domain::{
    AgeBracket, Child, ChildId, Classification, DevelopmentArea, Question, QuestionId,
    Questionnaire, QuestionnaireId, ScreeningId, ScreeningRecord, ScreeningResult,
};
use crate::workflows::screening::memory::InMemoryScreeningBackend;
use crate::workflows::screening::registry::SessionRegistry;
use crate::workflows::screening::roster::{ChildHistory, ChildRoster};
use crate::workflows::screening::session::ScreeningSession;
use crate::workflows::screening::wizard::ScreeningWizard;

pub(super) const ELIGIBLE: &str = "c-ayu";
pub(super) const INFANT: &str = "c-bima";
pub(super) const TOO_OLD: &str = "c-citra";
pub(super) const SCREENED: &str = "c-dewi";

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 15).expect("valid date")
}

pub(super) fn child(id: &str, age_in_months: u32) -> Child {
    Child {
        id: ChildId::from(id),
        full_name: format!("Anak {id}"),
        age_in_months,
        birth_date: None,
        mother_name: Some("Ibu Sari".to_string()),
    }
}

pub(super) fn questionnaire(bracket: AgeBracket, size: usize) -> Questionnaire {
    let areas = [
        DevelopmentArea::GrossMotor,
        DevelopmentArea::FineMotor,
        DevelopmentArea::SpeechLanguage,
        DevelopmentArea::SocialIndependence,
    ];

    Questionnaire {
        id: QuestionnaireId(format!("kpsp-{}", bracket.code())),
        name: format!("KPSP {}", bracket.label()),
        bracket,
        questions: (1..=size)
            .map(|n| Question {
                id: QuestionId(format!("q{n}")),
                text: format!("Pertanyaan nomor {n}?"),
                instruction: (n == 1).then(|| "Amati anak saat bermain.".to_string()),
                area: areas[(n - 1) % areas.len()].clone(),
            })
            .collect(),
    }
}

pub(super) fn question_id(n: usize) -> QuestionId {
    QuestionId(format!("q{n}"))
}

pub(super) fn prior_record(child_id: &str, bracket: AgeBracket) -> ScreeningRecord {
    ScreeningRecord {
        id: ScreeningId::from("scr-prior"),
        child_id: ChildId::from(child_id),
        questionnaire_id: QuestionnaireId(format!("kpsp-{}", bracket.code())),
        bracket: Some(bracket),
        classification: Classification::Sesuai,
        screening_date: NaiveDate::from_ymd_opt(2025, 5, 2).expect("valid date"),
    }
}

pub(super) fn result(total_yes: u32, total_no: u32, classification: Classification) -> ScreeningResult {
    ScreeningResult {
        screening_id: Some(ScreeningId::from("scr-00001")),
        total_yes,
        total_no,
        classification,
        recommended_action: "Lanjutkan stimulasi.".to_string(),
        screening_date: today(),
    }
}

/// Four children covering every roster status, questionnaires of 10 questions
/// for the 0-6 and 6-12 brackets, and none for 12-18.
pub(super) fn backend() -> InMemoryScreeningBackend {
    InMemoryScreeningBackend::new(today())
        .with_child(child(ELIGIBLE, 8))
        .with_child(child(INFANT, 3))
        .with_child(child(TOO_OLD, 30))
        .with_child(child(SCREENED, 9))
        .with_questionnaire(questionnaire(AgeBracket::ZeroToSix, 10))
        .with_questionnaire(questionnaire(AgeBracket::SixToTwelve, 10))
        .with_record(prior_record(SCREENED, AgeBracket::SixToTwelve))
}

pub(super) fn roster() -> ChildRoster {
    ChildRoster::build(vec![
        ChildHistory {
            child: child(ELIGIBLE, 8),
            records: Vec::new(),
        },
        ChildHistory {
            child: child(TOO_OLD, 30),
            records: Vec::new(),
        },
        ChildHistory {
            child: child(SCREENED, 9),
            records: vec![prior_record(SCREENED, AgeBracket::SixToTwelve)],
        },
        ChildHistory {
            child: child("c-eko", 14),
            records: Vec::new(),
        },
    ])
}

/// Wizard with the roster loaded and the eligible 8-month-old answering a
/// questionnaire of `size` questions.
pub(super) fn answering_wizard(size: usize) -> ScreeningWizard {
    let mut wizard = ScreeningWizard::new();
    wizard.load_roster(roster()).expect("roster accepted");
    wizard
        .select_child(&ChildId::from(ELIGIBLE))
        .expect("eligible child");
    wizard
        .questionnaire_loaded(Some(questionnaire(AgeBracket::SixToTwelve, size)))
        .expect("questionnaire accepted");
    wizard.confirm_questionnaire().expect("confirmed");
    wizard
}

/// Answers every question in order with `answers` and lands on review.
pub(super) fn reviewing_wizard(answers: &[bool]) -> ScreeningWizard {
    let mut wizard = answering_wizard(answers.len());
    for value in answers {
        wizard.answer(*value).expect("answer recorded");
        wizard.next().expect("advance");
    }
    wizard
}

pub(super) fn session(backend: &InMemoryScreeningBackend) -> ScreeningSession<InMemoryScreeningBackend> {
    ScreeningSession::new(Arc::new(backend.clone()))
}

pub(super) fn registry(
    backend: &InMemoryScreeningBackend,
) -> Arc<SessionRegistry<InMemoryScreeningBackend>> {
    Arc::new(SessionRegistry::new(Arc::new(backend.clone())))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json payload")
}
