use chrono::NaiveDate;
use clap::ValueEnum;
use metrics_exporter_prometheus::PrometheusHandle;
use posyandu_kpsp::auth::SessionContext;
use posyandu_kpsp::config::BackendConfig;
use posyandu_kpsp::error::AppError;
use posyandu_kpsp::workflows::screening::{
    AgeBracket, Child, ChildId, Classification, DevelopmentArea, InMemoryScreeningBackend,
    Question, QuestionId, Questionnaire, QuestionnaireId, RestScreeningBackend, ScreeningId,
    ScreeningRecord,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Where screening data comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum BackendChoice {
    /// The Posyandu REST API at POSYANDU_API_BASE_URL
    #[default]
    Rest,
    /// Built-in sample children and questionnaires, kept in memory
    Demo,
}

pub(crate) fn rest_backend(config: &BackendConfig) -> Result<RestScreeningBackend, AppError> {
    let session = match &config.token {
        Some(token) => SessionContext::with_token(token.clone()),
        None => SessionContext::anonymous(),
    };
    Ok(RestScreeningBackend::new(config, session)?)
}

/// Backend for the HTTP API. It carries no credential of its own; every
/// session acts with the bearer token of the request that opened it.
pub(crate) fn served_rest_backend(config: &BackendConfig) -> Result<RestScreeningBackend, AppError> {
    Ok(RestScreeningBackend::new(config, SessionContext::anonymous())?)
}

type QuestionSpec = (&'static str, Option<&'static str>, DevelopmentArea);

fn demo_questionnaire(bracket: AgeBracket, name: &str, specs: Vec<QuestionSpec>) -> Questionnaire {
    Questionnaire {
        id: QuestionnaireId(format!("kpsp-{}", bracket.code())),
        name: name.to_string(),
        bracket,
        questions: specs
            .into_iter()
            .enumerate()
            .map(|(index, (text, instruction, area))| Question {
                id: QuestionId(format!("kpsp-{}-q{}", bracket.code(), index + 1)),
                text: text.to_string(),
                instruction: instruction.map(str::to_string),
                area,
            })
            .collect(),
    }
}

pub(crate) fn demo_questionnaires() -> Vec<Questionnaire> {
    use DevelopmentArea::{FineMotor, GrossMotor, SocialIndependence, SpeechLanguage};

    vec![
        demo_questionnaire(
            AgeBracket::ZeroToSix,
            "KPSP Usia 3 Bulan",
            vec![
                (
                    "Pada posisi tengkurap, apakah bayi dapat mengangkat kepala hingga 45 derajat?",
                    Some("Letakkan bayi tengkurap di alas yang rata."),
                    GrossMotor,
                ),
                ("Apakah bayi dapat menatap dan mengikuti wajah Anda?", None, SocialIndependence),
                ("Apakah bayi mengeluarkan suara selain menangis, misalnya ooo atau aaa?", None, SpeechLanguage),
                ("Apakah bayi dapat memegang mainan yang diletakkan di tangannya?", None, FineMotor),
                ("Apakah bayi tersenyum ketika diajak bicara atau tersenyum kepada Anda?", None, SocialIndependence),
            ],
        ),
        demo_questionnaire(
            AgeBracket::SixToTwelve,
            "KPSP Usia 9 Bulan",
            vec![
                ("Apakah bayi dapat duduk sendiri tanpa bersandar selama 60 detik?", None, GrossMotor),
                (
                    "Apakah bayi dapat memungut benda kecil dengan ibu jari dan jari telunjuk?",
                    Some("Letakkan kismis atau potongan roti di meja di depan bayi."),
                    FineMotor,
                ),
                ("Apakah bayi mengucapkan kata mama atau papa, walau belum berarti?", None, SpeechLanguage),
                ("Apakah bayi dapat bermain cilukba atau tepuk tangan bersama Anda?", None, SocialIndependence),
                ("Apakah bayi dapat memindahkan mainan dari satu tangan ke tangan lain?", None, FineMotor),
                ("Apakah bayi dapat berdiri dengan berpegangan pada kursi atau meja?", None, GrossMotor),
            ],
        ),
        demo_questionnaire(
            AgeBracket::TwelveToEighteen,
            "KPSP Usia 15 Bulan",
            vec![
                ("Apakah anak dapat berjalan sendiri beberapa langkah tanpa berpegangan?", None, GrossMotor),
                ("Apakah anak dapat menumpuk dua kubus tanpa menjatuhkannya?", Some("Gunakan kubus berukuran sekitar 2,5 cm."), FineMotor),
                ("Apakah anak dapat mengucapkan dua kata bermakna selain mama dan papa?", None, SpeechLanguage),
                ("Apakah anak dapat menunjuk apa yang diinginkannya tanpa menangis?", None, SocialIndependence),
                ("Apakah anak dapat minum dari gelas tanpa banyak tumpah?", None, SocialIndependence),
            ],
        ),
        demo_questionnaire(
            AgeBracket::EighteenToTwentyFour,
            "KPSP Usia 21 Bulan",
            vec![
                ("Apakah anak dapat berjalan mundur lima langkah?", None, GrossMotor),
                ("Apakah anak dapat mencoret-coret kertas dengan pensil?", None, FineMotor),
                ("Apakah anak dapat menyebut paling sedikit tiga bagian tubuhnya?", None, SpeechLanguage),
                ("Apakah anak dapat melepas pakaiannya sendiri, misalnya celana?", None, SocialIndependence),
                ("Apakah anak dapat menendang bola kecil ke depan tanpa berpegangan?", None, GrossMotor),
            ],
        ),
    ]
}

fn demo_child(id: &str, name: &str, age_in_months: u32, mother: &str) -> Child {
    Child {
        id: ChildId::from(id),
        full_name: name.to_string(),
        age_in_months,
        birth_date: None,
        mother_name: Some(mother.to_string()),
    }
}

/// Sample posyandu with one child per roster status.
pub(crate) fn demo_backend(today: NaiveDate) -> InMemoryScreeningBackend {
    let backend = InMemoryScreeningBackend::new(today)
        .with_child(demo_child("anak-001", "Aisyah Putri", 4, "Ibu Wulan"))
        .with_child(demo_child("anak-002", "Bima Saputra", 10, "Ibu Rina"))
        .with_child(demo_child("anak-003", "Citra Lestari", 16, "Ibu Dewi"))
        .with_child(demo_child("anak-004", "Dimas Pratama", 20, "Ibu Ayu"))
        .with_child(demo_child("anak-005", "Eka Ramadhan", 30, "Ibu Sari"))
        .with_record(ScreeningRecord {
            id: ScreeningId::from("scr-demo-1"),
            child_id: ChildId::from("anak-004"),
            questionnaire_id: QuestionnaireId::from("kpsp-18-24"),
            bracket: Some(AgeBracket::EighteenToTwentyFour),
            classification: Classification::Sesuai,
            screening_date: today,
        });

    demo_questionnaires()
        .into_iter()
        .fold(backend, InMemoryScreeningBackend::with_questionnaire)
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use posyandu_kpsp::workflows::screening::ScreeningBackend;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).expect("valid date")
    }

    #[test]
    fn demo_covers_every_bracket() {
        let brackets: Vec<_> = demo_questionnaires()
            .iter()
            .map(|questionnaire| questionnaire.bracket)
            .collect();
        assert_eq!(brackets, AgeBracket::ordered().to_vec());
        assert!(demo_questionnaires().iter().all(|q| !q.is_empty()));
    }

    #[tokio::test]
    async fn demo_backend_lists_sample_children() {
        let backend = demo_backend(today());
        let children = backend.children().await.expect("children");
        assert_eq!(children.len(), 5);

        let history = backend
            .history_for(&ChildId::from("anak-004"))
            .await
            .expect("history");
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn parse_date_reports_bad_input() {
        assert_eq!(parse_date(" 2025-06-15 "), Ok(today()));
        assert!(parse_date("15/06/2025").is_err());
    }
}
