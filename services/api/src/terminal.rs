//! Line-oriented rendition of the screening wizard for the `screen` command.

use crate::infra::{demo_backend, rest_backend, BackendChoice};
use chrono::{Local, NaiveDate};
use clap::Args;
use posyandu_kpsp::config::AppConfig;
use posyandu_kpsp::error::AppError;
use posyandu_kpsp::telemetry;
use posyandu_kpsp::workflows::screening::views::{answer_label, ReviewSummary};
use posyandu_kpsp::workflows::screening::{
    ChildId, ScreeningBackend, ScreeningSession, SessionError, WizardStage, WizardView,
};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::warn;

#[derive(Args, Debug, Default)]
pub(crate) struct ScreenArgs {
    /// Data source for children, questionnaires and submissions
    #[arg(long, value_enum, default_value_t)]
    pub(crate) backend: BackendChoice,
    /// Screening date for the demo backend (defaults to today)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

pub(crate) async fn run_screen(args: ScreenArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    match args.backend {
        BackendChoice::Rest => screen_with(rest_backend(&config.backend)?).await,
        BackendChoice::Demo => {
            let today = args.today.unwrap_or_else(|| Local::now().date_naive());
            screen_with(demo_backend(today)).await
        }
    }
}

async fn screen_with<B>(backend: B) -> Result<(), AppError>
where
    B: ScreeningBackend + 'static,
{
    let mut session = ScreeningSession::new(Arc::new(backend));
    if let Err(err) = session.load_children().await {
        // the wizard is now on its error screen and offers a retry
        warn!(error = %err, "initial roster load failed");
    }

    let stdin = std::io::stdin();
    run_terminal(&mut session, stdin.lock(), std::io::stdout()).await
}

enum Step {
    Done,
    Quit,
    Unknown,
}

pub(crate) async fn run_terminal<B, R, W>(
    session: &mut ScreeningSession<B>,
    mut input: R,
    mut output: W,
) -> Result<(), AppError>
where
    B: ScreeningBackend + 'static,
    R: BufRead,
    W: Write,
{
    loop {
        let view = session.view();
        render(&view, &mut output)?;
        write!(output, "> ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(());
        }
        let command = line.trim();

        match dispatch(session, &view, command).await {
            Ok(Step::Done) => {}
            Ok(Step::Quit) => {
                writeln!(output, "Sampai jumpa.")?;
                return Ok(());
            }
            Ok(Step::Unknown) => writeln!(output, "Perintah tidak dikenal: '{command}'")?,
            Err(SessionError::Backend(err)) => {
                writeln!(output, "! Gagal menghubungi server: {err}")?
            }
            Err(SessionError::Wizard(err)) => writeln!(output, "! {err}")?,
        }
    }
}

async fn dispatch<B>(
    session: &mut ScreeningSession<B>,
    view: &WizardView,
    command: &str,
) -> Result<Step, SessionError>
where
    B: ScreeningBackend + 'static,
{
    let (verb, rest) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(verb, rest)| (verb, rest.trim()));

    match (view.stage, verb.to_lowercase().as_str()) {
        (_, "x") => return Ok(Step::Quit),
        (_, "b") => session.new_assessment().await?,
        (WizardStage::SelectChild, number) => {
            let Some(entry) = number
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|index| view.roster.get(index))
            else {
                return Ok(Step::Unknown);
            };
            let child_id: ChildId = entry.child_id.clone();
            session.select_child(&child_id).await?;
        }
        (WizardStage::SelectQuestionnaire, "y") => session.confirm()?,
        (WizardStage::Answering, "y") => {
            session.answer(true)?;
            session.next()?;
        }
        (WizardStage::Answering, "t") => {
            session.answer(false)?;
            session.next()?;
        }
        (WizardStage::Answering, "k") => session.previous()?,
        (WizardStage::Answering, "l") => {
            session.next()?;
        }
        (WizardStage::Review, "s") => {
            session.submit().await?;
        }
        (WizardStage::Review, "e") => session.edit()?,
        (WizardStage::Answering | WizardStage::Review, "c") => {
            session.set_notes(Some(rest.to_string()))?
        }
        (WizardStage::Error, "r") => session.retry().await?,
        _ => return Ok(Step::Unknown),
    }
    Ok(Step::Done)
}

fn render<W: Write>(view: &WizardView, output: &mut W) -> std::io::Result<()> {
    writeln!(output)?;
    writeln!(output, "== {} ==", view.stage_label)?;

    if let Some(selection) = &view.selection {
        writeln!(
            output,
            "Anak: {} ({} bulan, kelompok {})",
            selection.full_name, selection.age_in_months, selection.bracket_label
        )?;
    }

    match view.stage {
        WizardStage::SelectChild => {
            if view.roster.is_empty() {
                writeln!(output, "Belum ada data anak.")?;
            }
            for (index, entry) in view.roster.iter().enumerate() {
                let marker = if entry.selectable { ' ' } else { '-' };
                writeln!(
                    output,
                    "{marker}{:>2}. {} ({} bulan) - {}",
                    index + 1,
                    entry.full_name,
                    entry.age_in_months,
                    entry.status_label
                )?;
            }
            writeln!(output, "Ketik nomor anak, [b] muat ulang, [x] keluar")?;
        }
        WizardStage::SelectQuestionnaire => {
            if let Some(questionnaire) = &view.questionnaire {
                writeln!(
                    output,
                    "Kuesioner: {} ({} pertanyaan)",
                    questionnaire.name, questionnaire.total_questions
                )?;
            }
            writeln!(output, "[y] mulai, [b] batal, [x] keluar")?;
        }
        WizardStage::Answering => {
            if let Some(question) = &view.question {
                writeln!(
                    output,
                    "Pertanyaan {}/{} ({}%)",
                    question.position, question.total, question.progress_percent
                )?;
                writeln!(output, "[{}] {}", question.area_label, question.text)?;
                if let Some(instruction) = &question.instruction {
                    writeln!(output, "  Petunjuk: {instruction}")?;
                }
                if question.answer.is_some() {
                    writeln!(output, "  Jawaban saat ini: {}", answer_label(question.answer))?;
                }
            }
            writeln!(
                output,
                "[y] Ya, [t] Tidak, [k] kembali, [l] lanjut, [c <teks>] catatan, [x] keluar"
            )?;
        }
        WizardStage::Review => {
            if let Some(review) = &view.review {
                render_review(review, output)?;
            }
            if view.submitting {
                writeln!(output, "Mengirim...")?;
            }
            writeln!(
                output,
                "[s] kirim, [e] ubah jawaban, [c <teks>] catatan, [b] batal, [x] keluar"
            )?;
        }
        WizardStage::Submitted => {
            if let Some(result) = &view.result {
                writeln!(output, "Kuesioner: {}", result.questionnaire_name)?;
                writeln!(
                    output,
                    "Hasil: {} ({}% jawaban Ya, {} Ya / {} Tidak)",
                    result.classification_label,
                    result.percentage,
                    result.total_yes,
                    result.total_no
                )?;
                writeln!(output, "{}", result.interpretation)?;
                if !result.recommended_action.is_empty() {
                    writeln!(output, "Tindak lanjut: {}", result.recommended_action)?;
                }
                writeln!(output, "Tanggal skrining: {}", result.screening_date)?;
            }
            writeln!(output, "[b] skrining baru, [x] keluar")?;
        }
        WizardStage::Error => {
            if let Some(fault) = &view.fault {
                writeln!(output, "{}", fault.message)?;
                if fault.retryable {
                    writeln!(output, "[r] coba lagi, [b] skrining baru, [x] keluar")?;
                } else {
                    writeln!(output, "[b] skrining baru, [x] keluar")?;
                }
            }
        }
    }

    if let Some(notice) = &view.notice {
        writeln!(output, "! {}", notice.message())?;
    }
    Ok(())
}

fn render_review<W: Write>(review: &ReviewSummary, output: &mut W) -> std::io::Result<()> {
    for item in &review.items {
        writeln!(output, "{:>2}. [{}] {}", item.position, item.answer_label, item.text)?;
    }
    writeln!(
        output,
        "Ya: {}, Tidak: {} ({}% Ya)",
        review.tally.yes, review.tally.no, review.display_percentage
    )?;
    if let Some(notes) = &review.notes {
        writeln!(output, "Catatan: {notes}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::demo_backend;
    use chrono::NaiveDate;
    use posyandu_kpsp::workflows::screening::InMemoryScreeningBackend;
    use std::io::Cursor;
    use std::sync::Arc;

    fn backend() -> InMemoryScreeningBackend {
        demo_backend(NaiveDate::from_ymd_opt(2025, 6, 15).expect("valid date"))
    }

    async fn run_script(backend: &InMemoryScreeningBackend, script: &str) -> String {
        let mut session = ScreeningSession::new(Arc::new(backend.clone()));
        session.load_children().await.expect("roster loads");
        let mut output = Vec::new();
        run_terminal(&mut session, Cursor::new(script.to_string()), &mut output)
            .await
            .expect("terminal runs");
        String::from_utf8(output).expect("utf-8 output")
    }

    #[tokio::test]
    async fn scripted_screening_reaches_result() {
        let backend = backend();
        let output = run_script(&backend, "1\ny\ny\nt\ny\ny\nt\nc Rewel saat diperiksa\ns\nx\n").await;

        assert!(output.contains("Aisyah Putri"));
        assert!(output.contains("Pertanyaan 1/5 (20%)"));
        assert!(output.contains("Ya: 3, Tidak: 2 (60% Ya)"));
        assert!(output.contains("Catatan: Rewel saat diperiksa"));
        assert!(output.contains("Hasil: MERAGUKAN"));
        assert!(output.ends_with("Sampai jumpa.\n"));
        assert_eq!(backend.history().len(), 2);
    }

    #[tokio::test]
    async fn continuing_without_answer_shows_validation_message() {
        let output = run_script(&backend(), "1\ny\nl\n").await;

        assert!(output.contains("Silakan pilih jawaban Ya atau Tidak"));
        assert!(output.contains("Pertanyaan 1/5"));
    }

    #[tokio::test]
    async fn screened_and_out_of_range_children_are_refused() {
        let output = run_script(&backend(), "4\n5\n9\n").await;

        assert!(output.contains("SUDAH DIISI"));
        assert!(output.contains("usia tidak sesuai"));
        assert!(output.contains("cannot be screened"));
        assert!(output.contains("Perintah tidak dikenal: '9'"));
    }

    #[tokio::test]
    async fn failed_submission_can_be_resent() {
        let backend = backend();
        backend.fail_next_submissions(1);

        let output = run_script(&backend, "1\ny\ny\ny\ny\ny\ny\ns\ns\n").await;

        assert!(output.contains("! Gagal menghubungi server"));
        assert!(output.contains("Jawaban tetap tersimpan"));
        assert!(output.contains("Hasil: SESUAI"));
    }
}
