use crate::infra::demo_backend;
use chrono::{Local, NaiveDate};
use clap::Args;
use posyandu_kpsp::error::AppError;
use posyandu_kpsp::workflows::screening::{
    ChildId, InMemoryScreeningBackend, ScreeningSession, SessionError,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Child to screen. Defaults to the first selectable child.
    #[arg(long)]
    pub(crate) child: Option<String>,
    /// Answers as a string of y/t characters, one per question. Missing answers default to y.
    #[arg(long, default_value = "")]
    pub(crate) answers: String,
    /// Drop the first submission to show that the review survives a network failure.
    #[arg(long)]
    pub(crate) simulate_submit_failure: bool,
    /// Screening date used by the demo backend (defaults to today).
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

fn scripted_answer(script: &str, index: usize) -> bool {
    !matches!(script.chars().nth(index), Some('t' | 'T' | 'n' | 'N'))
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let backend = Arc::new(demo_backend(today));
    let mut session = ScreeningSession::new(Arc::clone(&backend));

    println!("KPSP screening demo ({today})");
    session.load_children().await?;

    println!("\nRoster");
    for entry in session.view().roster {
        println!(
            "  {:<10} {:<16} {:>2} bulan  {}",
            entry.child_id.as_str(),
            entry.full_name,
            entry.age_in_months,
            entry.status_label
        );
    }

    let child_id = match args.child {
        Some(id) => ChildId(id),
        None => match session.wizard().roster().eligible().next() {
            Some(entry) => entry.child.id.clone(),
            None => {
                println!("\nNo child is eligible for screening.");
                return Ok(());
            }
        },
    };

    session.select_child(&child_id).await?;
    let view = session.view();
    if let Some(fault) = view.fault {
        println!("\n{}", fault.message);
        return Ok(());
    }
    if let (Some(selection), Some(questionnaire)) = (view.selection, view.questionnaire) {
        println!(
            "\nScreening {} ({} bulan) with {} ({} questions)",
            selection.full_name,
            selection.age_in_months,
            questionnaire.name,
            questionnaire.total_questions
        );
    }

    session.confirm()?;
    let mut index = 0;
    while let Some(question) = session.view().question {
        let answer = scripted_answer(&args.answers, index);
        println!(
            "  [{}/{}] {} -> {}",
            question.position,
            question.total,
            question.text,
            if answer { "Ya" } else { "Tidak" }
        );
        session.answer(answer)?;
        session.next()?;
        index += 1;
    }

    if let Some(review) = session.view().review {
        println!(
            "\nReview: {} Ya / {} Tidak ({}% Ya)",
            review.tally.yes, review.tally.no, review.display_percentage
        );
    }

    if args.simulate_submit_failure {
        backend.fail_next_submissions(1);
        submit_reporting_failure(&mut session).await?;
    }

    let result = session.submit().await?;
    println!(
        "\nResult: {} ({} Ya / {} Tidak)",
        result.classification.label(),
        result.total_yes,
        result.total_no
    );
    println!("  {}", result.classification.interpretation());
    println!("  Tindak lanjut: {}", result.recommended_action);

    Ok(())
}

async fn submit_reporting_failure(
    session: &mut ScreeningSession<InMemoryScreeningBackend>,
) -> Result<(), AppError> {
    match session.submit().await {
        Err(SessionError::Backend(err)) => {
            let answered = session
                .view()
                .review
                .map_or(0, |review| review.tally.yes + review.tally.no);
            println!("\nSubmission failed: {err}");
            println!("  Still on review with {answered} answers kept; resending.");
            Ok(())
        }
        Err(err) => Err(err.into()),
        Ok(_) => Ok(()),
    }
}
