use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tokio::sync::Notify;

use super::backend::{BackendError, ScopedBackend, ScreeningBackend};
use crate::auth::SessionContext;
use super::domain::{
    yes_percentage, AgeBracket, Child, ChildId, Classification, Questionnaire, QuestionnaireId,
    ScreeningId, ScreeningRecord, ScreeningResult, SubmissionPayload,
};

/// Backend stand-in holding everything in process memory.
///
/// It classifies submissions with the published KPSP bands and rejects a second
/// submission for the same child and questionnaire, like the real service.
#[derive(Debug, Clone)]
pub struct InMemoryScreeningBackend {
    inner: Arc<Mutex<MemoryState>>,
    failing_submissions: Arc<AtomicUsize>,
    offline: Arc<AtomicUsize>,
    submission_gate: Arc<Gate>,
    questionnaire_gate: Arc<Gate>,
    sequence: Arc<AtomicU64>,
    today: NaiveDate,
}

/// Parks calls until released, so a caller can be cut off mid-request.
#[derive(Debug, Default)]
struct Gate {
    held: AtomicBool,
    entered: Notify,
    released: Notify,
}

impl Gate {
    async fn pass(&self) {
        if self.held.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.released.notified().await;
        }
    }

    fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.released.notify_one();
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    children: Vec<Child>,
    questionnaires: HashMap<AgeBracket, Questionnaire>,
    history: Vec<ScreeningRecord>,
}

impl InMemoryScreeningBackend {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryState::default())),
            failing_submissions: Arc::new(AtomicUsize::new(0)),
            offline: Arc::new(AtomicUsize::new(0)),
            submission_gate: Arc::new(Gate::default()),
            questionnaire_gate: Arc::new(Gate::default()),
            sequence: Arc::new(AtomicU64::new(1)),
            today,
        }
    }

    pub fn with_child(self, child: Child) -> Self {
        self.lock().children.push(child);
        self
    }

    pub fn with_questionnaire(self, questionnaire: Questionnaire) -> Self {
        self.lock()
            .questionnaires
            .insert(questionnaire.bracket, questionnaire);
        self
    }

    pub fn with_record(self, record: ScreeningRecord) -> Self {
        self.lock().history.push(record);
        self
    }

    /// The next `count` submissions fail as if the network dropped.
    pub fn fail_next_submissions(&self, count: usize) {
        self.failing_submissions.store(count, Ordering::SeqCst);
    }

    /// The next `count` read calls fail as if the network dropped.
    pub fn fail_next_reads(&self, count: usize) {
        self.offline.store(count, Ordering::SeqCst);
    }

    /// Submissions wait inside the backend until `release_submissions`.
    pub fn hold_submissions(&self) {
        self.submission_gate.hold();
    }

    pub fn release_submissions(&self) {
        self.submission_gate.release();
    }

    /// Resolves once a held submission has reached the backend.
    pub async fn submission_received(&self) {
        self.submission_gate.entered.notified().await;
    }

    /// Questionnaire lookups wait inside the backend until `release_questionnaires`.
    pub fn hold_questionnaires(&self) {
        self.questionnaire_gate.hold();
    }

    pub fn release_questionnaires(&self) {
        self.questionnaire_gate.release();
    }

    pub async fn questionnaire_requested(&self) {
        self.questionnaire_gate.entered.notified().await;
    }

    pub fn history(&self) -> Vec<ScreeningRecord> {
        self.lock().history.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().expect("memory backend mutex poisoned")
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
    }

    fn check_reads(&self) -> Result<(), BackendError> {
        if Self::take_failure(&self.offline) {
            return Err(BackendError::Transport("connection reset by peer".to_string()));
        }
        Ok(())
    }

    fn next_screening_id(&self) -> ScreeningId {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        ScreeningId(format!("scr-{id:05}"))
    }
}

/// Classification bands applied by the backend: 80% and up, 50-79%, below 50%.
fn classify(total_yes: u32, total_no: u32) -> (Classification, &'static str) {
    let percentage = yes_percentage(total_yes, total_no);
    if percentage >= 80.0 {
        (
            Classification::Sesuai,
            "Lanjutkan stimulasi sesuai usia dan ikuti skrining berikutnya di Posyandu.",
        )
    } else if percentage >= 50.0 {
        (
            Classification::Meragukan,
            "Berikan stimulasi lebih sering dan lakukan skrining ulang dalam 2 minggu.",
        )
    } else {
        (
            Classification::Penyimpangan,
            "Rujuk anak ke Puskesmas atau rumah sakit untuk pemeriksaan lanjutan.",
        )
    }
}

/// Every caller sees the same posyandu.
impl ScopedBackend for InMemoryScreeningBackend {
    fn scoped(&self, _credential: SessionContext) -> Self {
        self.clone()
    }
}

impl ScreeningBackend for InMemoryScreeningBackend {
    async fn children(&self) -> Result<Vec<Child>, BackendError> {
        self.check_reads()?;
        Ok(self.lock().children.clone())
    }

    async fn questionnaire_for(
        &self,
        bracket: AgeBracket,
    ) -> Result<Option<Questionnaire>, BackendError> {
        self.check_reads()?;
        self.questionnaire_gate.pass().await;
        Ok(self.lock().questionnaires.get(&bracket).cloned())
    }

    async fn history_for(&self, child_id: &ChildId) -> Result<Vec<ScreeningRecord>, BackendError> {
        self.check_reads()?;
        Ok(self
            .lock()
            .history
            .iter()
            .filter(|record| &record.child_id == child_id)
            .cloned()
            .collect())
    }

    async fn submit(&self, payload: &SubmissionPayload) -> Result<ScreeningResult, BackendError> {
        self.submission_gate.pass().await;
        if Self::take_failure(&self.failing_submissions) {
            return Err(BackendError::Transport("connection timed out".to_string()));
        }

        let mut state = self.lock();

        if !state.children.iter().any(|child| child.id == payload.child_id) {
            return Err(BackendError::Rejected {
                status: 404,
                message: format!("child {} not found", payload.child_id),
            });
        }

        let questionnaire = state
            .questionnaires
            .values()
            .find(|questionnaire| questionnaire.id == payload.questionnaire_id)
            .ok_or_else(|| BackendError::Rejected {
                status: 404,
                message: format!("questionnaire {} not found", payload.questionnaire_id),
            })?;
        let bracket = questionnaire.bracket;

        let expected: HashSet<_> = questionnaire.questions.iter().map(|q| &q.id).collect();
        let answered: HashSet<_> = payload.answers.iter().map(|a| &a.question_id).collect();
        if expected != answered {
            return Err(BackendError::Rejected {
                status: 422,
                message: "answers do not match the questionnaire".to_string(),
            });
        }

        let duplicate = state.history.iter().any(|record| {
            record.child_id == payload.child_id && record.questionnaire_id == payload.questionnaire_id
        });
        if duplicate {
            return Err(BackendError::Rejected {
                status: 409,
                message: "screening already submitted for this child".to_string(),
            });
        }

        let total_yes = payload.answers.iter().filter(|a| a.answer).count() as u32;
        let total_no = payload.answers.len() as u32 - total_yes;
        let (classification, action) = classify(total_yes, total_no);
        let screening_id = self.next_screening_id();

        state.history.push(ScreeningRecord {
            id: screening_id.clone(),
            child_id: payload.child_id.clone(),
            questionnaire_id: QuestionnaireId(payload.questionnaire_id.0.clone()),
            bracket: Some(bracket),
            classification,
            screening_date: self.today,
        });

        Ok(ScreeningResult {
            screening_id: Some(screening_id),
            total_yes,
            total_no,
            classification,
            recommended_action: action.to_string(),
            screening_date: self.today,
        })
    }
}
