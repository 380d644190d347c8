use std::collections::HashMap;

use serde::Serialize;

use super::domain::{yes_percentage, AnswerEntry, Question, QuestionId};

/// Yes/no counts over a question list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnswerTally {
    pub yes: u32,
    pub no: u32,
    pub unanswered: u32,
}

impl AnswerTally {
    pub fn percentage(&self) -> f64 {
        yes_percentage(self.yes, self.no)
    }
}

/// Answers for a single screening session, keyed by question. Later writes win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerStore {
    answers: HashMap<QuestionId, bool>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, question_id: QuestionId, value: bool) {
        self.answers.insert(question_id, value);
    }

    pub fn get(&self, question_id: &QuestionId) -> Option<bool> {
        self.answers.get(question_id).copied()
    }

    pub fn all_answered(&self, questions: &[Question]) -> bool {
        questions
            .iter()
            .all(|question| self.answers.contains_key(&question.id))
    }

    /// Questions without an answer, in questionnaire order.
    pub fn missing<'a>(&self, questions: &'a [Question]) -> Vec<&'a QuestionId> {
        questions
            .iter()
            .filter(|question| !self.answers.contains_key(&question.id))
            .map(|question| &question.id)
            .collect()
    }

    pub fn tally(&self, questions: &[Question]) -> AnswerTally {
        questions
            .iter()
            .fold(AnswerTally::default(), |mut tally, question| {
                match self.get(&question.id) {
                    Some(true) => tally.yes += 1,
                    Some(false) => tally.no += 1,
                    None => tally.unanswered += 1,
                }
                tally
            })
    }

    /// Answered entries in questionnaire order, ready for submission.
    pub fn entries(&self, questions: &[Question]) -> Vec<AnswerEntry> {
        questions
            .iter()
            .filter_map(|question| {
                self.get(&question.id).map(|answer| AnswerEntry {
                    question_id: question.id.clone(),
                    answer,
                })
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.answers.clear();
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::screening::domain::DevelopmentArea;

    fn questions(ids: &[&str]) -> Vec<Question> {
        ids.iter()
            .map(|id| Question {
                id: QuestionId::from(*id),
                text: format!("Pertanyaan {id}"),
                instruction: None,
                area: DevelopmentArea::GrossMotor,
            })
            .collect()
    }

    #[test]
    fn all_answered_ignores_answer_order() {
        let list = questions(&["q1", "q2", "q3"]);
        let mut forward = AnswerStore::new();
        let mut backward = AnswerStore::new();

        for question in &list {
            forward.set(question.id.clone(), true);
        }
        for question in list.iter().rev() {
            backward.set(question.id.clone(), false);
        }

        assert!(forward.all_answered(&list));
        assert!(backward.all_answered(&list));
    }

    #[test]
    fn all_answered_requires_every_listed_question() {
        let list = questions(&["q1", "q2", "q3"]);
        let mut store = AnswerStore::new();
        store.set(QuestionId::from("q1"), true);
        store.set(QuestionId::from("q3"), false);
        store.set(QuestionId::from("unrelated"), true);

        assert!(!store.all_answered(&list));
        assert_eq!(store.missing(&list), vec![&QuestionId::from("q2")]);
        assert!(store.all_answered(&list[..1]));
    }

    #[test]
    fn set_is_idempotent_and_overwrites() {
        let mut once = AnswerStore::new();
        once.set(QuestionId::from("q1"), true);

        let mut twice = AnswerStore::new();
        twice.set(QuestionId::from("q1"), true);
        twice.set(QuestionId::from("q1"), true);
        assert_eq!(once, twice);
        assert_eq!(twice.len(), 1);

        twice.set(QuestionId::from("q1"), false);
        assert_eq!(twice.get(&QuestionId::from("q1")), Some(false));
    }

    #[test]
    fn get_returns_none_until_answered_and_after_clear() {
        let mut store = AnswerStore::new();
        assert_eq!(store.get(&QuestionId::from("q1")), None);

        store.set(QuestionId::from("q1"), true);
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.get(&QuestionId::from("q1")), None);
    }

    #[test]
    fn tally_and_entries_follow_questionnaire_order() {
        let list = questions(&["q1", "q2", "q3", "q4"]);
        let mut store = AnswerStore::new();
        store.set(QuestionId::from("q3"), true);
        store.set(QuestionId::from("q1"), true);
        store.set(QuestionId::from("q2"), false);

        let tally = store.tally(&list);
        assert_eq!(
            tally,
            AnswerTally {
                yes: 2,
                no: 1,
                unanswered: 1
            }
        );

        let ids: Vec<_> = store
            .entries(&list)
            .into_iter()
            .map(|entry| entry.question_id.0)
            .collect();
        assert_eq!(ids, vec!["q1", "q2", "q3"]);
    }
}
