use chrono::NaiveDate;
use serde::Serialize;

use super::domain::{AgeBracket, Child, ChildId, ScreeningRecord};

/// Whether a child may enter the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Eligibility {
    Eligible,
    AgeOutOfRange,
    AlreadyScreened { screened_on: NaiveDate },
}

impl Eligibility {
    pub const fn is_selectable(self) -> bool {
        matches!(self, Self::Eligible)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Eligible => "BELUM DIISI",
            Self::AgeOutOfRange => "usia tidak sesuai",
            Self::AlreadyScreened { .. } => "SUDAH DIISI",
        }
    }
}

/// A child together with the screening history fetched for it.
#[derive(Debug, Clone)]
pub struct ChildHistory {
    pub child: Child,
    pub records: Vec<ScreeningRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub child: Child,
    pub bracket: Option<AgeBracket>,
    pub eligibility: Eligibility,
}

impl RosterEntry {
    fn evaluate(history: ChildHistory) -> Self {
        let ChildHistory { child, records } = history;
        let bracket = child.bracket();

        let eligibility = match bracket {
            None => Eligibility::AgeOutOfRange,
            Some(bracket) => records
                .iter()
                .filter(|record| record.child_id == child.id && record.covers(bracket))
                .map(|record| record.screening_date)
                .max()
                .map_or(Eligibility::Eligible, |screened_on| {
                    Eligibility::AlreadyScreened { screened_on }
                }),
        };

        Self {
            child,
            bracket,
            eligibility,
        }
    }
}

/// Children offered on the first wizard screen, in backend order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildRoster {
    entries: Vec<RosterEntry>,
}

impl ChildRoster {
    pub fn build(histories: Vec<ChildHistory>) -> Self {
        Self {
            entries: histories.into_iter().map(RosterEntry::evaluate).collect(),
        }
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn find(&self, child_id: &ChildId) -> Option<&RosterEntry> {
        self.entries.iter().find(|entry| &entry.child.id == child_id)
    }

    pub fn eligible(&self) -> impl Iterator<Item = &RosterEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.eligibility.is_selectable())
    }

    /// Flags a child as screened after a successful submission in this session.
    pub fn mark_screened(&mut self, child_id: &ChildId, screened_on: NaiveDate) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| &entry.child.id == child_id)
        {
            entry.eligibility = Eligibility::AlreadyScreened { screened_on };
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::screening::domain::{
        Classification, QuestionnaireId, ScreeningId,
    };

    fn child(id: &str, age: u32) -> Child {
        Child {
            id: ChildId::from(id),
            full_name: format!("Anak {id}"),
            age_in_months: age,
            birth_date: None,
            mother_name: None,
        }
    }

    fn record(child_id: &str, bracket: Option<AgeBracket>) -> ScreeningRecord {
        ScreeningRecord {
            id: ScreeningId::from("s-1"),
            child_id: ChildId::from(child_id),
            questionnaire_id: QuestionnaireId::from("kpsp-6"),
            bracket,
            classification: Classification::Sesuai,
            screening_date: NaiveDate::from_ymd_opt(2025, 2, 10).expect("valid"),
        }
    }

    #[test]
    fn out_of_range_children_are_listed_but_not_selectable() {
        let roster = ChildRoster::build(vec![
            ChildHistory {
                child: child("newborn", 0),
                records: Vec::new(),
            },
            ChildHistory {
                child: child("toddler", 25),
                records: Vec::new(),
            },
        ]);

        assert_eq!(roster.len(), 2);
        let newborn = roster.find(&ChildId::from("newborn")).expect("listed");
        assert_eq!(newborn.bracket, Some(AgeBracket::ZeroToSix));
        assert_eq!(newborn.eligibility, Eligibility::Eligible);

        let toddler = roster.find(&ChildId::from("toddler")).expect("listed");
        assert_eq!(toddler.eligibility, Eligibility::AgeOutOfRange);
        assert_eq!(toddler.eligibility.label(), "usia tidak sesuai");
        assert_eq!(roster.eligible().count(), 1);
    }

    #[test]
    fn prior_screening_for_current_bracket_disables_child() {
        let roster = ChildRoster::build(vec![
            ChildHistory {
                child: child("done", 8),
                records: vec![record("done", Some(AgeBracket::SixToTwelve))],
            },
            ChildHistory {
                child: child("older-bracket", 8),
                records: vec![record("older-bracket", Some(AgeBracket::ZeroToSix))],
            },
        ]);

        let done = roster.find(&ChildId::from("done")).expect("listed");
        assert!(matches!(
            done.eligibility,
            Eligibility::AlreadyScreened { .. }
        ));
        assert_eq!(done.eligibility.label(), "SUDAH DIISI");

        let older = roster.find(&ChildId::from("older-bracket")).expect("listed");
        assert_eq!(older.eligibility, Eligibility::Eligible);
    }

    #[test]
    fn records_without_bracket_block_any_screening() {
        let roster = ChildRoster::build(vec![ChildHistory {
            child: child("legacy", 14),
            records: vec![record("legacy", None)],
        }]);

        assert_eq!(roster.eligible().count(), 0);
    }

    #[test]
    fn mark_screened_updates_entry() {
        let mut roster = ChildRoster::build(vec![ChildHistory {
            child: child("c-1", 3),
            records: Vec::new(),
        }]);
        let today = NaiveDate::from_ymd_opt(2025, 5, 1).expect("valid");

        roster.mark_screened(&ChildId::from("c-1"), today);

        assert_eq!(
            roster.entries()[0].eligibility,
            Eligibility::AlreadyScreened { screened_on: today }
        );
    }
}
