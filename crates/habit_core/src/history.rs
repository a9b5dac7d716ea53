use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::calendar::date_range;
use crate::habit::{Completion, Habit};
use crate::schedule::{habits_due_on, CompletionIndex};
use crate::stats::saturating_count;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HabitStatus {
    pub id: i64,
    pub name: String,
    pub completed: bool,
}

/// One day of the history breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayDetail {
    pub date: NaiveDate,
    pub completed: u32,
    pub total: u32,
    pub habits: Vec<HabitStatus>,
}

impl DayDetail {
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

/// Preset windows offered by the history view, all ending on `today`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HistoryPeriod {
    Week,
    Month,
    Year,
    Custom { start: NaiveDate, end: NaiveDate },
}

impl HistoryPeriod {
    pub fn range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = match self {
            Self::Week => today.checked_sub_days(Days::new(6)),
            Self::Month => today.checked_sub_days(Days::new(29)),
            Self::Year => today.checked_sub_months(Months::new(12)),
            Self::Custom { start, end } => return (*start, *end),
        };
        (start.unwrap_or(NaiveDate::MIN), today)
    }
}

/// Per-day breakdown for `start..=end`, newest day first. Days with nothing
/// scheduled are left out.
pub fn build_history(
    start: NaiveDate,
    end: NaiveDate,
    habits: &[Habit],
    completions: &[Completion],
) -> Vec<DayDetail> {
    let index = CompletionIndex::new(completions);
    let mut days: Vec<DayDetail> = date_range(start, end)
        .filter_map(|date| {
            let due = habits_due_on(date, habits);
            if due.is_empty() {
                return None;
            }
            let statuses: Vec<HabitStatus> = due
                .iter()
                .map(|habit| HabitStatus {
                    id: habit.id,
                    name: habit.name.clone(),
                    completed: index.is_completed(habit.id, date),
                })
                .collect();
            Some(DayDetail {
                date,
                completed: saturating_count(statuses.iter().filter(|s| s.completed).count()),
                total: saturating_count(statuses.len()),
                habits: statuses,
            })
        })
        .collect();
    days.reverse();
    days
}
