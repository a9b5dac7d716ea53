//! Resolution of which habits are due on a calendar day.
//!
//! Schedules are not versioned: a past day is resolved against the habit's
//! current weekday set, so editing a schedule rewrites what counted as due
//! historically.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::calendar::day_of_week;
use crate::habit::{Completion, Habit};

pub fn is_due_on(habit: &Habit, date: NaiveDate) -> bool {
    habit.schedule.contains(day_of_week(date)) && habit.existed_on(date)
}

/// Habits due on `date`, in the order they were given.
pub fn habits_due_on(date: NaiveDate, habits: &[Habit]) -> Vec<&Habit> {
    habits.iter().filter(|habit| is_due_on(habit, date)).collect()
}

/// Completed habit ids keyed by day, built once per computation.
#[derive(Debug, Default)]
pub struct CompletionIndex {
    by_date: HashMap<NaiveDate, HashSet<i64>>,
}

impl CompletionIndex {
    pub fn new(completions: &[Completion]) -> Self {
        let mut by_date: HashMap<NaiveDate, HashSet<i64>> = HashMap::new();
        for completion in completions {
            by_date
                .entry(completion.date)
                .or_default()
                .insert(completion.habit_id);
        }
        Self { by_date }
    }

    pub fn is_completed(&self, habit_id: i64, date: NaiveDate) -> bool {
        self.by_date
            .get(&date)
            .is_some_and(|ids| ids.contains(&habit_id))
    }

    /// How many of `due` have a completion on `date`.
    pub fn count_completed(&self, due: &[&Habit], date: NaiveDate) -> usize {
        due.iter()
            .filter(|habit| self.is_completed(habit.id, date))
            .count()
    }
}
