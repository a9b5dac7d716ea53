use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::date_range;
use crate::habit::{Completion, Habit};
use crate::schedule::{habits_due_on, CompletionIndex};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionStats {
    pub completed: u32,
    pub expected: u32,
    pub percentage: u32,
}

impl CompletionStats {
    fn from_counts(completed: u32, expected: u32) -> Self {
        let percentage = if expected == 0 {
            0
        } else {
            // Half-up rounding of 100 * completed / expected.
            ((200 * u64::from(completed) + u64::from(expected)) / (2 * u64::from(expected))) as u32
        };
        Self {
            completed,
            expected,
            percentage,
        }
    }
}

/// Narrow a count to `u32`, pinning at `u32::MAX`.
pub(crate) fn saturating_count(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Due-versus-done totals for every day in `start..=end`.
///
/// Days where nothing is scheduled add nothing to either side. An inverted
/// range yields all zeros.
pub fn completion_stats(
    start: NaiveDate,
    end: NaiveDate,
    habits: &[Habit],
    completions: &[Completion],
) -> CompletionStats {
    let index = CompletionIndex::new(completions);
    let mut completed = 0u32;
    let mut expected = 0u32;
    for date in date_range(start, end) {
        let due = habits_due_on(date, habits);
        if due.is_empty() {
            continue;
        }
        expected = expected.saturating_add(saturating_count(due.len()));
        completed = completed.saturating_add(saturating_count(index.count_completed(&due, date)));
    }
    CompletionStats::from_counts(completed, expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{local_noon, DayOfWeek};
    use crate::habit::Schedule;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn habit(id: i64, days: &[DayOfWeek]) -> Habit {
        Habit {
            id,
            name: format!("habit {id}"),
            schedule: Schedule::new(days.iter().copied()).unwrap(),
            created_at: local_noon(ymd(2024, 1, 1)),
            deleted_at: None,
        }
    }

    fn done(id: i64, habit_id: i64, date: NaiveDate) -> Completion {
        Completion {
            id,
            habit_id,
            date,
            completed_at: local_noon(date),
        }
    }

    #[test]
    fn unscheduled_days_do_not_inflate_the_denominator() {
        let habits = vec![habit(1, &[DayOfWeek::Mon])];
        let stats = completion_stats(ymd(2024, 3, 1), ymd(2024, 3, 7), &habits, &[]);
        assert_eq!(stats.expected, 1);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.percentage, 0);
    }

    #[test]
    fn counts_completions_of_due_habits_only() {
        let habits = vec![habit(1, &DayOfWeek::ALL), habit(2, &[DayOfWeek::Mon])];
        let completions = vec![
            done(1, 1, ymd(2024, 3, 4)),
            done(2, 2, ymd(2024, 3, 4)),
            done(3, 1, ymd(2024, 3, 5)),
            // habit 2 is not scheduled on Wednesday
            done(4, 2, ymd(2024, 3, 6)),
        ];
        let stats = completion_stats(ymd(2024, 3, 4), ymd(2024, 3, 6), &habits, &completions);
        assert_eq!(stats.expected, 4);
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.percentage, 75);
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(CompletionStats::from_counts(1, 3).percentage, 33);
        assert_eq!(CompletionStats::from_counts(2, 3).percentage, 67);
        assert_eq!(CompletionStats::from_counts(1, 8).percentage, 13);
        assert_eq!(CompletionStats::from_counts(5, 5).percentage, 100);
    }

    #[test]
    fn counts_saturate_instead_of_wrapping() {
        assert_eq!(saturating_count(7), 7);
        assert_eq!(saturating_count(usize::MAX), u32::MAX);
        let stats = CompletionStats::from_counts(u32::MAX, u32::MAX);
        assert_eq!(stats.percentage, 100);
    }

    #[test]
    fn inverted_range_is_empty() {
        let habits = vec![habit(1, &DayOfWeek::ALL)];
        let stats = completion_stats(ymd(2024, 3, 7), ymd(2024, 3, 1), &habits, &[]);
        assert_eq!(stats, CompletionStats::default());
    }
}
