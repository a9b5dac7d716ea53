//! Current and longest "everything done" streaks.
//!
//! The walk starts at `today` and steps backwards one day at a time for a
//! bounded number of days. Rules per day:
//!
//! - nothing due: the running chain is broken and reset, the day itself
//!   neither counts nor misses;
//! - everything due was completed: the running chain grows; until the first
//!   break it is also the current streak;
//! - something due was missed: the chain breaks, except on `today`, which is
//!   still in progress and is skipped without penalty.
//!
//! Unlike [`crate::stats::completion_stats`], which ignores unscheduled days,
//! an unscheduled day here ends a streak.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::habit::{Completion, Habit};
use crate::schedule::{habits_due_on, CompletionIndex};

/// How far back streaks look unless configured otherwise.
pub const DEFAULT_STREAK_HORIZON_DAYS: u32 = 365;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreakData {
    pub current: u32,
    pub longest: u32,
}

/// `habits` must include soft-deleted habits so past days resolve correctly.
pub fn compute_streaks(
    today: NaiveDate,
    habits: &[Habit],
    completions: &[Completion],
    horizon_days: u32,
) -> StreakData {
    if habits.is_empty() {
        return StreakData::default();
    }

    let index = CompletionIndex::new(completions);
    let mut result = StreakData::default();
    let mut running = 0u32;
    let mut broken = false;

    for offset in 0..horizon_days {
        let Some(date) = today.checked_sub_days(Days::new(u64::from(offset))) else {
            break;
        };
        let due = habits_due_on(date, habits);
        if due.is_empty() {
            broken = true;
            running = 0;
            continue;
        }

        if index.count_completed(&due, date) == due.len() {
            running += 1;
            if !broken {
                result.current = running;
            }
            result.longest = result.longest.max(running);
        } else if offset == 0 {
            continue;
        } else {
            broken = true;
            running = 0;
        }
    }

    result
}
