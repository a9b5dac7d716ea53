//! Persistence boundary for habits and completions.
//!
//! Stores never read the clock: every timestamp is supplied by the caller.
//! Implementations must make [`HabitStore::upsert_or_delete_completion`]
//! atomic so a `(habit_id, date)` pair never gets two rows.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Local, NaiveDate};

use crate::error::Result;
use crate::habit::{Completion, Habit, Schedule};

pub trait HabitStore: Send + Sync {
    fn list_habits(&self, include_deleted: bool) -> Result<Vec<Habit>>;

    /// Any habit by id, deleted or not.
    fn habit(&self, id: i64) -> Result<Habit>;

    fn insert_habit(&self, name: &str, schedule: &Schedule, at: DateTime<Local>) -> Result<Habit>;

    /// Fails with `NotFound` for unknown or soft-deleted ids.
    fn update_habit(&self, id: i64, name: &str, schedule: &Schedule) -> Result<Habit>;

    /// Fails with `NotFound` for unknown or already deleted ids.
    fn soft_delete_habit(&self, id: i64, at: DateTime<Local>) -> Result<()>;

    fn list_completions(&self, date: NaiveDate) -> Result<Vec<Completion>>;

    /// Completions with `start <= date <= end`.
    fn list_completions_in_range(&self, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<Completion>>;

    fn list_all_completions(&self) -> Result<Vec<Completion>>;

    /// Insert a completion if none exists for the pair, otherwise delete it.
    /// Returns the new completion state.
    fn upsert_or_delete_completion(
        &self,
        habit_id: i64,
        date: NaiveDate,
        at: DateTime<Local>,
    ) -> Result<bool>;
}
