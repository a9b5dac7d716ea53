pub mod calendar;
pub mod error;
pub mod habit;
pub mod history;
pub mod schedule;
pub mod service;
pub mod stats;
pub mod store;
pub mod streak;

pub use crate::calendar::{day_of_week, format_date, parse_local_date, DayOfWeek};
pub use crate::error::{HabitError, Result};
pub use crate::habit::{Completion, Habit, Schedule};
pub use crate::history::{DayDetail, HabitStatus, HistoryPeriod};
pub use crate::service::{HabitService, HabitServiceBuilder};
pub use crate::stats::CompletionStats;
pub use crate::store::{HabitStore, MemoryStore, SqliteStore};
pub use crate::streak::{StreakData, DEFAULT_STREAK_HORIZON_DAYS};
