use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate};
use tracing::{debug, info, instrument};

use crate::{
    calendar::{local_date, DayOfWeek},
    error::{HabitError, Result},
    habit::{validate_habit_input, Completion, Habit},
    history::{self, DayDetail},
    schedule,
    stats::{self, saturating_count, CompletionStats},
    store::{HabitStore, MemoryStore, SqliteStore},
    streak::{self, StreakData, DEFAULT_STREAK_HORIZON_DAYS},
};

/// Source of "now". Injected so tests can pin the calendar.
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

pub struct HabitService {
    store: Box<dyn HabitStore>,
    streak_horizon_days: u32,
    clock: Clock,
}

pub struct HabitServiceBuilder {
    store: Option<Box<dyn HabitStore>>,
    database_path: Option<PathBuf>,
    streak_horizon_days: u32,
    clock: Option<Clock>,
}

impl HabitServiceBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            database_path: None,
            streak_horizon_days: DEFAULT_STREAK_HORIZON_DAYS,
            clock: None,
        }
    }

    pub fn with_store(mut self, store: impl HabitStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Open (or create) a sqlite database at `path` when building. Ignored if
    /// an explicit store was supplied.
    pub fn database_path(mut self, path: impl AsRef<Path>) -> Self {
        self.database_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn streak_horizon_days(mut self, days: u32) -> Self {
        self.streak_horizon_days = days;
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Local> + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn build(self) -> Result<HabitService> {
        if self.streak_horizon_days == 0 {
            return Err(HabitError::Validation(
                "streak horizon must be at least one day".into(),
            ));
        }
        let store: Box<dyn HabitStore> = match (self.store, self.database_path) {
            (Some(store), _) => store,
            (None, Some(path)) => Box::new(SqliteStore::open(path)?),
            (None, None) => Box::new(MemoryStore::new()),
        };
        Ok(HabitService {
            store,
            streak_horizon_days: self.streak_horizon_days,
            clock: self.clock.unwrap_or_else(|| Arc::new(Local::now) as Clock),
        })
    }
}

impl Default for HabitServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HabitService {
    pub fn builder() -> HabitServiceBuilder {
        HabitServiceBuilder::new()
    }

    pub fn now(&self) -> DateTime<Local> {
        (self.clock)()
    }

    pub fn today(&self) -> NaiveDate {
        local_date(&self.now())
    }

    #[instrument(skip(self))]
    pub fn create_habit(&self, name: &str, days: &[DayOfWeek]) -> Result<Habit> {
        let (name, schedule) = validate_habit_input(name, days)?;
        let habit = self.store.insert_habit(&name, &schedule, self.now())?;
        info!(id = habit.id, schedule = %schedule.to_csv(), "habit created");
        Ok(habit)
    }

    /// Rename or reschedule a habit. The new schedule applies to past days too.
    #[instrument(skip(self))]
    pub fn update_habit(&self, id: i64, name: &str, days: &[DayOfWeek]) -> Result<Habit> {
        let (name, schedule) = validate_habit_input(name, days)?;
        let habit = self.store.update_habit(id, &name, &schedule)?;
        info!(id, "habit updated");
        Ok(habit)
    }

    /// Soft delete: the habit stops being due after today but its history stays.
    #[instrument(skip(self))]
    pub fn delete_habit(&self, id: i64) -> Result<()> {
        self.store.soft_delete_habit(id, self.now())?;
        info!(id, "habit deleted");
        Ok(())
    }

    pub fn habit(&self, id: i64) -> Result<Habit> {
        self.store.habit(id)
    }

    pub fn active_habits(&self) -> Result<Vec<Habit>> {
        self.store.list_habits(false)
    }

    pub fn all_habits(&self) -> Result<Vec<Habit>> {
        self.store.list_habits(true)
    }

    pub fn habits_due_on(&self, date: NaiveDate) -> Result<Vec<Habit>> {
        let habits = self.store.list_habits(true)?;
        Ok(schedule::habits_due_on(date, &habits)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn today_habits(&self) -> Result<Vec<Habit>> {
        self.habits_due_on(self.today())
    }

    pub fn is_completed(&self, habit_id: i64, date: NaiveDate) -> Result<bool> {
        Ok(self
            .store
            .list_completions(date)?
            .iter()
            .any(|completion| completion.habit_id == habit_id))
    }

    /// Flip the completion state of `habit_id` on `date`, returning the new state.
    #[instrument(skip(self))]
    pub fn toggle_completion(&self, habit_id: i64, date: NaiveDate) -> Result<bool> {
        let completed = self
            .store
            .upsert_or_delete_completion(habit_id, date, self.now())?;
        debug!(habit_id, %date, completed, "completion toggled");
        Ok(completed)
    }

    pub fn completions_on(&self, date: NaiveDate) -> Result<HashSet<i64>> {
        Ok(self
            .store
            .list_completions(date)?
            .into_iter()
            .map(|completion| completion.habit_id)
            .collect())
    }

    pub fn completions_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Completion>> {
        self.store.list_completions_in_range(start, end)
    }

    /// `(completed, total)` for habits due today.
    pub fn today_progress(&self) -> Result<(u32, u32)> {
        let today = self.today();
        let due = self.habits_due_on(today)?;
        let done = self.completions_on(today)?;
        let completed = due.iter().filter(|habit| done.contains(&habit.id)).count();
        Ok((saturating_count(completed), saturating_count(due.len())))
    }

    pub fn completion_stats(&self, start: NaiveDate, end: NaiveDate) -> Result<CompletionStats> {
        if start > end {
            return Ok(CompletionStats::default());
        }
        let habits = self.store.list_habits(true)?;
        let completions = self.store.list_completions_in_range(start, end)?;
        Ok(stats::completion_stats(start, end, &habits, &completions))
    }

    pub fn history(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DayDetail>> {
        if start > end {
            return Ok(Vec::new());
        }
        let habits = self.store.list_habits(true)?;
        let completions = self.store.list_completions_in_range(start, end)?;
        Ok(history::build_history(start, end, &habits, &completions))
    }

    pub fn streaks(&self) -> Result<StreakData> {
        self.streaks_as_of(self.today())
    }

    pub fn streaks_as_of(&self, today: NaiveDate) -> Result<StreakData> {
        let habits = self.store.list_habits(true)?;
        if habits.is_empty() {
            return Ok(StreakData::default());
        }
        let completions = self.store.list_all_completions()?;
        Ok(streak::compute_streaks(
            today,
            &habits,
            &completions,
            self.streak_horizon_days,
        ))
    }
}
