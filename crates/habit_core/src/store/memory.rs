use chrono::{DateTime, Local, NaiveDate};
use parking_lot::RwLock;

use super::HabitStore;
use crate::error::{HabitError, Result};
use crate::habit::{Completion, Habit, Schedule};

#[derive(Debug, Default)]
struct Tables {
    habits: Vec<Habit>,
    completions: Vec<Completion>,
    next_habit_id: i64,
    next_completion_id: i64,
}

impl Tables {
    fn active_habit_mut(&mut self, id: i64) -> Result<&mut Habit> {
        self.habits
            .iter_mut()
            .find(|habit| habit.id == id && habit.is_active())
            .ok_or(HabitError::NotFound(id))
    }
}

/// Process-local store, mainly for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HabitStore for MemoryStore {
    fn list_habits(&self, include_deleted: bool) -> Result<Vec<Habit>> {
        Ok(self
            .tables
            .read()
            .habits
            .iter()
            .filter(|habit| include_deleted || habit.is_active())
            .cloned()
            .collect())
    }

    fn habit(&self, id: i64) -> Result<Habit> {
        self.tables
            .read()
            .habits
            .iter()
            .find(|habit| habit.id == id)
            .cloned()
            .ok_or(HabitError::NotFound(id))
    }

    fn insert_habit(&self, name: &str, schedule: &Schedule, at: DateTime<Local>) -> Result<Habit> {
        let mut tables = self.tables.write();
        tables.next_habit_id += 1;
        let habit = Habit {
            id: tables.next_habit_id,
            name: name.to_string(),
            schedule: schedule.clone(),
            created_at: at,
            deleted_at: None,
        };
        tables.habits.push(habit.clone());
        Ok(habit)
    }

    fn update_habit(&self, id: i64, name: &str, schedule: &Schedule) -> Result<Habit> {
        let mut tables = self.tables.write();
        let habit = tables.active_habit_mut(id)?;
        habit.name = name.to_string();
        habit.schedule = schedule.clone();
        Ok(habit.clone())
    }

    fn soft_delete_habit(&self, id: i64, at: DateTime<Local>) -> Result<()> {
        let mut tables = self.tables.write();
        tables.active_habit_mut(id)?.deleted_at = Some(at);
        Ok(())
    }

    fn list_completions(&self, date: NaiveDate) -> Result<Vec<Completion>> {
        self.list_completions_in_range(date, date)
    }

    fn list_completions_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Completion>> {
        Ok(self
            .tables
            .read()
            .completions
            .iter()
            .filter(|completion| start <= completion.date && completion.date <= end)
            .cloned()
            .collect())
    }

    fn list_all_completions(&self) -> Result<Vec<Completion>> {
        Ok(self.tables.read().completions.clone())
    }

    fn upsert_or_delete_completion(
        &self,
        habit_id: i64,
        date: NaiveDate,
        at: DateTime<Local>,
    ) -> Result<bool> {
        // The write guard spans the lookup and the mutation.
        let mut tables = self.tables.write();
        if !tables.habits.iter().any(|habit| habit.id == habit_id) {
            return Err(HabitError::NotFound(habit_id));
        }
        if let Some(pos) = tables
            .completions
            .iter()
            .position(|c| c.habit_id == habit_id && c.date == date)
        {
            tables.completions.remove(pos);
            return Ok(false);
        }
        tables.next_completion_id += 1;
        let completion = Completion {
            id: tables.next_completion_id,
            habit_id,
            date,
            completed_at: at,
        };
        tables.completions.push(completion);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::calendar::{local_noon, DayOfWeek};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn toggle_alternates_and_keeps_one_row() {
        let store = MemoryStore::new();
        let now = local_noon(ymd(2024, 3, 1));
        let habit = store
            .insert_habit("Walk", &Schedule::every_day(), now)
            .unwrap();
        let day = ymd(2024, 3, 2);
        assert!(store.upsert_or_delete_completion(habit.id, day, now).unwrap());
        assert!(!store.upsert_or_delete_completion(habit.id, day, now).unwrap());
        assert!(store.upsert_or_delete_completion(habit.id, day, now).unwrap());
        assert_eq!(store.list_completions(day).unwrap().len(), 1);
    }

    #[test]
    fn deleted_habits_are_hidden_but_kept() {
        let store = MemoryStore::new();
        let now = local_noon(ymd(2024, 3, 1));
        let schedule = Schedule::new([DayOfWeek::Mon]).unwrap();
        let habit = store.insert_habit("Walk", &schedule, now).unwrap();
        store.soft_delete_habit(habit.id, now).unwrap();
        assert!(store.list_habits(false).unwrap().is_empty());
        assert_eq!(store.list_habits(true).unwrap().len(), 1);
        assert!(matches!(
            store.update_habit(habit.id, "Run", &schedule),
            Err(HabitError::NotFound(_))
        ));
        assert!(matches!(
            store.soft_delete_habit(habit.id, now),
            Err(HabitError::NotFound(_))
        ));
        assert!(store.habit(habit.id).unwrap().deleted_at.is_some());
    }

    #[test]
    fn concurrent_toggles_leave_at_most_one_row() {
        let store = Arc::new(MemoryStore::new());
        let now = local_noon(ymd(2024, 3, 1));
        let habit = store
            .insert_habit("Walk", &Schedule::every_day(), now)
            .unwrap();
        let habit_id = habit.id;
        let day = ymd(2024, 3, 2);
        let workers: Vec<_> = (0..7)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..51 {
                        store.upsert_or_delete_completion(habit_id, day, now).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        // 7 * 51 toggles is odd, so the pair ends up completed.
        assert_eq!(store.list_completions(day).unwrap().len(), 1);
        assert_eq!(store.list_all_completions().unwrap().len(), 1);
    }

    #[test]
    fn toggling_unknown_habit_fails() {
        let store = MemoryStore::new();
        let now = local_noon(ymd(2024, 3, 1));
        assert!(matches!(
            store.upsert_or_delete_completion(7, ymd(2024, 3, 1), now),
            Err(HabitError::NotFound(7))
        ));
    }
}
