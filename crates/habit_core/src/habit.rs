use std::collections::BTreeSet;

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::calendar::{local_date, DayOfWeek};
use crate::error::{HabitError, Result};

/// The weekdays a habit recurs on. Always non-empty once validated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(into = "Vec<DayOfWeek>", try_from = "Vec<DayOfWeek>")]
pub struct Schedule(BTreeSet<DayOfWeek>);

impl Schedule {
    pub fn new(days: impl IntoIterator<Item = DayOfWeek>) -> Result<Self> {
        let days: BTreeSet<DayOfWeek> = days.into_iter().collect();
        if days.is_empty() {
            return Err(HabitError::Validation(
                "a habit needs at least one scheduled day".into(),
            ));
        }
        Ok(Self(days))
    }

    pub fn every_day() -> Self {
        Self(DayOfWeek::ALL.into_iter().collect())
    }

    /// Parse the comma-joined token list stored in the `days` column.
    pub fn parse_csv(raw: &str) -> Result<Self> {
        let days = raw
            .split(',')
            .filter(|token| !token.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<DayOfWeek>>>()?;
        Self::new(days)
    }

    pub fn to_csv(&self) -> String {
        self.0
            .iter()
            .map(DayOfWeek::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn contains(&self, day: DayOfWeek) -> bool {
        self.0.contains(&day)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Short human summary used by habit listings.
    pub fn describe(&self) -> String {
        if self.0.len() == DayOfWeek::ALL.len() {
            return "Every day".to_string();
        }
        let weekend_days = self.0.iter().filter(|day| day.is_weekend()).count();
        if weekend_days == 0 && self.0.len() == 5 {
            return "Weekdays".to_string();
        }
        if weekend_days == 2 && self.0.len() == 2 {
            return "Weekends".to_string();
        }
        self.0
            .iter()
            .map(DayOfWeek::label)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl TryFrom<Vec<DayOfWeek>> for Schedule {
    type Error = HabitError;

    fn try_from(days: Vec<DayOfWeek>) -> Result<Self> {
        Self::new(days)
    }
}

impl From<Schedule> for Vec<DayOfWeek> {
    fn from(schedule: Schedule) -> Self {
        schedule.0.into_iter().collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Habit {
    pub id: i64,
    pub name: String,
    pub schedule: Schedule,
    pub created_at: DateTime<Local>,
    pub deleted_at: Option<DateTime<Local>>,
}

impl Habit {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn created_on(&self) -> NaiveDate {
        local_date(&self.created_at)
    }

    pub fn deleted_on(&self) -> Option<NaiveDate> {
        self.deleted_at.as_ref().map(local_date)
    }

    /// Whether `date` falls inside the created..deleted window. A habit deleted
    /// during a day still counts for that whole day.
    pub fn existed_on(&self, date: NaiveDate) -> bool {
        self.created_on() <= date && self.deleted_on().map_or(true, |deleted| deleted >= date)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Completion {
    pub id: i64,
    pub habit_id: i64,
    pub date: NaiveDate,
    pub completed_at: DateTime<Local>,
}

/// Normalise and check user-provided habit fields before any store mutation.
pub fn validate_habit_input(name: &str, days: &[DayOfWeek]) -> Result<(String, Schedule)> {
    let name = name.trim();
    if name.is_empty() {
        return Err(HabitError::Validation("habit name must not be empty".into()));
    }
    let schedule = Schedule::new(days.iter().copied())?;
    Ok((name.to_string(), schedule))
}
