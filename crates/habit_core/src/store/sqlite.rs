use std::path::Path;

use chrono::{DateTime, Local, NaiveDate};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::debug;

use super::HabitStore;
use crate::calendar::{format_date, parse_local_date};
use crate::error::{HabitError, Result};
use crate::habit::{Completion, Habit, Schedule};

const HABIT_COLUMNS: &str = "id, name, days, created_at, deleted_at";
const COMPLETION_COLUMNS: &str = "id, habit_id, date, completed_at";

/// SQLite-backed store. Timestamps are Unix milliseconds, dates are
/// `YYYY-MM-DD` text so range queries can compare them lexically.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening habit database");
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version < 1 {
        debug!(from = version, "creating habit schema");
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS habits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                days TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                deleted_at INTEGER
            );

            CREATE TABLE IF NOT EXISTS completions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                habit_id INTEGER NOT NULL REFERENCES habits(id) ON DELETE CASCADE,
                date TEXT NOT NULL,
                completed_at INTEGER NOT NULL,
                UNIQUE (habit_id, date)
            );

            CREATE INDEX IF NOT EXISTS idx_completions_date ON completions(date);

            PRAGMA user_version = 1;",
        )?;
    }
    Ok(())
}

fn conversion_error(idx: usize, ty: Type, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, message.into())
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Local>> {
    let millis: i64 = row.get(idx)?;
    millis_to_local(millis)
        .ok_or_else(|| conversion_error(idx, Type::Integer, format!("timestamp {millis} out of range")))
}

fn millis_to_local(millis: i64) -> Option<DateTime<Local>> {
    DateTime::from_timestamp_millis(millis).map(|utc| utc.with_timezone(&Local))
}

fn habit_from_row(row: &Row<'_>) -> rusqlite::Result<Habit> {
    let days: String = row.get(2)?;
    let schedule = Schedule::parse_csv(&days)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(err)))?;
    let deleted_at = match row.get::<_, Option<i64>>(4)? {
        Some(_) => Some(timestamp_at(row, 4)?),
        None => None,
    };
    Ok(Habit {
        id: row.get(0)?,
        name: row.get(1)?,
        schedule,
        created_at: timestamp_at(row, 3)?,
        deleted_at,
    })
}

fn completion_from_row(row: &Row<'_>) -> rusqlite::Result<Completion> {
    let raw_date: String = row.get(2)?;
    let date = parse_local_date(&raw_date)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(err)))?;
    Ok(Completion {
        id: row.get(0)?,
        habit_id: row.get(1)?,
        date,
        completed_at: timestamp_at(row, 3)?,
    })
}

fn fetch_habit(conn: &Connection, id: i64) -> Result<Habit> {
    conn.query_row(
        &format!("SELECT {HABIT_COLUMNS} FROM habits WHERE id = ?1"),
        params![id],
        habit_from_row,
    )
    .optional()?
    .ok_or(HabitError::NotFound(id))
}

fn query_completions(
    conn: &Connection,
    filter: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<Completion>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COMPLETION_COLUMNS} FROM completions {filter} ORDER BY date, id"
    ))?;
    let rows = stmt.query_map(args, completion_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

impl HabitStore for SqliteStore {
    fn list_habits(&self, include_deleted: bool) -> Result<Vec<Habit>> {
        let conn = self.conn.lock();
        let filter = if include_deleted {
            ""
        } else {
            "WHERE deleted_at IS NULL"
        };
        let mut stmt = conn.prepare(&format!(
            "SELECT {HABIT_COLUMNS} FROM habits {filter} ORDER BY id"
        ))?;
        let rows = stmt.query_map([], habit_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn habit(&self, id: i64) -> Result<Habit> {
        fetch_habit(&self.conn.lock(), id)
    }

    fn insert_habit(&self, name: &str, schedule: &Schedule, at: DateTime<Local>) -> Result<Habit> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO habits (name, days, created_at) VALUES (?1, ?2, ?3)",
            params![name, schedule.to_csv(), at.timestamp_millis()],
        )?;
        fetch_habit(&conn, conn.last_insert_rowid())
    }

    fn update_habit(&self, id: i64, name: &str, schedule: &Schedule) -> Result<Habit> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE habits SET name = ?2, days = ?3 WHERE id = ?1 AND deleted_at IS NULL",
            params![id, name, schedule.to_csv()],
        )?;
        if changed == 0 {
            return Err(HabitError::NotFound(id));
        }
        fetch_habit(&conn, id)
    }

    fn soft_delete_habit(&self, id: i64, at: DateTime<Local>) -> Result<()> {
        let changed = self.conn.lock().execute(
            "UPDATE habits SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
            params![id, at.timestamp_millis()],
        )?;
        if changed == 0 {
            return Err(HabitError::NotFound(id));
        }
        Ok(())
    }

    fn list_completions(&self, date: NaiveDate) -> Result<Vec<Completion>> {
        query_completions(
            &self.conn.lock(),
            "WHERE date = ?1",
            params![format_date(date)],
        )
    }

    fn list_completions_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Completion>> {
        query_completions(
            &self.conn.lock(),
            "WHERE date >= ?1 AND date <= ?2",
            params![format_date(start), format_date(end)],
        )
    }

    fn list_all_completions(&self) -> Result<Vec<Completion>> {
        query_completions(&self.conn.lock(), "", params![])
    }

    fn upsert_or_delete_completion(
        &self,
        habit_id: i64,
        date: NaiveDate,
        at: DateTime<Local>,
    ) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let exists = tx
            .query_row("SELECT 1 FROM habits WHERE id = ?1", params![habit_id], |_| Ok(()))
            .optional()?
            .is_some();
        if !exists {
            return Err(HabitError::NotFound(habit_id));
        }

        let date = format_date(date);
        let removed = tx.execute(
            "DELETE FROM completions WHERE habit_id = ?1 AND date = ?2",
            params![habit_id, date],
        )?;
        if removed == 0 {
            tx.execute(
                "INSERT INTO completions (habit_id, date, completed_at) VALUES (?1, ?2, ?3)",
                params![habit_id, date, at.timestamp_millis()],
            )?;
        }
        tx.commit()?;
        Ok(removed == 0)
    }
}
