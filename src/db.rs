//! SQLite persistence for the habit store and the completion ledger.
//!
//! Statement helpers take a `&Connection` so the engine can run several of
//! them inside one transaction (a `Transaction` derefs to `Connection`).

use crate::errors::HabitResult;
use crate::models::{Habit, HabitId, NewHabit, Owner, StreakCounts, UserId, Weekdays};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const CURRENT_VERSION: i32 = 1;

const SCHEMA_VERSION_TABLE: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
";

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS habits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT,
    monday INTEGER NOT NULL DEFAULT 0,
    tuesday INTEGER NOT NULL DEFAULT 0,
    wednesday INTEGER NOT NULL DEFAULT 0,
    thursday INTEGER NOT NULL DEFAULT 0,
    friday INTEGER NOT NULL DEFAULT 0,
    saturday INTEGER NOT NULL DEFAULT 0,
    sunday INTEGER NOT NULL DEFAULT 0,
    current_streak INTEGER NOT NULL DEFAULT 0 CHECK (current_streak >= 0),
    longest_streak INTEGER NOT NULL DEFAULT 0 CHECK (longest_streak >= 0),
    user_id INTEGER,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_habits_user ON habits(user_id);

CREATE TABLE IF NOT EXISTS habit_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    habit_id INTEGER NOT NULL REFERENCES habits(id) ON DELETE CASCADE,
    completed_date TEXT NOT NULL,
    UNIQUE(habit_id, completed_date)
);
";

const HABIT_COLUMNS: &str = "id, title, description, monday, tuesday, wednesday, thursday, friday, \
     saturday, sunday, current_streak, longest_streak, user_id, created_at";

/// Handle to the habits database file. Every engine call opens its own
/// connection so unrelated requests do not queue behind a shared one.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Database {
    pub fn open(path: &Path, busy_timeout: Duration) -> HabitResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let db = Self {
            path: path.to_path_buf(),
            busy_timeout,
        };
        let conn = db.connect()?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        migrate(&conn)?;
        Ok(db)
    }

    pub fn connect(&self) -> HabitResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(conn)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn schema_version(conn: &Connection) -> HabitResult<i32> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn migrate(conn: &Connection) -> HabitResult<()> {
    conn.execute_batch(SCHEMA_VERSION_TABLE)?;
    let from_version = schema_version(conn)?;

    if from_version < 1 {
        conn.execute_batch(SCHEMA_V1)?;
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
            params![1, Utc::now()],
        )?;
        info!("habits database migrated to version {CURRENT_VERSION}");
    }

    Ok(())
}

fn habit_from_row(row: &Row<'_>) -> rusqlite::Result<Habit> {
    let flags = [
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ];
    let created_at: DateTime<Utc> = row.get(13)?;
    Ok(Habit {
        id: HabitId(row.get(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        days: Weekdays::from_flags(flags),
        streak: StreakCounts {
            current_streak: row.get(10)?,
            longest_streak: row.get(11)?,
        },
        owner: Owner::from_column(row.get(12)?),
        created_at,
    })
}

// Habit store

pub fn insert_habit(conn: &Connection, habit: &NewHabit, owner: Owner) -> HabitResult<HabitId> {
    let [mon, tue, wed, thu, fri, sat, sun] = habit.days.flags();
    conn.execute(
        "INSERT INTO habits (title, description, monday, tuesday, wednesday, thursday, friday,
                             saturday, sunday, user_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            habit.title,
            habit.description,
            mon,
            tue,
            wed,
            thu,
            fri,
            sat,
            sun,
            owner.to_column(),
            Utc::now(),
        ],
    )?;
    Ok(HabitId(conn.last_insert_rowid()))
}

pub fn find_habit(conn: &Connection, id: HabitId) -> HabitResult<Option<Habit>> {
    let habit = conn
        .query_row(
            &format!("SELECT {HABIT_COLUMNS} FROM habits WHERE id = ?1"),
            [id.0],
            habit_from_row,
        )
        .optional()?;
    Ok(habit)
}

/// Habits owned by `owner` plus every shared habit, oldest first.
pub fn list_habits(conn: &Connection, owner: UserId) -> HabitResult<Vec<Habit>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {HABIT_COLUMNS} FROM habits WHERE user_id = ?1 OR user_id IS NULL ORDER BY id"
    ))?;
    let habits = stmt
        .query_map([owner.0], habit_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(habits)
}

pub fn delete_habit(conn: &Connection, id: HabitId) -> HabitResult<bool> {
    let removed = conn.execute("DELETE FROM habits WHERE id = ?1", [id.0])?;
    Ok(removed > 0)
}

pub fn update_streak(conn: &Connection, id: HabitId, streak: StreakCounts) -> HabitResult<()> {
    conn.execute(
        "UPDATE habits SET current_streak = ?1, longest_streak = ?2 WHERE id = ?3",
        params![streak.current_streak, streak.longest_streak, id.0],
    )?;
    Ok(())
}

// Completion ledger

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    AlreadyRecorded,
}

pub fn is_completed_on(conn: &Connection, id: HabitId, date: NaiveDate) -> HabitResult<bool> {
    let found = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM habit_logs WHERE habit_id = ?1 AND completed_date = ?2)",
        params![id.0, date],
        |row| row.get(0),
    )?;
    Ok(found)
}

pub fn record_completion(
    conn: &Connection,
    id: HabitId,
    date: NaiveDate,
) -> HabitResult<RecordOutcome> {
    match conn.execute(
        "INSERT INTO habit_logs (habit_id, completed_date) VALUES (?1, ?2)",
        params![id.0, date],
    ) {
        Ok(_) => Ok(RecordOutcome::Recorded),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Ok(RecordOutcome::AlreadyRecorded)
        }
        Err(err) => Err(err.into()),
    }
}

pub fn remove_completion(conn: &Connection, id: HabitId, date: NaiveDate) -> HabitResult<bool> {
    let removed = conn.execute(
        "DELETE FROM habit_logs WHERE habit_id = ?1 AND completed_date = ?2",
        params![id.0, date],
    )?;
    Ok(removed > 0)
}

/// Latest completion strictly before `date`.
pub fn most_recent_completion_before(
    conn: &Connection,
    id: HabitId,
    date: NaiveDate,
) -> HabitResult<Option<NaiveDate>> {
    let last = conn.query_row(
        "SELECT MAX(completed_date) FROM habit_logs WHERE habit_id = ?1 AND completed_date < ?2",
        params![id.0, date],
        |row| row.get(0),
    )?;
    Ok(last)
}

/// Completion dates in `[start, end]`, ascending.
pub fn completions_between(
    conn: &Connection,
    id: HabitId,
    start: NaiveDate,
    end: NaiveDate,
) -> HabitResult<Vec<NaiveDate>> {
    let mut stmt = conn.prepare(
        "SELECT completed_date FROM habit_logs
         WHERE habit_id = ?1 AND completed_date BETWEEN ?2 AND ?3
         ORDER BY completed_date",
    )?;
    let dates = stmt
        .query_map(params![id.0, start, end], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(dates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("habits.sqlite3"), Duration::from_secs(5)).unwrap();
        (dir, db)
    }

    fn new_habit(title: &str) -> NewHabit {
        NewHabit {
            title: title.to_string(),
            description: None,
            days: Weekdays::empty(),
        }
    }

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    #[test]
    fn open_records_schema_version_once() {
        let (dir, db) = open_temp();
        let conn = db.connect().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);

        let reopened = Database::open(db.path(), Duration::from_secs(5)).unwrap();
        let conn = reopened.connect().unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
        drop(dir);
    }

    #[test]
    fn ledger_rejects_duplicate_day() {
        let (_dir, db) = open_temp();
        let conn = db.connect().unwrap();
        let id = insert_habit(&conn, &new_habit("read"), Owner::Shared).unwrap();

        assert_eq!(record_completion(&conn, id, day(1, 1)).unwrap(), RecordOutcome::Recorded);
        assert_eq!(
            record_completion(&conn, id, day(1, 1)).unwrap(),
            RecordOutcome::AlreadyRecorded
        );
        assert!(is_completed_on(&conn, id, day(1, 1)).unwrap());
        assert!(!is_completed_on(&conn, id, day(1, 2)).unwrap());
    }

    #[test]
    fn most_recent_completion_is_strictly_before() {
        let (_dir, db) = open_temp();
        let conn = db.connect().unwrap();
        let id = insert_habit(&conn, &new_habit("walk"), Owner::Shared).unwrap();

        assert_eq!(most_recent_completion_before(&conn, id, day(1, 5)).unwrap(), None);
        for d in [1, 3, 5] {
            record_completion(&conn, id, day(1, d)).unwrap();
        }
        assert_eq!(
            most_recent_completion_before(&conn, id, day(1, 5)).unwrap(),
            Some(day(1, 3))
        );
        assert_eq!(
            completions_between(&conn, id, day(1, 2), day(1, 5)).unwrap(),
            vec![day(1, 3), day(1, 5)]
        );
    }

    #[test]
    fn deleting_habit_cascades_to_ledger() {
        let (_dir, db) = open_temp();
        let conn = db.connect().unwrap();
        let id = insert_habit(&conn, &new_habit("stretch"), Owner::User(UserId(1))).unwrap();
        record_completion(&conn, id, day(2, 1)).unwrap();
        record_completion(&conn, id, day(2, 2)).unwrap();

        assert!(delete_habit(&conn, id).unwrap());
        let logs: i64 = conn
            .query_row("SELECT COUNT(*) FROM habit_logs", [], |row| row.get(0))
            .unwrap();
        assert_eq!(logs, 0);
        assert!(!delete_habit(&conn, id).unwrap());
    }

    #[test]
    fn listing_includes_shared_habits() {
        let (_dir, db) = open_temp();
        let conn = db.connect().unwrap();
        let mine = insert_habit(&conn, &new_habit("mine"), Owner::User(UserId(1))).unwrap();
        let shared = insert_habit(&conn, &new_habit("shared"), Owner::Shared).unwrap();
        insert_habit(&conn, &new_habit("theirs"), Owner::User(UserId(2))).unwrap();

        let ids: Vec<HabitId> = list_habits(&conn, UserId(1))
            .unwrap()
            .into_iter()
            .map(|habit| habit.id)
            .collect();
        assert_eq!(ids, vec![mine, shared]);
    }
}
