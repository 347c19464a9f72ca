//! Streak engine: the only place habit streak counters change.
//!
//! Every mutation runs in a `BEGIN IMMEDIATE` transaction, which takes the
//! database write lock before the first read. The ledger check, the ledger
//! write and the streak update for one request therefore commit together,
//! and a second request for the same habit only sees the committed result.

use crate::db::{self, Database, RecordOutcome};
use crate::errors::{HabitError, HabitResult};
use crate::models::{
    Habit, HabitHistory, HabitId, HabitView, NewHabit, Owner, StreakCounts, ToggleOutcome, UserId,
};
use crate::stats::{build_history_at, history_start};
use chrono::NaiveDate;
use rusqlite::{Connection, TransactionBehavior};
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::{debug, info, warn};

const MAX_TITLE_CHARS: usize = 100;

/// When `longest_streak` is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LongestStreakPolicy {
    /// Only a completion that extends yesterday's run may raise it, so a
    /// fresh single-day run never becomes the longest streak.
    #[default]
    ExtensionOnly,
    /// Every completion raises it to at least the current streak.
    Monotonic,
}

impl FromStr for LongestStreakPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "extension-only" => Ok(Self::ExtensionOnly),
            "monotonic" => Ok(Self::Monotonic),
            other => Err(format!(
                "unknown longest streak policy '{other}' (expected 'extension-only' or 'monotonic')"
            )),
        }
    }
}

/// Streak after completing `today`, given the latest earlier completion.
pub fn extend_streak(
    streak: StreakCounts,
    last_completed: Option<NaiveDate>,
    today: NaiveDate,
    policy: LongestStreakPolicy,
) -> StreakCounts {
    let contiguous = last_completed.is_some_and(|last| today.pred_opt() == Some(last));
    if contiguous {
        let current = streak.current_streak.saturating_add(1);
        return StreakCounts {
            current_streak: current,
            longest_streak: streak.longest_streak.max(current),
        };
    }

    let longest_streak = match policy {
        LongestStreakPolicy::ExtensionOnly => streak.longest_streak,
        LongestStreakPolicy::Monotonic => streak.longest_streak.max(1),
    };
    StreakCounts {
        current_streak: 1,
        longest_streak,
    }
}

/// Streak after undoing today's completion. The longest streak is a
/// watermark and stays put.
pub fn retract_streak(streak: StreakCounts) -> StreakCounts {
    StreakCounts {
        current_streak: streak.current_streak.saturating_sub(1),
        longest_streak: streak.longest_streak,
    }
}

/// Attaches today's completion state to each habit. Read-only.
pub fn with_completed_today(
    conn: &Connection,
    habits: Vec<Habit>,
    today: NaiveDate,
) -> HabitResult<Vec<HabitView>> {
    habits
        .into_iter()
        .map(|habit| -> HabitResult<HabitView> {
            let completed_today = db::is_completed_on(conn, habit.id, today)?;
            Ok(HabitView {
                habit,
                completed_today,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Toggle,
    Complete,
    Undo,
}

/// Which branch a mutation took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreakPath {
    Completion,
    Undo,
    Unchanged,
}

#[derive(Debug)]
pub struct StreakEngine {
    db: Database,
    policy: LongestStreakPolicy,
}

impl StreakEngine {
    pub fn new(db: Database, policy: LongestStreakPolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> LongestStreakPolicy {
        self.policy
    }

    pub fn create_habit(&self, habit: NewHabit, owner: Owner) -> HabitResult<Habit> {
        let habit = validate(habit)?;
        let conn = self.db.connect()?;
        let id = db::insert_habit(&conn, &habit, owner)?;
        let created = db::find_habit(&conn, id)?.ok_or(HabitError::NotFound(id))?;
        info!(habit_id = %id, "habit created");
        Ok(created)
    }

    /// Deletes a habit and, through the cascade, its whole ledger.
    pub fn delete_habit(&self, id: HabitId, requester: UserId) -> HabitResult<()> {
        let mut conn = self.db.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        authorize(db::find_habit(&tx, id)?, id, requester)?;
        db::delete_habit(&tx, id)?;
        tx.commit()?;
        info!(habit_id = %id, "habit deleted");
        Ok(())
    }

    pub fn list_habits_for_user(
        &self,
        requester: UserId,
        today: NaiveDate,
    ) -> HabitResult<Vec<HabitView>> {
        let mut conn = self.db.connect()?;
        let tx = conn.transaction()?;
        let habits = db::list_habits(&tx, requester)?;
        let views = with_completed_today(&tx, habits, today)?;
        tx.commit()?;
        Ok(views)
    }

    /// Flips today's completion and recomputes the streak counters.
    pub fn toggle_habit(
        &self,
        id: HabitId,
        requester: UserId,
        today: NaiveDate,
    ) -> HabitResult<ToggleOutcome> {
        self.apply(id, requester, today, Intent::Toggle)
    }

    /// Marks today done. A no-op when it already is.
    pub fn complete_habit(
        &self,
        id: HabitId,
        requester: UserId,
        today: NaiveDate,
    ) -> HabitResult<ToggleOutcome> {
        self.apply(id, requester, today, Intent::Complete)
    }

    /// Marks today not done. A no-op when it already is.
    pub fn undo_habit(
        &self,
        id: HabitId,
        requester: UserId,
        today: NaiveDate,
    ) -> HabitResult<ToggleOutcome> {
        self.apply(id, requester, today, Intent::Undo)
    }

    pub fn habit_history(
        &self,
        id: HabitId,
        requester: UserId,
        today: NaiveDate,
    ) -> HabitResult<HabitHistory> {
        let mut conn = self.db.connect()?;
        let tx = conn.transaction()?;
        let habit = authorize(db::find_habit(&tx, id)?, id, requester)?;
        let completions: BTreeSet<NaiveDate> =
            db::completions_between(&tx, id, history_start(today), today)?
                .into_iter()
                .collect();
        tx.commit()?;
        Ok(build_history_at(today, &habit, &completions))
    }

    fn apply(
        &self,
        id: HabitId,
        requester: UserId,
        today: NaiveDate,
        intent: Intent,
    ) -> HabitResult<ToggleOutcome> {
        let mut conn = self.db.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let habit = authorize(db::find_habit(&tx, id)?, id, requester)?;

        let done = db::is_completed_on(&tx, id, today)?;
        let (path, completed_today, streak) = match (intent, done) {
            (Intent::Toggle | Intent::Undo, true) => {
                (StreakPath::Undo, false, undo_today(&tx, &habit, today)?)
            }
            (Intent::Toggle | Intent::Complete, false) => (
                StreakPath::Completion,
                true,
                complete_today(&tx, &habit, today, self.policy)?,
            ),
            (Intent::Complete, true) | (Intent::Undo, false) => {
                (StreakPath::Unchanged, done, habit.streak)
            }
        };
        tx.commit()?;

        debug!(
            habit_id = %id,
            ?intent,
            ?path,
            completed_today,
            current_streak = streak.current_streak,
            longest_streak = streak.longest_streak,
            "habit streak updated"
        );
        Ok(ToggleOutcome {
            habit_id: id,
            completed_today,
            streak,
        })
    }
}

fn authorize(habit: Option<Habit>, id: HabitId, requester: UserId) -> HabitResult<Habit> {
    let habit = habit.ok_or(HabitError::NotFound(id))?;
    if !habit.owner.permits(requester) {
        return Err(HabitError::Forbidden(id));
    }
    Ok(habit)
}

fn complete_today(
    conn: &Connection,
    habit: &Habit,
    today: NaiveDate,
    policy: LongestStreakPolicy,
) -> HabitResult<StreakCounts> {
    if db::record_completion(conn, habit.id, today)? == RecordOutcome::AlreadyRecorded {
        // Someone else completed today first; their update already counted it.
        warn!(habit_id = %habit.id, %today, "completion already recorded, streak left unchanged");
        return Ok(habit.streak);
    }

    let last_completed = db::most_recent_completion_before(conn, habit.id, today)?;
    let streak = extend_streak(habit.streak, last_completed, today, policy);
    db::update_streak(conn, habit.id, streak)?;
    Ok(streak)
}

fn undo_today(conn: &Connection, habit: &Habit, today: NaiveDate) -> HabitResult<StreakCounts> {
    db::remove_completion(conn, habit.id, today)?;
    let streak = retract_streak(habit.streak);
    db::update_streak(conn, habit.id, streak)?;
    Ok(streak)
}

fn validate(habit: NewHabit) -> HabitResult<NewHabit> {
    let title = habit.title.trim().to_string();
    if title.is_empty() {
        return Err(HabitError::Validation("title must not be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(HabitError::Validation(format!(
            "title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    let description = habit
        .description
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    Ok(NewHabit {
        title,
        description,
        days: habit.days,
    })
}
