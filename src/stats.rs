use crate::models::{Habit, HabitHistory, HistoryDay, WeeklyCompletion};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeSet;

pub const WEEK_COUNT: usize = 8;

/// First day covered by [`build_history_at`] for the given `today`.
pub fn history_start(today: NaiveDate) -> NaiveDate {
    week_start(today) - Duration::weeks(WEEK_COUNT as i64 - 1)
}

pub fn build_history_at(
    today: NaiveDate,
    habit: &Habit,
    completions: &BTreeSet<NaiveDate>,
) -> HabitHistory {
    let mut last_7_days = Vec::with_capacity(7);
    for offset in (0..7).rev() {
        let date = today - Duration::days(offset);
        last_7_days.push(HistoryDay {
            date: date.to_string(),
            scheduled: habit.days.contains(date.weekday()),
            completed: completions.contains(&date),
        });
    }

    let current_week_start = week_start(today);
    let mut weekly = Vec::with_capacity(WEEK_COUNT);

    for offset in (0..WEEK_COUNT).rev() {
        let start = current_week_start - Duration::weeks(offset as i64);
        let end = start + Duration::days(6);

        let completed_days = completions.range(start..=end).count() as u8;
        let days_elapsed = if today < start {
            0
        } else if today > end {
            7
        } else {
            (today - start).num_days() as u8 + 1
        };

        weekly.push(WeeklyCompletion {
            week: week_label(start),
            start_date: start.to_string(),
            end_date: end.to_string(),
            completed_days,
            days_elapsed,
        });
    }

    HabitHistory {
        habit_id: habit.id,
        last_7_days,
        weekly,
    }
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

fn week_label(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HabitId, Owner, StreakCounts, Weekdays};
    use chrono::{Utc, Weekday};

    fn habit(days: Weekdays) -> Habit {
        Habit {
            id: HabitId(1),
            title: "meditate".to_string(),
            description: None,
            days,
            streak: StreakCounts::default(),
            owner: Owner::Shared,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn last_7_days_marks_completions_and_schedule() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let two_days_ago = today - Duration::days(2);
        let mut days = Weekdays::empty();
        days.insert(two_days_ago.weekday());
        let completions = BTreeSet::from([two_days_ago]);

        let history = build_history_at(today, &habit(days), &completions);
        assert_eq!(history.last_7_days.len(), 7);
        assert_eq!(history.last_7_days[6].date, today.to_string());
        let point = history
            .last_7_days
            .iter()
            .find(|day| day.date == two_days_ago.to_string())
            .expect("missing day");
        assert!(point.completed);
        assert!(point.scheduled);
        assert_eq!(history.last_7_days.iter().filter(|day| day.completed).count(), 1);
    }

    #[test]
    fn weekly_buckets_count_completed_and_elapsed_days() {
        // 2026-01-07 is a Wednesday.
        let today = NaiveDate::from_ymd_opt(2026, 1, 7).unwrap();
        assert_eq!(today.weekday(), Weekday::Wed);
        let completions = BTreeSet::from([
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 6).unwrap(),
        ]);

        let history = build_history_at(today, &habit(Weekdays::empty()), &completions);
        assert_eq!(history.weekly.len(), WEEK_COUNT);

        let current = &history.weekly[WEEK_COUNT - 1];
        assert_eq!(current.start_date, "2026-01-05");
        assert_eq!(current.completed_days, 2);
        assert_eq!(current.days_elapsed, 3);

        let previous = &history.weekly[WEEK_COUNT - 2];
        assert_eq!(previous.week, "2026-W01");
        assert_eq!(previous.completed_days, 1);
        assert_eq!(previous.days_elapsed, 7);

        assert_eq!(history_start(today).to_string(), history.weekly[0].start_date);
    }
}
