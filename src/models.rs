use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitId(pub i64);

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Who a habit belongs to.
///
/// `Shared` rows predate per-user ownership and are visible to (and
/// mutable by) every user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Shared,
    User(UserId),
}

impl Owner {
    pub fn from_column(user_id: Option<i64>) -> Self {
        match user_id {
            Some(id) => Owner::User(UserId(id)),
            None => Owner::Shared,
        }
    }

    pub fn to_column(self) -> Option<i64> {
        match self {
            Owner::Shared => None,
            Owner::User(id) => Some(id.0),
        }
    }

    pub fn permits(self, requester: UserId) -> bool {
        match self {
            Owner::Shared => true,
            Owner::User(owner) => owner == requester,
        }
    }
}

impl Serialize for Owner {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_column().serialize(serializer)
    }
}

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Days of the week a habit is scheduled on. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Weekdays(u8);

impl Weekdays {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn iter(self) -> impl Iterator<Item = Weekday> {
        WEEK.into_iter().filter(move |day| self.contains(*day))
    }

    /// Monday-first flags, matching the column order of the `habits` table.
    pub fn flags(self) -> [bool; 7] {
        WEEK.map(|day| self.contains(day))
    }

    pub fn from_flags(flags: [bool; 7]) -> Self {
        let mut days = Self::empty();
        for (day, set) in WEEK.into_iter().zip(flags) {
            if set {
                days.insert(day);
            }
        }
        days
    }

    pub fn parse_day(name: &str) -> Option<Weekday> {
        let name = name.trim().to_ascii_lowercase();
        WEEK.into_iter().find(|day| day_name(*day) == name)
    }
}

pub fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

impl Serialize for Weekdays {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(day_name))
    }
}

impl<'de> Deserialize<'de> for Weekdays {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        let mut days = Weekdays::empty();
        for name in &names {
            let day = Weekdays::parse_day(name)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown weekday '{name}'")))?;
            days.insert(day);
        }
        Ok(days)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreakCounts {
    pub current_streak: u32,
    pub longest_streak: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Habit {
    pub id: HabitId,
    pub title: String,
    pub description: Option<String>,
    pub days: Weekdays,
    #[serde(flatten)]
    pub streak: StreakCounts,
    pub owner: Owner,
    pub created_at: DateTime<Utc>,
}

/// A habit as shown on the dashboard, with today's completion derived
/// from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitView {
    #[serde(flatten)]
    pub habit: Habit,
    pub completed_today: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewHabit {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub days: Weekdays,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToggleOutcome {
    pub habit_id: HabitId,
    pub completed_today: bool,
    #[serde(flatten)]
    pub streak: StreakCounts,
}

#[derive(Debug, Serialize)]
pub struct HistoryDay {
    pub date: String,
    pub scheduled: bool,
    pub completed: bool,
}

#[derive(Debug, Serialize)]
pub struct WeeklyCompletion {
    pub week: String,
    pub start_date: String,
    pub end_date: String,
    pub completed_days: u8,
    pub days_elapsed: u8,
}

#[derive(Debug, Serialize)]
pub struct HabitHistory {
    pub habit_id: HabitId,
    pub last_7_days: Vec<HistoryDay>,
    pub weekly: Vec<WeeklyCompletion>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekdays_parse_names_case_insensitively() {
        let days: Weekdays = serde_json::from_str(r#"["Monday", " friday", "SUNDAY"]"#).unwrap();
        assert!(days.contains(Weekday::Mon));
        assert!(days.contains(Weekday::Fri));
        assert!(days.contains(Weekday::Sun));
        assert!(!days.contains(Weekday::Tue));
        assert_eq!(
            serde_json::to_value(days).unwrap(),
            serde_json::json!(["monday", "friday", "sunday"])
        );
    }

    #[test]
    fn weekdays_reject_unknown_names() {
        let err = serde_json::from_str::<Weekdays>(r#"["funday"]"#).unwrap_err();
        assert!(err.to_string().contains("funday"));
    }

    #[test]
    fn weekday_flags_follow_column_order() {
        let mut days = Weekdays::empty();
        days.insert(Weekday::Tue);
        days.insert(Weekday::Sat);
        let flags = days.flags();
        assert_eq!(flags, [false, true, false, false, false, true, false]);
        assert_eq!(Weekdays::from_flags(flags), days);
    }

    #[test]
    fn shared_owner_permits_everyone() {
        assert!(Owner::Shared.permits(UserId(7)));
        assert!(Owner::User(UserId(7)).permits(UserId(7)));
        assert!(!Owner::User(UserId(7)).permits(UserId(8)));
        assert_eq!(Owner::from_column(None), Owner::Shared);
        assert_eq!(Owner::from_column(Some(3)).to_column(), Some(3));
    }
}
