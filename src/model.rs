use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::de::{self, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Ordering weight used by the recommended schedule.
    pub fn weight(&self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

/// Wall-clock time of day, stored as `"HH:MM"`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReminderTime {
    pub hour: u8,
    pub minute: u8,
}

impl ReminderTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, String> {
        if hour > 23 || minute > 59 {
            return Err(format!("{hour:02}:{minute:02} is not a valid time of day"));
        }
        Ok(Self { hour, minute })
    }
}

impl Default for ReminderTime {
    fn default() -> Self {
        Self { hour: 9, minute: 0 }
    }
}

impl fmt::Display for ReminderTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for ReminderTime {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (hour, minute) = value
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("expected HH:MM, got {value:?}"))?;
        let hour = hour
            .parse::<u8>()
            .map_err(|_| format!("invalid hour in {value:?}"))?;
        let minute = minute
            .parse::<u8>()
            .map_err(|_| format!("invalid minute in {value:?}"))?;
        Self::new(hour, minute)
    }
}

impl TryFrom<String> for ReminderTime {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReminderTime> for String {
    fn from(value: ReminderTime) -> Self {
        value.to_string()
    }
}

/// A value that either parses as `T` or is kept aside as unreadable.
#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
    Valid(T),
    Invalid(IgnoredAny),
}

/// Reads `T`, falling back to `T::default()` for `null` and for anything that
/// does not parse as `T`.
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(match Lenient::<Option<T>>::deserialize(deserializer)? {
        Lenient::Valid(value) => value.unwrap_or_default(),
        Lenient::Invalid(_) => T::default(),
    })
}

/// Accepts a JSON array and keeps the items that parse. Anything that is not
/// an array (`null`, `{}`) reads as empty.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Lenient::<Vec<Lenient<T>>>::deserialize(deserializer)? {
        Lenient::Valid(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Lenient::Valid(value) => Some(value),
                Lenient::Invalid(_) => None,
            })
            .collect(),
        Lenient::Invalid(_) => Vec::new(),
    })
}

/// RFC 3339 timestamps or bare `YYYY-MM-DD` dates (read as midnight UTC).
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(value) = DateTime::parse_from_rfc3339(text) {
        return Some(value.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

fn timestamp_or_now<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_timestamp(deserializer)?.unwrap_or_else(Utc::now))
}

fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Lenient::<String>::deserialize(deserializer)? {
        Lenient::Valid(text) => parse_timestamp(&text),
        Lenient::Invalid(_) => None,
    })
}

/// `YYYY-MM-DD`, or the UTC date of an RFC 3339 timestamp.
fn calendar_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(&text).map(|value| value.date_naive()))
        .ok_or_else(|| de::Error::custom(format!("invalid date {text:?}")))
}

/// Maps an English or Russian day name (full or abbreviated, any case).
pub fn parse_weekday_name(name: &str) -> Option<Weekday> {
    let name = name.trim();
    if let Ok(day) = name.parse::<Weekday>() {
        return Some(day);
    }
    let day = match name.to_lowercase().as_str() {
        "понедельник" | "пн" => Weekday::Mon,
        "вторник" | "вт" => Weekday::Tue,
        "среда" | "ср" => Weekday::Wed,
        "четверг" | "чт" => Weekday::Thu,
        "пятница" | "пт" => Weekday::Fri,
        "суббота" | "сб" => Weekday::Sat,
        "воскресенье" | "вс" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

pub fn weekday_name(day: Weekday) -> &'static str {
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

/// Day names that are not recognised are skipped, duplicates collapse.
fn weekday_names<'de, D>(deserializer: D) -> Result<Vec<Weekday>, D::Error>
where
    D: Deserializer<'de>,
{
    let names: Vec<String> = lenient_list(deserializer)?;
    let mut days = Vec::new();
    for name in &names {
        match parse_weekday_name(name) {
            Some(day) if !days.contains(&day) => days.push(day),
            Some(_) => {}
            None => warn!(day = %name, "unknown weekday name skipped"),
        }
    }
    Ok(days)
}

fn serialize_weekday_names<S>(days: &[Weekday], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(days.iter().map(|day| weekday_name(*day)))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "or_default")]
    pub category: String,
    #[serde(
        default,
        deserialize_with = "weekday_names",
        serialize_with = "serialize_weekday_names"
    )]
    pub frequency: Vec<Weekday>,
    #[serde(
        default,
        deserialize_with = "or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub goal: Option<u32>,
    #[serde(default, deserialize_with = "or_default")]
    pub streak: u32,
    /// Free-text reminder labels from older records read as no reminder.
    #[serde(
        default,
        deserialize_with = "or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub reminder_time: Option<ReminderTime>,
    #[serde(default, deserialize_with = "or_default")]
    pub color: String,
    #[serde(default, deserialize_with = "or_default")]
    pub emoji: String,
    #[serde(
        default,
        deserialize_with = "or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub time: Option<String>,
    #[serde(default = "Utc::now", deserialize_with = "timestamp_or_now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now", deserialize_with = "timestamp_or_now")]
    pub updated_at: DateTime<Utc>,
    /// Keyed by `YYYY-MM-DD`.
    #[serde(default, deserialize_with = "or_default")]
    pub completions_by_date: BTreeMap<String, bool>,
}

#[derive(Clone, Debug, Default)]
pub struct HabitInput {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub frequency: Vec<Weekday>,
    pub goal: Option<u32>,
    pub reminder_time: Option<ReminderTime>,
    pub color: String,
    pub emoji: String,
    pub time: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "or_default")]
    pub completed: bool,
    #[serde(default, deserialize_with = "or_default")]
    pub priority: Priority,
    #[serde(
        default,
        deserialize_with = "optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now", deserialize_with = "timestamp_or_now")]
    pub created_at: DateTime<Utc>,
    /// Minutes.
    #[serde(
        default,
        deserialize_with = "or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub estimated_time: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct TaskInput {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub deadline: Option<DateTime<Utc>>,
    pub estimated_time: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub deadline: Option<DateTime<Utc>>,
    pub estimated_time: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "or_default")]
    pub target: u32,
    #[serde(default, deserialize_with = "or_default")]
    pub current: u32,
    #[serde(default, deserialize_with = "or_default")]
    pub progress: u32,
    #[serde(default = "Utc::now", deserialize_with = "timestamp_or_now")]
    pub target_date: DateTime<Utc>,
    #[serde(default, deserialize_with = "or_default")]
    pub completed: bool,
    #[serde(default = "Utc::now", deserialize_with = "timestamp_or_now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub tasks: Vec<Task>,
}

#[derive(Clone, Debug)]
pub struct GoalInput {
    pub title: String,
    pub description: Option<String>,
    pub target: u32,
    pub target_date: DateTime<Utc>,
}

#[derive(Clone, Debug, Default)]
pub struct GoalChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub target: Option<u32>,
    pub target_date: Option<DateTime<Utc>>,
}

/// A user record as kept in the users collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUser {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub password_hash: String,
}

/// A user without credentials; this is what the session exposes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl From<&StoredUser> for PublicUser {
    fn from(user: &StoredUser) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            created_at: user.created_at,
            bio: user.bio.clone(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub bio: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(deserialize_with = "or_default")]
    pub theme: Theme,
    #[serde(deserialize_with = "language_or_default")]
    pub language: String,
    #[serde(deserialize_with = "or_true")]
    pub notifications_enabled: bool,
    #[serde(deserialize_with = "or_true")]
    pub vibration_enabled: bool,
    #[serde(deserialize_with = "or_true")]
    pub sound_enabled: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            language: "ru".to_string(),
            notifications_enabled: true,
            vibration_enabled: true,
            sound_enabled: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationSettings {
    #[serde(deserialize_with = "or_true")]
    pub enabled: bool,
    #[serde(deserialize_with = "or_true")]
    pub daily_reminders: bool,
    #[serde(deserialize_with = "or_true")]
    pub weekly_reports: bool,
    #[serde(deserialize_with = "or_default")]
    pub reminder_time: ReminderTime,
}

/// Switches default to on, so unreadable values do too.
fn or_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Lenient::<bool>::deserialize(deserializer)? {
        Lenient::Valid(value) => value,
        Lenient::Invalid(_) => true,
    })
}

fn language_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Lenient::<String>::deserialize(deserializer)? {
        Lenient::Valid(language) if !language.trim().is_empty() => language,
        _ => AppSettings::default().language,
    })
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_reminders: true,
            weekly_reports: true,
            reminder_time: ReminderTime::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntry {
    #[serde(deserialize_with = "calendar_date")]
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "or_default")]
    pub habits_completed: u32,
    #[serde(default, deserialize_with = "or_default")]
    pub tasks_completed: u32,
    #[serde(
        default,
        deserialize_with = "or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub mood: Option<u8>,
}

/// Combined state of every store, persisted under `rootData`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(deserialize_with = "lenient_list")]
    pub habits: Vec<Habit>,
    #[serde(deserialize_with = "lenient_list")]
    pub tasks: Vec<Task>,
    #[serde(deserialize_with = "lenient_list")]
    pub goals: Vec<Goal>,
    #[serde(deserialize_with = "or_default")]
    pub notification_settings: NotificationSettings,
    #[serde(deserialize_with = "lenient_list")]
    pub progress_data: Vec<ProgressEntry>,
    #[serde(deserialize_with = "or_default")]
    pub settings: AppSettings,
}

impl Snapshot {
    /// Entries present in `raw` that did not survive parsing into `self`.
    pub fn dropped_entries(&self, raw: &serde_json::Value) -> usize {
        let stored = |key: &str| {
            raw.get(key)
                .and_then(|value| value.as_array())
                .map_or(0, Vec::len)
        };
        let goal_tasks: usize = raw
            .get("goals")
            .and_then(|value| value.as_array())
            .map_or(0, |goals| {
                goals
                    .iter()
                    .filter_map(|goal| goal.get("tasks").and_then(|tasks| tasks.as_array()))
                    .map(Vec::len)
                    .sum()
            });
        let kept_goal_tasks: usize = self.goals.iter().map(|goal| goal.tasks.len()).sum();
        [
            stored("habits").saturating_sub(self.habits.len()),
            stored("tasks").saturating_sub(self.tasks.len()),
            stored("goals").saturating_sub(self.goals.len()),
            stored("progressData").saturating_sub(self.progress_data.len()),
            goal_tasks.saturating_sub(kept_goal_tasks),
        ]
        .iter()
        .sum()
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HabitStats {
    pub total: usize,
    pub completed_today: usize,
    pub total_completions: usize,
    pub completion_rate: u32,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ProductivityStats {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub total_goals: usize,
    pub completed_goals: usize,
    pub task_completion_rate: u32,
    pub goal_completion_rate: u32,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GlobalStats {
    pub habits_total: usize,
    pub habits_completed_today: usize,
    pub tasks_total: usize,
    pub tasks_completed: usize,
    pub goals_total: usize,
    pub goals_completed: usize,
    pub task_completion_rate: u32,
    pub goal_completion_rate: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledTask {
    pub id: String,
    pub title: String,
    pub priority: Priority,
    pub estimated_time: u32,
}
