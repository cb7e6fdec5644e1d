//! Reminder scheduling capability used by the habit and notification stores.
//!
//! Delivery is not handled here; [`ReminderBook`] only records what would be
//! delivered and keeps that list under `scheduledReminders`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::model::{Habit, ReminderTime};
use crate::storage::{Storage, SCHEDULED_REMINDERS_KEY};

/// What the habit store hands to the scheduler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HabitReminder {
    pub habit_id: String,
    pub title: String,
    pub reminder_time: Option<ReminderTime>,
    /// 0 = Sunday.
    pub days_of_week: Vec<u8>,
}

impl HabitReminder {
    pub fn for_habit(habit: &Habit) -> Self {
        Self {
            habit_id: habit.id.clone(),
            title: habit.name.clone(),
            reminder_time: habit.reminder_time,
            days_of_week: habit
                .frequency
                .iter()
                .map(|day: &Weekday| day.num_days_from_sunday() as u8)
                .collect(),
        }
    }
}

pub trait NotificationScheduler: Send + Sync {
    /// Returns the ids of the scheduled notifications (empty without a time).
    fn schedule_habit(&self, reminder: &HabitReminder) -> Vec<String>;
    fn cancel_habit(&self, habit_id: &str) -> usize;
    /// Replaces the global daily check-in reminder.
    fn schedule_daily(&self, time: ReminderTime) -> String;
    fn cancel_daily(&self) -> usize;
    fn cancel_all(&self) -> usize;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ReminderTrigger {
    Daily {
        hour: u8,
        minute: u8,
    },
    /// `weekday` runs 1..=7 starting on Sunday.
    Weekly {
        weekday: u8,
        hour: u8,
        minute: u8,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledReminder {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub habit_id: Option<String>,
    pub title: String,
    pub body: String,
    pub trigger: ReminderTrigger,
}

pub struct ReminderBook {
    reminders: Mutex<Vec<ScheduledReminder>>,
    storage: Storage,
}

impl ReminderBook {
    pub async fn load(storage: Storage) -> Self {
        let reminders: Vec<ScheduledReminder> = storage
            .load(SCHEDULED_REMINDERS_KEY)
            .await
            .unwrap_or_default();
        Self {
            reminders: Mutex::new(reminders),
            storage,
        }
    }

    pub fn scheduled(&self) -> Vec<ScheduledReminder> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ScheduledReminder>> {
        self.reminders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<R>(&self, apply: impl FnOnce(&mut Vec<ScheduledReminder>) -> R) -> R {
        let mut reminders = self.lock();
        let result = apply(&mut reminders);
        self.storage.save(SCHEDULED_REMINDERS_KEY, &*reminders);
        result
    }
}

fn new_notification_id() -> String {
    Uuid::new_v4().simple().to_string()
}

impl NotificationScheduler for ReminderBook {
    fn schedule_habit(&self, reminder: &HabitReminder) -> Vec<String> {
        let Some(time) = reminder.reminder_time else {
            return Vec::new();
        };
        let triggers: Vec<ReminderTrigger> = if reminder.days_of_week.is_empty() {
            vec![ReminderTrigger::Daily {
                hour: time.hour,
                minute: time.minute,
            }]
        } else {
            reminder
                .days_of_week
                .iter()
                .map(|day| ReminderTrigger::Weekly {
                    weekday: day + 1,
                    hour: time.hour,
                    minute: time.minute,
                })
                .collect()
        };

        self.update(|reminders| {
            triggers
                .into_iter()
                .map(|trigger| {
                    let id = new_notification_id();
                    reminders.push(ScheduledReminder {
                        id: id.clone(),
                        habit_id: Some(reminder.habit_id.clone()),
                        title: "Habit reminder".to_string(),
                        body: format!("Don't forget: {}", reminder.title),
                        trigger,
                    });
                    id
                })
                .collect()
        })
    }

    fn cancel_habit(&self, habit_id: &str) -> usize {
        let cancelled = self.update(|reminders| {
            let before = reminders.len();
            reminders.retain(|item| item.habit_id.as_deref() != Some(habit_id));
            before - reminders.len()
        });
        debug!(habit_id, cancelled, "cancelled habit reminders");
        cancelled
    }

    fn schedule_daily(&self, time: ReminderTime) -> String {
        self.update(|reminders| {
            reminders.retain(|item| item.habit_id.is_some());
            let id = new_notification_id();
            reminders.push(ScheduledReminder {
                id: id.clone(),
                habit_id: None,
                title: "Habit check-in".to_string(),
                body: "Remember to mark your habits today!".to_string(),
                trigger: ReminderTrigger::Daily {
                    hour: time.hour,
                    minute: time.minute,
                },
            });
            id
        })
    }

    fn cancel_daily(&self) -> usize {
        self.update(|reminders| {
            let before = reminders.len();
            reminders.retain(|item| item.habit_id.is_some());
            before - reminders.len()
        })
    }

    fn cancel_all(&self) -> usize {
        self.update(|reminders| {
            let count = reminders.len();
            reminders.clear();
            count
        })
    }
}
