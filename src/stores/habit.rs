use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use tracing::{debug, info};

use crate::changes::{Change, ChangeFeed};
use crate::error::AppError;
use crate::ids::IdGenerator;
use crate::model::{Habit, HabitInput, HabitStats};
use crate::notify::{HabitReminder, NotificationScheduler};
use crate::storage::{PendingWrite, Storage, HABITS_KEY};
use crate::stores::{ensure_non_empty, Mutation};
use crate::util::{date_key, percentage};

pub struct HabitStore {
    habits: Vec<Habit>,
    storage: Storage,
    scheduler: Arc<dyn NotificationScheduler>,
    feed: ChangeFeed,
    ids: IdGenerator,
}

impl HabitStore {
    pub fn new(
        storage: Storage,
        scheduler: Arc<dyn NotificationScheduler>,
        feed: ChangeFeed,
        ids: IdGenerator,
    ) -> Self {
        Self {
            habits: Vec::new(),
            storage,
            scheduler,
            feed,
            ids,
        }
    }

    pub fn habits(&self) -> &[Habit] {
        &self.habits
    }

    pub fn get(&self, id: &str) -> Option<&Habit> {
        self.habits.iter().find(|habit| habit.id == id)
    }

    /// Reads the `habits` key. Returns whether anything was stored there.
    pub async fn load(&mut self) -> bool {
        match self.storage.load::<Vec<Habit>>(HABITS_KEY).await {
            Some(habits) => {
                debug!(count = habits.len(), "loaded habits");
                self.replace(habits);
                true
            }
            None => {
                self.habits.clear();
                false
            }
        }
    }

    /// Swaps the in-memory list without persisting.
    pub fn replace(&mut self, habits: Vec<Habit>) {
        for habit in &habits {
            self.ids.observe_str(&habit.id);
        }
        self.habits = habits;
    }

    pub fn create(&mut self, input: HabitInput) -> Result<Mutation<Habit>, AppError> {
        ensure_non_empty("habit name", &input.name)?;
        let now = Utc::now();
        let habit = Habit {
            id: self.ids.next_string(),
            name: input.name,
            description: input.description,
            category: input.category,
            frequency: input.frequency,
            goal: input.goal,
            streak: 0,
            reminder_time: input.reminder_time,
            color: input.color,
            emoji: input.emoji,
            time: input.time,
            created_at: now,
            updated_at: now,
            completions_by_date: Default::default(),
        };
        self.habits.push(habit.clone());

        if habit.reminder_time.is_some() {
            let scheduled = self
                .scheduler
                .schedule_habit(&HabitReminder::for_habit(&habit));
            debug!(habit_id = %habit.id, count = scheduled.len(), "scheduled habit reminders");
        }

        info!(habit_id = %habit.id, name = %habit.name, "habit created");
        Ok(Mutation::new(habit, self.persist()))
    }

    /// Flips the completion flag for `date`. The streak follows the flip:
    /// +1 when set, -1 (not below zero) when cleared.
    pub fn toggle_completion(&mut self, id: &str, date: NaiveDate) -> Option<Mutation<Habit>> {
        let key = date_key(date);
        let habit = self.habits.iter_mut().find(|habit| habit.id == id)?;
        let done = !habit.completions_by_date.get(&key).copied().unwrap_or(false);
        habit.completions_by_date.insert(key, done);
        habit.streak = if done {
            habit.streak + 1
        } else {
            habit.streak.saturating_sub(1)
        };
        habit.updated_at = Utc::now();
        let habit = habit.clone();
        Some(Mutation::new(habit, self.persist()))
    }

    /// Marks `date` as done. Completing an already completed date leaves the
    /// streak alone.
    pub fn complete(&mut self, id: &str, date: NaiveDate) -> Option<Mutation<Habit>> {
        let key = date_key(date);
        let habit = self.habits.iter_mut().find(|habit| habit.id == id)?;
        let previous = habit.completions_by_date.insert(key, true);
        if previous != Some(true) {
            habit.streak += 1;
        }
        habit.updated_at = Utc::now();
        let habit = habit.clone();
        Some(Mutation::new(habit, self.persist()))
    }

    pub fn delete(&mut self, id: &str) -> Option<Mutation<Habit>> {
        let index = self.habits.iter().position(|habit| habit.id == id)?;
        let habit = self.habits.remove(index);
        self.scheduler.cancel_habit(&habit.id);
        info!(habit_id = %habit.id, "habit deleted");
        Some(Mutation::new(habit, self.persist()))
    }

    pub fn clear(&mut self) -> PendingWrite {
        for habit in self.habits.drain(..) {
            self.scheduler.cancel_habit(&habit.id);
        }
        self.persist()
    }

    pub fn stats(&self) -> HabitStats {
        self.stats_on(Local::now().date_naive())
    }

    pub fn stats_on(&self, today: NaiveDate) -> HabitStats {
        let key = date_key(today);
        let total = self.habits.len();
        let completed_today = self
            .habits
            .iter()
            .filter(|habit| habit.completions_by_date.get(&key).copied().unwrap_or(false))
            .count();
        let total_completions = self
            .habits
            .iter()
            .map(|habit| habit.completions_by_date.values().filter(|done| **done).count())
            .sum();
        HabitStats {
            total,
            completed_today,
            total_completions,
            completion_rate: percentage(completed_today, total),
        }
    }

    fn persist(&self) -> PendingWrite {
        self.feed.publish(Change::Habits(self.habits.clone()));
        self.storage.save(HABITS_KEY, &self.habits)
    }
}
