use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::changes::{ChangeFeed, Revision};
use crate::ids::IdGenerator;
use crate::model::{GlobalStats, Snapshot};
use crate::notify::NotificationScheduler;
use crate::storage::{
    PendingWrite, Storage, HABITS_KEY, PROGRESS_DATA_KEY, ROOT_DATA_BACKUP_KEY, ROOT_DATA_KEY,
    SETTINGS_KEY,
};
use crate::stores::auth::AuthStore;
use crate::stores::habit::HabitStore;
use crate::stores::notification::NotificationStore;
use crate::stores::progress::ProgressStore;
use crate::stores::settings::SettingsStore;
use crate::stores::task::TaskStore;

/// Owns every domain store and the combined `rootData` snapshot.
///
/// After [`RootStore::hydrate`], each store mutation rewrites `rootData`
/// through the shared [`ChangeFeed`].
pub struct RootStore {
    pub habits: HabitStore,
    pub tasks: TaskStore,
    pub notifications: NotificationStore,
    pub progress: ProgressStore,
    pub settings: SettingsStore,
    pub auth: AuthStore,
    storage: Storage,
    feed: ChangeFeed,
}

impl RootStore {
    pub fn new(storage: Storage, scheduler: Arc<dyn NotificationScheduler>) -> Self {
        let feed = ChangeFeed::new();
        let ids = IdGenerator::new();
        Self {
            habits: HabitStore::new(
                storage.clone(),
                scheduler.clone(),
                feed.clone(),
                ids.clone(),
            ),
            tasks: TaskStore::new(feed.clone(), ids.clone()),
            notifications: NotificationStore::new(scheduler, feed.clone()),
            progress: ProgressStore::new(storage.clone(), feed.clone()),
            settings: SettingsStore::new(storage.clone(), feed.clone()),
            auth: AuthStore::new(storage.clone(), ids),
            storage,
            feed,
        }
    }

    /// Loads `rootData`, or the per-store keys when it is absent, then the
    /// auth session. Autosave of `rootData` starts here.
    pub async fn hydrate(&mut self) {
        if !self.load_all().await {
            let habits = self.habits.load().await;
            let settings = self.settings.load().await;
            let progress = self.progress.load().await;
            debug!(habits, settings, progress, "hydrated from per-store keys");
        }
        self.auth.load_auth_data().await;
        self.feed.autosave_to(self.storage.clone(), self.snapshot());
    }

    /// Distributes the stored snapshot into the stores. Returns `false` when
    /// `rootData` is missing or unreadable.
    ///
    /// Entries that cannot be read are skipped. Whenever that happens, or the
    /// whole document is unreadable, the stored text is first copied to
    /// `rootData.backup` so later saves cannot lose it.
    pub async fn load_all(&mut self) -> bool {
        let Some(text) = self.storage.load_string(ROOT_DATA_KEY).await else {
            return false;
        };
        if text.is_empty() {
            return false;
        }
        let parsed = serde_json::from_str::<serde_json::Value>(&text)
            .and_then(|raw| Snapshot::deserialize(&raw).map(|snapshot| (snapshot, raw)));
        match parsed {
            Ok((snapshot, raw)) => {
                let dropped = snapshot.dropped_entries(&raw);
                if dropped > 0 {
                    warn!(dropped, "skipped unreadable entries in rootData");
                    self.back_up_root_data(text).await;
                }
                self.apply(snapshot);
                true
            }
            Err(err) => {
                warn!(error = %err, "rootData does not parse");
                self.back_up_root_data(text).await;
                false
            }
        }
    }

    async fn back_up_root_data(&self, text: String) {
        if self
            .storage
            .save_string(ROOT_DATA_BACKUP_KEY, text)
            .wait()
            .await
        {
            info!(key = ROOT_DATA_BACKUP_KEY, "stored rootData backup");
        } else {
            error!(key = ROOT_DATA_BACKUP_KEY, "failed to back up rootData");
        }
    }

    /// Replaces every store's state without persisting.
    pub fn apply(&mut self, snapshot: Snapshot) {
        let Snapshot {
            habits,
            tasks,
            goals,
            notification_settings,
            progress_data,
            settings,
        } = snapshot;
        self.habits.replace(habits);
        self.tasks.replace(tasks, goals);
        self.notifications.replace(notification_settings);
        self.progress.replace(progress_data);
        self.settings.replace(settings);
        self.feed.resync(self.snapshot());
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            habits: self.habits.habits().to_vec(),
            tasks: self.tasks.tasks().to_vec(),
            goals: self.tasks.goals().to_vec(),
            notification_settings: self.notifications.prefs().clone(),
            progress_data: self.progress.entries().to_vec(),
            settings: self.settings.settings().clone(),
        }
    }

    pub fn save_all(&mut self) -> PendingWrite {
        let snapshot = self.snapshot();
        self.feed.resync(snapshot.clone());
        self.storage.save(ROOT_DATA_KEY, &snapshot)
    }

    /// Outcome of every `rootData` rewrite triggered by mutations since the
    /// last call.
    pub fn settle(&self) -> PendingWrite {
        self.feed.take_pending()
    }

    /// Replaces all state with `snapshot` and writes it everywhere it is kept.
    pub fn import(&mut self, snapshot: Snapshot) -> PendingWrite {
        self.apply(snapshot);
        info!(
            habits = self.habits.habits().len(),
            goals = self.tasks.goals().len(),
            "snapshot imported"
        );
        self.storage
            .save(HABITS_KEY, self.habits.habits())
            .and(self.storage.save(SETTINGS_KEY, self.settings.settings()))
            .and(self.storage.save(PROGRESS_DATA_KEY, self.progress.entries()))
            .and(self.save_all())
    }

    pub fn subscribe(&self) -> watch::Receiver<Revision> {
        self.feed.subscribe()
    }

    pub fn global_stats(&self) -> GlobalStats {
        self.global_stats_on(Local::now().date_naive())
    }

    pub fn global_stats_on(&self, today: NaiveDate) -> GlobalStats {
        let habits = self.habits.stats_on(today);
        let tasks = self.tasks.productivity_stats();
        GlobalStats {
            habits_total: habits.total,
            habits_completed_today: habits.completed_today,
            tasks_total: tasks.total_tasks,
            tasks_completed: tasks.completed_tasks,
            goals_total: tasks.total_goals,
            goals_completed: tasks.completed_goals,
            task_completion_rate: tasks.task_completion_rate,
            goal_completion_rate: tasks.goal_completion_rate,
        }
    }
}
