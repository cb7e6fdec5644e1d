use std::sync::Arc;

use tracing::debug;

use crate::changes::{Change, ChangeFeed};
use crate::model::{NotificationSettings, ReminderTime};
use crate::notify::NotificationScheduler;

/// Notification preferences and the global daily reminder they control.
///
/// Persisted only through the root snapshot.
pub struct NotificationStore {
    prefs: NotificationSettings,
    scheduler: Arc<dyn NotificationScheduler>,
    feed: ChangeFeed,
}

impl NotificationStore {
    pub fn new(scheduler: Arc<dyn NotificationScheduler>, feed: ChangeFeed) -> Self {
        Self {
            prefs: NotificationSettings::default(),
            scheduler,
            feed,
        }
    }

    pub fn prefs(&self) -> &NotificationSettings {
        &self.prefs
    }

    pub fn replace(&mut self, prefs: NotificationSettings) {
        self.prefs = prefs;
    }

    fn daily_wanted(&self) -> bool {
        self.prefs.enabled && self.prefs.daily_reminders
    }

    /// Schedules the daily reminder when the current preferences ask for it.
    pub fn init(&self) -> Option<String> {
        if !self.daily_wanted() {
            return None;
        }
        let id = self.scheduler.schedule_daily(self.prefs.reminder_time);
        debug!(%id, time = %self.prefs.reminder_time, "daily reminder scheduled");
        Some(id)
    }

    /// Turning notifications off cancels every scheduled reminder.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.prefs.enabled = enabled;
        if enabled {
            self.init();
        } else {
            let cancelled = self.scheduler.cancel_all();
            debug!(cancelled, "notifications disabled");
        }
        self.changed();
    }

    pub fn set_daily_reminders(&mut self, enabled: bool) {
        self.prefs.daily_reminders = enabled;
        if self.init().is_none() {
            self.scheduler.cancel_daily();
        }
        self.changed();
    }

    pub fn set_weekly_reports(&mut self, enabled: bool) {
        self.prefs.weekly_reports = enabled;
        self.changed();
    }

    pub fn set_reminder_time(&mut self, time: ReminderTime) {
        self.prefs.reminder_time = time;
        self.init();
        self.changed();
    }

    pub fn reset(&mut self) {
        self.prefs = NotificationSettings::default();
        self.init();
        self.changed();
    }

    fn changed(&self) {
        self.feed
            .publish(Change::Notifications(self.prefs.clone()));
    }
}
