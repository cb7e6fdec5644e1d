use tracing::debug;

use crate::changes::{Change, ChangeFeed};
use crate::error::AppError;
use crate::model::{AppSettings, Theme};
use crate::storage::{PendingWrite, Storage, SETTINGS_KEY};

/// App preferences. Every setter writes `settings` right away and publishes
/// a change so the root snapshot follows.
pub struct SettingsStore {
    settings: AppSettings,
    storage: Storage,
    feed: ChangeFeed,
}

impl SettingsStore {
    pub fn new(storage: Storage, feed: ChangeFeed) -> Self {
        Self {
            settings: AppSettings::default(),
            storage,
            feed,
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Reads `settings`; missing fields take their defaults. Returns whether
    /// anything was stored.
    pub async fn load(&mut self) -> bool {
        match self.storage.load::<AppSettings>(SETTINGS_KEY).await {
            Some(settings) => {
                debug!(?settings, "loaded settings");
                self.settings = settings;
                true
            }
            None => false,
        }
    }

    pub fn replace(&mut self, settings: AppSettings) {
        self.settings = settings;
    }

    pub fn set_theme(&mut self, theme: Theme) -> PendingWrite {
        self.settings.theme = theme;
        self.persist()
    }

    pub fn set_language(&mut self, language: &str) -> Result<PendingWrite, AppError> {
        let language = language.trim();
        if language.is_empty() {
            return Err(AppError::InvalidInput("language cannot be empty".to_string()));
        }
        self.settings.language = language.to_string();
        Ok(self.persist())
    }

    pub fn set_notifications_enabled(&mut self, enabled: bool) -> PendingWrite {
        self.settings.notifications_enabled = enabled;
        self.persist()
    }

    pub fn set_vibration_enabled(&mut self, enabled: bool) -> PendingWrite {
        self.settings.vibration_enabled = enabled;
        self.persist()
    }

    pub fn set_sound_enabled(&mut self, enabled: bool) -> PendingWrite {
        self.settings.sound_enabled = enabled;
        self.persist()
    }

    pub fn reset(&mut self) -> PendingWrite {
        self.settings = AppSettings::default();
        self.persist()
    }

    fn persist(&self) -> PendingWrite {
        self.feed.publish(Change::Settings(self.settings.clone()));
        self.storage.save(SETTINGS_KEY, &self.settings)
    }
}
