use chrono::NaiveDate;

use crate::changes::{Change, ChangeFeed};
use crate::model::ProgressEntry;
use crate::storage::{PendingWrite, Storage, PROGRESS_DATA_KEY};

const WEEK: usize = 7;

/// Daily progress journal kept under `progressData`.
pub struct ProgressStore {
    entries: Vec<ProgressEntry>,
    storage: Storage,
    feed: ChangeFeed,
}

impl ProgressStore {
    pub fn new(storage: Storage, feed: ChangeFeed) -> Self {
        Self {
            entries: Vec::new(),
            storage,
            feed,
        }
    }

    pub fn entries(&self) -> &[ProgressEntry] {
        &self.entries
    }

    pub async fn load(&mut self) -> bool {
        match self.storage.load(PROGRESS_DATA_KEY).await {
            Some(entries) => {
                self.entries = entries;
                true
            }
            None => false,
        }
    }

    pub fn replace(&mut self, entries: Vec<ProgressEntry>) {
        self.entries = entries;
    }

    pub fn add(&mut self, entry: ProgressEntry) -> PendingWrite {
        self.entries.push(entry);
        self.persist()
    }

    /// First entry recorded for `date`.
    pub fn for_date(&self, date: NaiveDate) -> Option<&ProgressEntry> {
        self.entries.iter().find(|entry| entry.date == date)
    }

    /// The last seven entries in insertion order.
    pub fn weekly(&self) -> &[ProgressEntry] {
        let start = self.entries.len().saturating_sub(WEEK);
        &self.entries[start..]
    }

    pub fn clear(&mut self) -> PendingWrite {
        self.entries.clear();
        self.persist()
    }

    fn persist(&self) -> PendingWrite {
        self.feed.publish(Change::Progress(self.entries.clone()));
        self.storage.save(PROGRESS_DATA_KEY, &self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_storage;
    use chrono::Days;

    fn entry(date: NaiveDate, habits: u32) -> ProgressEntry {
        ProgressEntry {
            date,
            habits_completed: habits,
            tasks_completed: 0,
            mood: None,
        }
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).expect("date")
    }

    #[tokio::test]
    async fn add_persists_and_reloads() {
        let (_dir, storage) = setup_storage().await;
        let mut store = ProgressStore::new(storage.clone(), ChangeFeed::new());
        let mut first = entry(start(), 2);
        first.mood = Some(4);
        assert!(store.add(first.clone()).wait().await);

        let mut reloaded = ProgressStore::new(storage, ChangeFeed::new());
        assert!(reloaded.load().await);
        assert_eq!(reloaded.for_date(start()), Some(&first));
        assert!(reloaded.for_date(NaiveDate::MIN).is_none());
    }

    #[tokio::test]
    async fn weekly_returns_last_seven_entries() {
        let (_dir, storage) = setup_storage().await;
        let mut store = ProgressStore::new(storage, ChangeFeed::new());
        assert!(store.weekly().is_empty());
        for offset in 0..10u32 {
            let date = start()
                .checked_add_days(Days::new(u64::from(offset)))
                .expect("date");
            store.add(entry(date, offset));
        }
        let week = store.weekly();
        assert_eq!(week.len(), 7);
        assert_eq!(week[0].habits_completed, 3);
        assert_eq!(week[6].habits_completed, 9);
    }

    #[tokio::test]
    async fn clear_writes_empty_list() {
        let (_dir, storage) = setup_storage().await;
        let mut store = ProgressStore::new(storage.clone(), ChangeFeed::new());
        store.add(entry(start(), 1));
        assert!(store.clear().wait().await);
        let stored: Option<Vec<ProgressEntry>> = storage.load(PROGRESS_DATA_KEY).await;
        assert_eq!(stored, Some(Vec::new()));
    }
}
