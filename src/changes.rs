use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use crate::model::{AppSettings, Goal, Habit, NotificationSettings, ProgressEntry, Snapshot, Task};
use crate::storage::{PendingWrite, Storage, ROOT_DATA_KEY};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StoreKind {
    Habits,
    Tasks,
    Notifications,
    Progress,
    Settings,
}

/// The new state of one snapshot section, published after a store mutation.
#[derive(Clone, Debug)]
pub enum Change {
    Habits(Vec<Habit>),
    Tasks { tasks: Vec<Task>, goals: Vec<Goal> },
    Notifications(NotificationSettings),
    Progress(Vec<ProgressEntry>),
    Settings(AppSettings),
}

impl Change {
    pub fn kind(&self) -> StoreKind {
        match self {
            Change::Habits(_) => StoreKind::Habits,
            Change::Tasks { .. } => StoreKind::Tasks,
            Change::Notifications(_) => StoreKind::Notifications,
            Change::Progress(_) => StoreKind::Progress,
            Change::Settings(_) => StoreKind::Settings,
        }
    }

    fn apply(self, snapshot: &mut Snapshot) {
        match self {
            Change::Habits(habits) => snapshot.habits = habits,
            Change::Tasks { tasks, goals } => {
                snapshot.tasks = tasks;
                snapshot.goals = goals;
            }
            Change::Notifications(prefs) => snapshot.notification_settings = prefs,
            Change::Progress(entries) => snapshot.progress_data = entries,
            Change::Settings(settings) => snapshot.settings = settings,
        }
    }
}

/// Monotonic change counter plus the store that moved it last.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Revision {
    pub number: u64,
    pub source: Option<StoreKind>,
}

struct Autosave {
    storage: Storage,
    snapshot: Snapshot,
    pending: Vec<PendingWrite>,
}

/// Shared publish/subscribe point for store mutations.
///
/// Once [`ChangeFeed::autosave_to`] is called, every publish also rewrites the
/// whole `rootData` snapshot. There is no coalescing: one change, one write.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: Arc<watch::Sender<Revision>>,
    autosave: Arc<Mutex<Option<Autosave>>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _rx) = watch::channel(Revision::default());
        Self {
            sender: Arc::new(sender),
            autosave: Arc::new(Mutex::new(None)),
        }
    }

    pub fn publish(&self, change: Change) {
        let source = change.kind();
        if let Some(autosave) = self.lock().as_mut() {
            change.apply(&mut autosave.snapshot);
            let write = autosave.storage.save(ROOT_DATA_KEY, &autosave.snapshot);
            autosave.pending.push(write);
            debug!(?source, "root snapshot rewritten");
        }
        self.sender.send_modify(|revision| {
            revision.number += 1;
            revision.source = Some(source);
        });
    }

    /// Starts mirroring changes into `snapshot` and persisting it under
    /// `rootData` after each one.
    pub fn autosave_to(&self, storage: Storage, snapshot: Snapshot) {
        *self.lock() = Some(Autosave {
            storage,
            snapshot,
            pending: Vec::new(),
        });
    }

    /// Replaces the mirrored snapshot without writing it.
    pub fn resync(&self, snapshot: Snapshot) {
        if let Some(autosave) = self.lock().as_mut() {
            autosave.snapshot = snapshot;
        }
    }

    /// Every autosave write queued since the last call, as one handle.
    pub fn take_pending(&self) -> PendingWrite {
        match self.lock().as_mut() {
            Some(autosave) => autosave
                .pending
                .drain(..)
                .fold(PendingWrite::done(), PendingWrite::and),
            None => PendingWrite::done(),
        }
    }

    pub fn revision(&self) -> u64 {
        self.sender.borrow().number
    }

    pub fn subscribe(&self) -> watch::Receiver<Revision> {
        self.sender.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Autosave>> {
        self.autosave.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
