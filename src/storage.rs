//! Best-effort JSON key-value persistence.
//!
//! All reads and writes go through a single worker task, so writes land in
//! the order they were submitted and a read observes every write queued
//! before it. Failures are logged and surface only as `false` / `None`.

use std::future::Future;

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, Set};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::entities::kv_entry;

pub const ROOT_DATA_KEY: &str = "rootData";
pub const ROOT_DATA_BACKUP_KEY: &str = "rootData.backup";
pub const HABITS_KEY: &str = "habits";
pub const SETTINGS_KEY: &str = "settings";
pub const USERS_COLLECTION_KEY: &str = "usersCollection";
pub const USER_TOKEN_KEY: &str = "userToken";
pub const USER_DATA_KEY: &str = "userData";
pub const PROGRESS_DATA_KEY: &str = "progressData";
pub const SCHEDULED_REMINDERS_KEY: &str = "scheduledReminders";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
}

/// Raw string storage underneath [`Storage`].
pub trait KeyValueBackend: Send + Sync + 'static {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;
    fn set(
        &self,
        key: &str,
        value: String,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
    fn clear(&self) -> impl Future<Output = Result<(), StorageError>> + Send;
}

pub struct SqliteBackend {
    db: DatabaseConnection,
}

impl SqliteBackend {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl KeyValueBackend for SqliteBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entry = kv_entry::Entity::find_by_id(key.to_string())
            .one(&self.db)
            .await?;
        Ok(entry.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let active = kv_entry::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value),
            updated_at: Set(Utc::now()),
        };
        kv_entry::Entity::insert(active)
            .on_conflict(
                OnConflict::column(kv_entry::Column::Key)
                    .update_columns([kv_entry::Column::Value, kv_entry::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        kv_entry::Entity::delete_by_id(key.to_string())
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        kv_entry::Entity::delete_many().exec(&self.db).await?;
        Ok(())
    }
}

enum StorageMsg {
    Get {
        key: String,
        resp: oneshot::Sender<Result<Option<String>, StorageError>>,
    },
    Set {
        key: String,
        value: String,
        resp: oneshot::Sender<bool>,
    },
    Remove {
        key: String,
        resp: oneshot::Sender<bool>,
    },
    Clear {
        resp: oneshot::Sender<bool>,
    },
    Flush {
        resp: oneshot::Sender<()>,
    },
}

/// Outcome of one or more queued writes.
///
/// Dropping it is fine: the write still happens, only the result is lost.
pub struct PendingWrite {
    receivers: Vec<oneshot::Receiver<bool>>,
    rejected: bool,
}

impl PendingWrite {
    fn queued(rx: oneshot::Receiver<bool>) -> Self {
        Self {
            receivers: vec![rx],
            rejected: false,
        }
    }

    /// A handle for a mutation that had nothing to write.
    pub fn done() -> Self {
        Self {
            receivers: Vec::new(),
            rejected: false,
        }
    }

    fn rejected() -> Self {
        Self {
            receivers: Vec::new(),
            rejected: true,
        }
    }

    /// Combines two handles; the result succeeds only if both do.
    pub fn and(mut self, other: PendingWrite) -> PendingWrite {
        self.receivers.extend(other.receivers);
        self.rejected |= other.rejected;
        self
    }

    pub async fn wait(self) -> bool {
        let mut ok = !self.rejected;
        for rx in self.receivers {
            ok &= rx.await.unwrap_or(false);
        }
        ok
    }
}

/// Cloneable handle to the storage worker.
#[derive(Clone)]
pub struct Storage {
    sender: mpsc::UnboundedSender<StorageMsg>,
}

impl Storage {
    /// Starts the worker on the current tokio runtime.
    pub fn spawn<B: KeyValueBackend>(backend: B) -> Self {
        let (sender, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(backend, rx));
        Self { sender }
    }

    /// Serializes `value` now and queues the write. JSON `null` removes the key.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> PendingWrite {
        let text = match serde_json::to_string(value) {
            Ok(text) => text,
            Err(err) => {
                error!(key, error = %err, "failed to serialize value");
                return PendingWrite::rejected();
            }
        };
        if text == "null" {
            return self.remove(key);
        }
        self.save_string(key, text)
    }

    pub fn save_string(&self, key: &str, value: impl Into<String>) -> PendingWrite {
        let (resp, rx) = oneshot::channel();
        self.enqueue(
            key,
            StorageMsg::Set {
                key: key.to_string(),
                value: value.into(),
                resp,
            },
            rx,
        )
    }

    pub fn remove(&self, key: &str) -> PendingWrite {
        let (resp, rx) = oneshot::channel();
        self.enqueue(
            key,
            StorageMsg::Remove {
                key: key.to_string(),
                resp,
            },
            rx,
        )
    }

    pub fn clear(&self) -> PendingWrite {
        let (resp, rx) = oneshot::channel();
        self.enqueue("*", StorageMsg::Clear { resp }, rx)
    }

    /// Loads and parses a JSON value. Absent, empty, or unparsable values
    /// all come back as `None`.
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let text = self.load_string(key).await?;
        if text.is_empty() {
            return None;
        }
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "stored value does not parse");
                None
            }
        }
    }

    pub async fn load_string(&self, key: &str) -> Option<String> {
        let (resp, rx) = oneshot::channel();
        let msg = StorageMsg::Get {
            key: key.to_string(),
            resp,
        };
        if self.sender.send(msg).is_err() {
            error!(key, "storage worker is gone");
            return None;
        }
        match rx.await {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => {
                error!(key, error = %err, "storage read failed");
                None
            }
            Err(_) => {
                error!(key, "storage worker dropped the read");
                None
            }
        }
    }

    /// Waits until every write queued so far has been applied.
    pub async fn flush(&self) {
        let (resp, rx) = oneshot::channel();
        if self.sender.send(StorageMsg::Flush { resp }).is_err() {
            return;
        }
        let _ = rx.await;
    }

    fn enqueue(&self, key: &str, msg: StorageMsg, rx: oneshot::Receiver<bool>) -> PendingWrite {
        if self.sender.send(msg).is_err() {
            error!(key, "storage worker is gone; write dropped");
            return PendingWrite::rejected();
        }
        PendingWrite::queued(rx)
    }
}

async fn run_worker<B: KeyValueBackend>(backend: B, mut rx: mpsc::UnboundedReceiver<StorageMsg>) {
    while let Some(msg) = rx.recv().await {
        match msg {
            StorageMsg::Get { key, resp } => {
                let _ = resp.send(backend.get(&key).await);
            }
            StorageMsg::Set { key, value, resp } => {
                let ok = report(&key, "save", backend.set(&key, value).await);
                let _ = resp.send(ok);
            }
            StorageMsg::Remove { key, resp } => {
                let ok = report(&key, "remove", backend.delete(&key).await);
                let _ = resp.send(ok);
            }
            StorageMsg::Clear { resp } => {
                let ok = report("*", "clear", backend.clear().await);
                let _ = resp.send(ok);
            }
            StorageMsg::Flush { resp } => {
                let _ = resp.send(());
            }
        }
    }
    debug!("storage worker stopped");
}

fn report(key: &str, op: &'static str, result: Result<(), StorageError>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            error!(key, op, error = %err, "storage write failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_storage;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    struct FailingBackend;

    fn unplugged() -> StorageError {
        StorageError::Db(sea_orm::DbErr::Custom("disk unplugged".to_string()))
    }

    impl KeyValueBackend for FailingBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(unplugged())
        }

        async fn set(&self, _key: &str, _value: String) -> Result<(), StorageError> {
            Err(unplugged())
        }

        async fn delete(&self, _key: &str) -> Result<(), StorageError> {
            Err(unplugged())
        }

        async fn clear(&self) -> Result<(), StorageError> {
            Err(unplugged())
        }
    }

    #[tokio::test]
    async fn save_then_load_returns_value() {
        let (_dir, storage) = setup_storage().await;
        let sample = Sample {
            name: "water".to_string(),
            count: 3,
        };
        assert!(storage.save("sample", &sample).wait().await);

        let loaded: Option<Sample> = storage.load("sample").await;
        assert_eq!(loaded, Some(sample));
    }

    #[tokio::test]
    async fn missing_key_loads_as_none() {
        let (_dir, storage) = setup_storage().await;
        let loaded: Option<Sample> = storage.load("nothing-here").await;
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn unparsable_value_loads_as_none() {
        let (_dir, storage) = setup_storage().await;
        storage.save_string("broken", "{not json");
        let loaded: Option<Sample> = storage.load("broken").await;
        assert!(loaded.is_none());
        assert_eq!(
            storage.load_string("broken").await.as_deref(),
            Some("{not json")
        );
    }

    #[tokio::test]
    async fn saving_null_removes_key() {
        let (_dir, storage) = setup_storage().await;
        storage.save("token", "abc");
        assert!(storage.save("token", &Option::<String>::None).wait().await);
        assert!(storage.load_string("token").await.is_none());
    }

    #[tokio::test]
    async fn last_submitted_write_wins() {
        let (_dir, storage) = setup_storage().await;
        storage.save("counter", &1);
        let second = storage.save("counter", &2);
        let third = storage.save("counter", &3);
        assert!(second.and(third).wait().await);

        let loaded: Option<u32> = storage.load("counter").await;
        assert_eq!(loaded, Some(3));
    }

    #[tokio::test]
    async fn reads_observe_queued_writes_without_waiting() {
        let (_dir, storage) = setup_storage().await;
        storage.save("habits", &vec!["read"]);
        let loaded: Option<Vec<String>> = storage.load("habits").await;
        assert_eq!(loaded, Some(vec!["read".to_string()]));
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let (_dir, storage) = setup_storage().await;
        storage.save("a", &1);
        storage.save("b", &2);
        assert!(storage.clear().wait().await);
        assert!(storage.load_string("a").await.is_none());
        assert!(storage.load_string("b").await.is_none());
    }

    #[tokio::test]
    async fn failing_backend_reports_false_and_none() {
        let storage = Storage::spawn(FailingBackend);
        assert!(!storage.save("a", &1).wait().await);
        assert!(!storage.remove("a").wait().await);
        let loaded: Option<u32> = storage.load("a").await;
        assert!(loaded.is_none());
        storage.flush().await;
    }
}
