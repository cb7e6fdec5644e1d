use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use crate::db;
use crate::model::{GoalInput, HabitInput, Priority, TaskInput};
use crate::storage::{SqliteBackend, Storage};

pub async fn setup_storage() -> (TempDir, Storage) {
    let dir = TempDir::new().expect("temp dir");
    let db_path = db::resolve_db_path(dir.path());
    db::ensure_parent_dir(&db_path).expect("ensure parent");
    let db = db::connect(&db_path).await.expect("connect db");
    db::ensure_schema(&db).await.expect("ensure schema");
    (dir, Storage::spawn(SqliteBackend::new(db)))
}

pub fn habit_input(name: &str) -> HabitInput {
    HabitInput {
        name: name.to_string(),
        category: "health".to_string(),
        color: "#4caf50".to_string(),
        emoji: "📚".to_string(),
        ..HabitInput::default()
    }
}

pub fn goal_input(title: &str) -> GoalInput {
    GoalInput {
        title: title.to_string(),
        description: None,
        target: 1,
        target_date: Utc
            .with_ymd_and_hms(2030, 1, 1, 0, 0, 0)
            .single()
            .expect("date"),
    }
}

pub fn task_input(title: &str, priority: Priority) -> TaskInput {
    TaskInput {
        title: title.to_string(),
        priority,
        ..TaskInput::default()
    }
}
