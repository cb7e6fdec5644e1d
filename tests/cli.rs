use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Statement};
use serde_json::Value;
use tempfile::TempDir;
use url::Url;

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_habitflow"))
}

fn run_cmd(dir: &TempDir, args: &[&str]) -> Output {
    let mut cmd = Command::new(bin_path());
    cmd.env("HABITFLOW_HOME", dir.path())
        .env_remove("HABITFLOW_LOG")
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd.output().expect("run command")
}

fn output_stdout(output: Output) -> String {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("stdout utf8")
}

fn output_failure(output: Output, code: i32) -> String {
    assert_eq!(
        output.status.code(),
        Some(code),
        "stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stderr).expect("stderr utf8")
}

fn parse_created_id(stdout: &str, prefix: &str) -> String {
    let first = stdout.lines().next().expect("created line");
    let rest = first.trim().strip_prefix(prefix).expect("created output");
    let id = rest
        .split(|ch: char| ch == ':' || ch.is_whitespace())
        .next()
        .expect("created id");
    id.to_string()
}

fn create_habit(dir: &TempDir, name: &str) -> String {
    let stdout = output_stdout(run_cmd(dir, &["habit", "add", name]));
    parse_created_id(&stdout, "Created habit ID: ")
}

fn create_goal(dir: &TempDir, title: &str) -> String {
    let stdout = output_stdout(run_cmd(dir, &["goal", "add", title, "--by", "2030-01-01"]));
    parse_created_id(&stdout, "Created goal ID: ")
}

fn create_task(dir: &TempDir, goal_id: &str, title: &str, priority: &str) -> String {
    let stdout = output_stdout(run_cmd(
        dir,
        &["task", "add", goal_id, title, "--priority", priority],
    ));
    parse_created_id(&stdout, "Created task ID: ")
}

async fn connect_db(dir: &TempDir) -> DatabaseConnection {
    let db_path = dir.path().join("habitflow.db");
    let mut url = Url::from_file_path(&db_path).expect("db path");
    url.set_query(Some("mode=rwc"));
    let sqlite_url = url.as_str().replacen("file://", "sqlite://", 1);
    Database::connect(&sqlite_url).await.expect("connect db")
}

async fn store_raw(dir: &TempDir, key: &str, text: &str) {
    let db = connect_db(dir).await;
    db.execute(Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        "INSERT OR REPLACE INTO kv_entries (key, value, updated_at) VALUES (?, ?, ?)",
        [key.into(), text.into(), "2024-01-01 00:00:00+00:00".into()],
    ))
    .await
    .expect("insert kv entry");
}

async fn stored_json(dir: &TempDir, key: &str) -> Option<Value> {
    let db = connect_db(dir).await;
    let row = db
        .query_one(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            "SELECT value FROM kv_entries WHERE key = ?",
            [key.into()],
        ))
        .await
        .expect("query kv entry")?;
    let text: String = row.try_get("", "value").expect("value column");
    Some(serde_json::from_str(&text).expect("stored json"))
}

fn stored_json_blocking(dir: &TempDir, key: &str) -> Value {
    tokio::runtime::Runtime::new()
        .expect("runtime")
        .block_on(stored_json(dir, key))
        .expect("stored value")
}

#[test]
fn habit_add_list_and_toggle() {
    let dir = TempDir::new().expect("temp dir");
    let id = create_habit(&dir, "Read");

    let list = output_stdout(run_cmd(&dir, &["habit", "list", "--date", "2024-05-01"]));
    assert!(list.contains(&format!("- [ ] ✅ Read (habit id {id}, streak 0)")));

    let toggled = output_stdout(run_cmd(
        &dir,
        &["habit", "toggle", &id, "--date", "2024-05-01"],
    ));
    assert_eq!(
        toggled.trim(),
        format!("Habit ID: {id} marked done for 2024-05-01 (streak 1).")
    );

    let list = output_stdout(run_cmd(&dir, &["habit", "list", "--date", "2024-05-01"]));
    assert!(list.contains(&format!("- [x] ✅ Read (habit id {id}, streak 1)")));

    let toggled = output_stdout(run_cmd(
        &dir,
        &["habit", "toggle", &id, "--date", "2024-05-01"],
    ));
    assert_eq!(
        toggled.trim(),
        format!("Habit ID: {id} marked not done for 2024-05-01 (streak 0).")
    );
}

#[test]
fn habit_done_is_idempotent() {
    let dir = TempDir::new().expect("temp dir");
    let id = create_habit(&dir, "Stretch");

    for _ in 0..2 {
        let stdout = output_stdout(run_cmd(
            &dir,
            &["habit", "done", &id, "--date", "2024-05-02"],
        ));
        assert_eq!(
            stdout.trim(),
            format!("Habit ID: {id} done for 2024-05-02 (streak 1).")
        );
    }
}

#[test]
fn habit_stats_count_today() {
    let dir = TempDir::new().expect("temp dir");
    let read = create_habit(&dir, "Read");
    create_habit(&dir, "Walk");
    output_stdout(run_cmd(
        &dir,
        &["habit", "done", &read, "--date", "2024-06-10"],
    ));

    let stats = output_stdout(run_cmd(&dir, &["habit", "stats", "--date", "2024-06-10"]));
    assert_eq!(
        stats.trim(),
        "Habits: 2\nCompleted today: 1\nTotal completions: 1\nCompletion rate: 50%"
    );
}

#[test]
fn habit_show_lists_schedule_and_completions() {
    let dir = TempDir::new().expect("temp dir");
    let stdout = output_stdout(run_cmd(
        &dir,
        &[
            "habit",
            "add",
            "Swim",
            "--category",
            "fitness",
            "--day",
            "mon",
            "--day",
            "thu",
            "--remind",
            "07:30",
        ],
    ));
    assert!(stdout.contains("Reminder set for 07:30."));
    let id = parse_created_id(&stdout, "Created habit ID: ");
    output_stdout(run_cmd(
        &dir,
        &["habit", "done", &id, "--date", "2024-06-13"],
    ));

    let detail = output_stdout(run_cmd(&dir, &["habit", "show", &id]));
    assert!(detail.contains("Category: fitness"));
    assert!(detail.contains("Frequency: Mon, Thu"));
    assert!(detail.contains("Reminder: 07:30"));
    assert!(detail.contains("Completed: 2024-06-13"));

    let reminders = output_stdout(run_cmd(&dir, &["notify", "reminders"]));
    let weekly: Vec<&str> = reminders
        .lines()
        .filter(|line| line.contains(&format!("(habit id {id})")))
        .collect();
    assert_eq!(weekly.len(), 2, "reminders: {reminders}");
    assert!(weekly.iter().all(|line| line.contains("07:30")));
}

#[test]
fn habit_remove_cancels_reminders() {
    let dir = TempDir::new().expect("temp dir");
    let stdout = output_stdout(run_cmd(
        &dir,
        &["habit", "add", "Journal", "--remind", "22:00"],
    ));
    let id = parse_created_id(&stdout, "Created habit ID: ");

    let removed = output_stdout(run_cmd(&dir, &["habit", "remove", &id]));
    assert_eq!(removed.trim(), format!("Habit ID: {id} removed."));

    let reminders = output_stdout(run_cmd(&dir, &["notify", "reminders"]));
    assert!(!reminders.contains(&id));
    let list = output_stdout(run_cmd(&dir, &["habit", "list"]));
    assert_eq!(list.trim(), "No habits found.");
}

#[test]
fn blank_habit_name_is_invalid_input() {
    let dir = TempDir::new().expect("temp dir");
    let stderr = output_failure(run_cmd(&dir, &["habit", "add", "  "]), 2);
    assert!(stderr.contains("Invalid input"), "stderr: {stderr}");
}

#[test]
fn unknown_ids_report_not_found() {
    let dir = TempDir::new().expect("temp dir");
    let stderr = output_failure(run_cmd(&dir, &["habit", "toggle", "missing"]), 3);
    assert_eq!(stderr.trim(), "Error: Not found: habit missing");

    let stderr = output_failure(run_cmd(&dir, &["task", "done", "missing"]), 3);
    assert_eq!(stderr.trim(), "Error: Not found: task missing");

    let stderr = output_failure(
        run_cmd(&dir, &["task", "add", "missing", "Orphan"]),
        3,
    );
    assert_eq!(stderr.trim(), "Error: Not found: goal missing");
}

#[test]
fn goal_progress_follows_task_completion() {
    let dir = TempDir::new().expect("temp dir");
    let goal = create_goal(&dir, "Launch");
    let first = create_task(&dir, &goal, "Draft", "high");
    create_task(&dir, &goal, "Review", "medium");
    create_task(&dir, &goal, "Publish", "low");

    let done = output_stdout(run_cmd(&dir, &["task", "done", &first]));
    assert_eq!(done.trim(), format!("Task ID: {first} marked done."));
    let again = output_stdout(run_cmd(&dir, &["task", "done", &first]));
    assert_eq!(again.trim(), format!("Task ID: {first} already done."));

    let detail = output_stdout(run_cmd(&dir, &["goal", "show", &goal]));
    assert!(detail.contains("Progress: 33%"), "detail: {detail}");
    assert!(detail.contains(&format!("- [x] Draft (task id {first}, high)")));

    let list = output_stdout(run_cmd(&dir, &["goal", "list"]));
    assert!(list.contains(&format!("- [ ] Launch (goal id {goal}, 33%, tasks 1/3)")));

    let reopened = output_stdout(run_cmd(&dir, &["task", "undo", &first]));
    assert_eq!(reopened.trim(), format!("Task ID: {first} reopened."));
    let detail = output_stdout(run_cmd(&dir, &["goal", "show", &goal]));
    assert!(detail.contains("Progress: 0%"));
}

#[test]
fn removing_goal_drops_its_tasks() {
    let dir = TempDir::new().expect("temp dir");
    let goal = create_goal(&dir, "Move");
    create_task(&dir, &goal, "Pack", "high");
    create_task(&dir, &goal, "Clean", "low");

    let removed = output_stdout(run_cmd(&dir, &["goal", "remove", &goal]));
    assert_eq!(removed.trim(), format!("Goal ID: {goal} removed with 2 task(s)."));

    let tasks = output_stdout(run_cmd(&dir, &["task", "list"]));
    assert_eq!(tasks.trim(), "No tasks found.");
    let goals = output_stdout(run_cmd(&dir, &["goal", "list"]));
    assert_eq!(goals.trim(), "No goals found.");
}

#[test]
fn schedule_orders_pending_tasks_by_priority() {
    let dir = TempDir::new().expect("temp dir");
    let goal = create_goal(&dir, "Week");
    create_task(&dir, &goal, "Low first", "low");
    create_task(&dir, &goal, "High", "high");
    let done = create_task(&dir, &goal, "Finished", "high");
    create_task(&dir, &goal, "Medium", "medium");
    output_stdout(run_cmd(&dir, &["task", "done", &done]));

    let schedule = output_stdout(run_cmd(&dir, &["task", "schedule"]));
    let titles: Vec<&str> = schedule
        .lines()
        .map(|line| {
            let rest = line.split_once(". ").expect("numbered line").1;
            rest.split(" (").next().expect("title")
        })
        .collect();
    assert_eq!(titles, vec!["High", "Medium", "Low first"]);
    assert!(schedule.contains("30 min"));

    let stats = output_stdout(run_cmd(&dir, &["task", "stats"]));
    assert_eq!(stats.trim(), "Tasks: 1/4 (25%)\nGoals: 0/1 (0%)");
}

#[test]
fn empty_schedule_says_so() {
    let dir = TempDir::new().expect("temp dir");
    let schedule = output_stdout(run_cmd(&dir, &["task", "schedule"]));
    assert_eq!(schedule.trim(), "Nothing scheduled.");
}

#[test]
fn task_list_filters_by_priority_and_pending() {
    let dir = TempDir::new().expect("temp dir");
    let goal = create_goal(&dir, "Filter");
    let high = create_task(&dir, &goal, "Urgent", "high");
    create_task(&dir, &goal, "Later", "low");
    create_task(&dir, &goal, "Also urgent", "high");
    output_stdout(run_cmd(&dir, &["task", "done", &high]));

    let listed = output_stdout(run_cmd(
        &dir,
        &["task", "list", "--priority", "high", "--pending"],
    ));
    assert_eq!(listed.lines().count(), 1);
    assert!(listed.contains("Also urgent"));
}

#[tokio::test]
async fn goal_changes_land_in_root_data() {
    let dir = TempDir::new().expect("temp dir");
    let goal = create_goal(&dir, "Persist");
    create_task(&dir, &goal, "Write", "medium");

    let root = stored_json(&dir, "rootData").await.expect("rootData");
    let goals = root["goals"].as_array().expect("goals");
    assert_eq!(goals.len(), 1);
    assert_eq!(goals[0]["id"], Value::String(goal));
    assert_eq!(root["tasks"].as_array().expect("tasks").len(), 1);
    assert!(root["notificationSettings"].is_object());
}

#[tokio::test]
async fn data_saved_by_the_mobile_app_is_kept() {
    let dir = TempDir::new().expect("temp dir");
    output_stdout(run_cmd(&dir, &["settings", "show"]));
    let legacy = r#"{
        "habits": [{"id": "1700000000000", "name": "Зарядка",
                    "frequency": ["Понедельник", "Среда"], "reminderTime": "За 5 минут",
                    "createdAt": "2024-01-01T08:00:00.000Z",
                    "updatedAt": "2024-01-01T08:00:00.000Z", "completionsByDate": {}}],
        "tasks": [],
        "goals": [{"id": "1700000000001", "title": "Old goal", "target": 1,
                   "targetDate": "2024-06-01T00:00:00.000Z", "tasks": []}],
        "progressData": {},
        "settings": {"theme": "dark"}
    }"#;
    store_raw(&dir, "rootData", legacy).await;

    let detail = output_stdout(run_cmd(&dir, &["habit", "show", "1700000000000"]));
    assert!(detail.contains("Frequency: Mon, Wed"), "detail: {detail}");
    let stdout = output_stdout(run_cmd(
        &dir,
        &["goal", "add", "New", "--by", "2030-01-01"],
    ));
    assert!(stdout.starts_with("Created goal ID: "));

    let root = stored_json(&dir, "rootData").await.expect("rootData");
    let titles: Vec<&str> = root["goals"]
        .as_array()
        .expect("goals")
        .iter()
        .map(|goal| goal["title"].as_str().expect("title"))
        .collect();
    assert_eq!(titles, vec!["Old goal", "New"]);
    assert_eq!(root["habits"][0]["name"], "Зарядка");
    assert_eq!(root["settings"]["theme"], "dark");
}

#[test]
fn register_login_and_whoami() {
    let dir = TempDir::new().expect("temp dir");
    let registered = output_stdout(run_cmd(
        &dir,
        &[
            "auth",
            "register",
            "--name",
            "Ada",
            "--email",
            "ada@example.com",
            "--password",
            "secret",
        ],
    ));
    assert!(registered.starts_with("Registered user ID: "));
    assert!(registered.contains("(ada@example.com)."));

    let whoami = output_stdout(run_cmd(&dir, &["auth", "whoami"]));
    assert!(whoami.contains("Email: ada@example.com"));
    let token = stored_json_blocking(&dir, "userToken");
    assert_eq!(
        whoami.lines().last(),
        Some(format!("Session token: {}", token.as_str().expect("token")).as_str())
    );

    output_stdout(run_cmd(&dir, &["auth", "logout"]));
    let whoami = output_stdout(run_cmd(&dir, &["auth", "whoami"]));
    assert_eq!(whoami.trim(), "Not signed in.");

    let signed_in = output_stdout(run_cmd(
        &dir,
        &[
            "auth",
            "login",
            "--email",
            "ada@example.com",
            "--password",
            "secret",
        ],
    ));
    assert_eq!(signed_in.trim(), "Signed in as ada@example.com.");
}

#[test]
fn duplicate_registration_is_a_conflict() {
    let dir = TempDir::new().expect("temp dir");
    let args = [
        "auth",
        "register",
        "--email",
        "sam@example.com",
        "--password",
        "pw",
    ];
    output_stdout(run_cmd(&dir, &args));
    let stderr = output_failure(run_cmd(&dir, &args), 4);
    assert!(stderr.contains("Conflict"), "stderr: {stderr}");
}

#[test]
fn login_failures_have_distinct_codes() {
    let dir = TempDir::new().expect("temp dir");
    output_stdout(run_cmd(
        &dir,
        &[
            "auth",
            "register",
            "--email",
            "kim@example.com",
            "--password",
            "right",
        ],
    ));

    let stderr = output_failure(
        run_cmd(
            &dir,
            &["auth", "login", "--email", "kim@example.com", "--password", "wrong"],
        ),
        2,
    );
    assert!(stderr.contains("wrong password"), "stderr: {stderr}");

    output_failure(
        run_cmd(
            &dir,
            &["auth", "login", "--email", "nobody@example.com", "--password", "x"],
        ),
        3,
    );
}

#[tokio::test]
async fn passwords_are_not_stored_in_plain_text() {
    let dir = TempDir::new().expect("temp dir");
    output_stdout(run_cmd(
        &dir,
        &[
            "auth",
            "register",
            "--email",
            "lee@example.com",
            "--password",
            "hunter2",
        ],
    ));

    let users = stored_json(&dir, "usersCollection").await.expect("users");
    let stored = users.to_string();
    assert!(!stored.contains("hunter2"));
    let user_data = stored_json(&dir, "userData").await.expect("userData");
    assert!(user_data.get("passwordHash").is_none());
    assert!(stored_json(&dir, "userToken").await.is_some());
}

#[test]
fn profile_update_requires_session() {
    let dir = TempDir::new().expect("temp dir");
    let stderr = output_failure(run_cmd(&dir, &["auth", "update", "--name", "X"]), 5);
    assert!(stderr.contains("not signed in"), "stderr: {stderr}");
}

#[test]
fn settings_persist_between_runs() {
    let dir = TempDir::new().expect("temp dir");
    let stdout = output_stdout(run_cmd(
        &dir,
        &["settings", "set", "--theme", "dark", "--sound", "false"],
    ));
    assert!(stdout.contains("Theme: dark"));

    let shown = output_stdout(run_cmd(&dir, &["settings", "show"]));
    assert!(shown.contains("Theme: dark"));
    assert!(shown.contains("Sound: off"));
    assert!(shown.contains("Vibration: on"));

    let reset = output_stdout(run_cmd(&dir, &["settings", "reset"]));
    assert!(reset.contains("Theme: light"));
    assert!(reset.contains("Sound: on"));
}

#[test]
fn notification_time_reschedules_daily_reminder() {
    let dir = TempDir::new().expect("temp dir");
    let stdout = output_stdout(run_cmd(&dir, &["notify", "set", "--time", "20:30"]));
    assert!(stdout.contains("Reminder time: 20:30"));

    let reminders = output_stdout(run_cmd(&dir, &["notify", "reminders"]));
    let daily: Vec<&str> = reminders
        .lines()
        .filter(|line| line.starts_with("- daily"))
        .collect();
    assert_eq!(daily, vec!["- daily 20:30 Remember to mark your habits today!"]);

    output_stdout(run_cmd(&dir, &["notify", "set", "--enabled", "false"]));
    let reminders = output_stdout(run_cmd(&dir, &["notify", "reminders"]));
    assert_eq!(reminders.trim(), "No reminders scheduled.");

    let shown = output_stdout(run_cmd(&dir, &["notify", "show"]));
    assert!(shown.contains("Enabled: off"));
    assert!(shown.contains("Reminder time: 20:30"));
}

#[test]
fn progress_entries_show_and_week() {
    let dir = TempDir::new().expect("temp dir");
    let recorded = output_stdout(run_cmd(
        &dir,
        &[
            "progress", "add", "--date", "2024-04-01", "--habits", "3", "--tasks", "2", "--mood",
            "4",
        ],
    ));
    assert_eq!(
        recorded.trim(),
        "Recorded 2024-04-01: habits 3, tasks 2, mood 4"
    );
    output_stdout(run_cmd(
        &dir,
        &["progress", "add", "--date", "2024-04-02", "--tasks", "1"],
    ));

    let shown = output_stdout(run_cmd(&dir, &["progress", "show", "2024-04-02"]));
    assert_eq!(shown.trim(), "2024-04-02: habits 0, tasks 1");

    let week = output_stdout(run_cmd(&dir, &["progress", "week"]));
    assert_eq!(week.lines().count(), 2);

    output_failure(run_cmd(&dir, &["progress", "show", "2024-04-09"]), 3);
    output_failure(
        run_cmd(&dir, &["progress", "add", "--mood", "9"]),
        2,
    );
}

#[test]
fn global_stats_combine_stores() {
    let dir = TempDir::new().expect("temp dir");
    let habit = create_habit(&dir, "Read");
    output_stdout(run_cmd(
        &dir,
        &["habit", "done", &habit, "--date", "2024-07-01"],
    ));
    let goal = create_goal(&dir, "Ship");
    let task = create_task(&dir, &goal, "Only task", "high");
    output_stdout(run_cmd(&dir, &["task", "done", &task]));

    let stats = output_stdout(run_cmd(&dir, &["stats", "--date", "2024-07-01"]));
    assert_eq!(
        stats.trim(),
        "Habits: 1 (1 done today)\nTasks: 1/1 (100%)\nGoals: 1/1 (100%)"
    );
}

#[test]
fn snapshot_export_import_round_trip() {
    let source = TempDir::new().expect("temp dir");
    let habit = create_habit(&source, "Meditate");
    let goal = create_goal(&source, "Calm");
    create_task(&source, &goal, "Breathe", "low");
    output_stdout(run_cmd(&source, &["settings", "set", "--language", "fr"]));

    let export_path = source.path().join("out").join("snapshot.json");
    let export_arg = export_path.to_str().expect("utf8 path");
    let exported = output_stdout(run_cmd(&source, &["snapshot", "export", export_arg]));
    assert!(exported.starts_with("Exported snapshot to "));

    let printed = output_stdout(run_cmd(&source, &["snapshot", "export"]));
    let json: Value = serde_json::from_str(&printed).expect("snapshot json");
    assert_eq!(json["habits"][0]["name"], "Meditate");
    assert_eq!(json["settings"]["language"], "fr");

    let target = TempDir::new().expect("temp dir");
    let imported = output_stdout(run_cmd(&target, &["snapshot", "import", export_arg]));
    assert_eq!(
        imported.trim(),
        "Imported snapshot: 1 habit(s), 1 goal(s), 1 task(s)."
    );

    let list = output_stdout(run_cmd(&target, &["habit", "list"]));
    assert!(list.contains(&format!("(habit id {habit}, streak 0)")));
    let settings = output_stdout(run_cmd(&target, &["settings", "show"]));
    assert!(settings.contains("Language: fr"));
    let detail = output_stdout(run_cmd(&target, &["goal", "show", &goal]));
    assert!(detail.contains("Breathe"));
}

#[test]
fn snapshot_import_rejects_bad_json() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").expect("write file");
    let stderr = output_failure(
        run_cmd(
            &dir,
            &["snapshot", "import", path.to_str().expect("utf8 path")],
        ),
        1,
    );
    assert!(stderr.contains("json error"), "stderr: {stderr}");
}

#[test]
fn data_dir_flag_overrides_environment() {
    let env_dir = TempDir::new().expect("temp dir");
    let flag_dir = TempDir::new().expect("temp dir");
    let flag_arg = flag_dir.path().to_str().expect("utf8 path");

    output_stdout(run_cmd(
        &env_dir,
        &["--data-dir", flag_arg, "habit", "add", "Elsewhere"],
    ));
    assert!(flag_dir.path().join("habitflow.db").exists());

    let list = output_stdout(run_cmd(&env_dir, &["habit", "list"]));
    assert_eq!(list.trim(), "No habits found.");
}
