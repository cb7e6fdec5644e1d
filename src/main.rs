mod changes;
mod cli;
mod config;
mod db;
mod entities;
mod error;
mod ids;
mod logging;
mod model;
mod notify;
mod storage;
mod stores;
#[cfg(test)]
mod test_support;
mod util;

use std::fs;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};
use clap::Parser;
use tracing::debug;

use crate::cli::{
    AuthCommand, AuthLogin, AuthRegister, AuthUpdate, Cli, Command, DateArg, GoalAdd,
    GoalCommand, GoalUpdate, HabitAdd, HabitCommand, HabitMark, IdArg, NotifyCommand, NotifySet,
    PriorityArg, ProgressAdd, ProgressCommand, SettingsCommand, SettingsSet, SnapshotCommand,
    TaskAdd, TaskCommand, TaskList, TaskUpdate, ThemeArg,
};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::model::{
    GoalChanges, GoalInput, HabitInput, Priority, ProfileChanges, ProgressEntry, Registration,
    Snapshot, TaskChanges, TaskInput, Theme,
};
use crate::notify::ReminderBook;
use crate::storage::{PendingWrite, SqliteBackend, Storage};
use crate::stores::root::RootStore;
use crate::util::{
    format_global_stats, format_goal_detail, format_goal_line, format_habit_detail,
    format_habit_line, format_habit_stats, format_notification_settings,
    format_productivity_stats, format_progress_entry, format_reminder, format_schedule,
    format_settings, format_task_line, format_user,
};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err}");
        std::process::exit(err.exit_code());
    }
}

async fn run() -> Result<(), AppError> {
    let Cli { data_dir, command } = Cli::parse();
    logging::init();

    let config = AppConfig::resolve(data_dir)?;
    let db_path = config.db_path();
    db::ensure_parent_dir(&db_path)?;
    let mut lock = db::open_lock(&db_path)?;
    let _guard = lock.write()?;

    let db = db::connect(&db_path).await?;
    db::ensure_schema(&db).await?;
    debug!(path = %db_path.display(), "database ready");

    let storage = Storage::spawn(SqliteBackend::new(db));
    let reminders = Arc::new(ReminderBook::load(storage.clone()).await);
    let mut root = RootStore::new(storage.clone(), reminders.clone());
    root.hydrate().await;
    debug!(
        auth_restored = root.auth.hydrated() && root.auth.is_authenticated(),
        "stores hydrated"
    );

    let mut changes = root.subscribe();
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let revision = *changes.borrow_and_update();
            debug!(revision = revision.number, source = ?revision.source, "store changed");
        }
    });

    let result = match command {
        Command::Habit(command) => handle_habit(&mut root, command).await,
        Command::Goal(command) => handle_goal(&mut root, command),
        Command::Task(command) => handle_task(&mut root, command),
        Command::Auth(command) => {
            let result = handle_auth(&mut root, command).await;
            if let Some(message) = root.auth.last_error() {
                debug!(%message, "auth store recorded a failure");
            }
            result
        }
        Command::Settings(command) => handle_settings(&mut root, command).await,
        Command::Notify(command) => handle_notify(&mut root, &reminders, command),
        Command::Progress(command) => handle_progress(&mut root, command).await,
        Command::Stats(DateArg { date }) => {
            let stats = match date {
                Some(day) => root.global_stats_on(day),
                None => root.global_stats(),
            };
            println!("{}", format_global_stats(&stats));
            Ok(())
        }
        Command::Snapshot(command) => handle_snapshot(&mut root, command).await,
    };

    confirm_saved(root.settle(), "snapshot").await?;
    storage.flush().await;
    result
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn day_or_today(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(today)
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn priority_from_arg(arg: PriorityArg) -> Priority {
    match arg {
        PriorityArg::Low => Priority::Low,
        PriorityArg::Medium => Priority::Medium,
        PriorityArg::High => Priority::High,
    }
}

fn theme_from_arg(arg: ThemeArg) -> Theme {
    match arg {
        ThemeArg::Light => Theme::Light,
        ThemeArg::Dark => Theme::Dark,
    }
}

/// Waits for a queued write and turns a failed one into an error.
async fn confirm_saved(write: PendingWrite, what: &str) -> Result<(), AppError> {
    if write.wait().await {
        Ok(())
    } else {
        Err(AppError::Io(std::io::Error::other(format!(
            "failed to save {what}"
        ))))
    }
}

async fn handle_habit(root: &mut RootStore, command: HabitCommand) -> Result<(), AppError> {
    match command {
        HabitCommand::Add(args) => handle_habit_add(root, args).await,
        HabitCommand::List(DateArg { date }) => {
            let day = day_or_today(date);
            let habits = root.habits.habits();
            if habits.is_empty() {
                println!("No habits found.");
                return Ok(());
            }
            for habit in habits {
                println!("{}", format_habit_line(habit, day));
            }
            Ok(())
        }
        HabitCommand::Show(IdArg { id }) => {
            let habit = root
                .habits
                .get(&id)
                .ok_or_else(|| AppError::not_found("habit", &id))?;
            println!("{}", format_habit_detail(habit));
            Ok(())
        }
        HabitCommand::Toggle(HabitMark { id, date }) => {
            let day = day_or_today(date);
            let change = root
                .habits
                .toggle_completion(&id, day)
                .ok_or_else(|| AppError::not_found("habit", &id))?;
            confirm_saved(change.persisted, "habits").await?;
            let habit = change.value;
            let state = if habit.completions_by_date.get(&util::date_key(day)) == Some(&true) {
                "done"
            } else {
                "not done"
            };
            println!(
                "Habit ID: {} marked {} for {} (streak {}).",
                habit.id, state, day, habit.streak
            );
            Ok(())
        }
        HabitCommand::Done(HabitMark { id, date }) => {
            let day = day_or_today(date);
            let change = root
                .habits
                .complete(&id, day)
                .ok_or_else(|| AppError::not_found("habit", &id))?;
            confirm_saved(change.persisted, "habits").await?;
            println!(
                "Habit ID: {} done for {} (streak {}).",
                change.value.id, day, change.value.streak
            );
            Ok(())
        }
        HabitCommand::Remove(IdArg { id }) => {
            let change = root
                .habits
                .delete(&id)
                .ok_or_else(|| AppError::not_found("habit", &id))?;
            confirm_saved(change.persisted, "habits").await?;
            println!("Habit ID: {} removed.", change.value.id);
            Ok(())
        }
        HabitCommand::Stats(DateArg { date }) => {
            let stats = match date {
                Some(day) => root.habits.stats_on(day),
                None => root.habits.stats(),
            };
            println!("{}", format_habit_stats(&stats));
            Ok(())
        }
        HabitCommand::Clear => {
            confirm_saved(root.habits.clear(), "habits").await?;
            println!("All habits removed.");
            Ok(())
        }
    }
}

async fn handle_habit_add(root: &mut RootStore, args: HabitAdd) -> Result<(), AppError> {
    let created = root.habits.create(HabitInput {
        name: args.name,
        description: args.description,
        category: args.category,
        frequency: args.days,
        goal: args.goal,
        reminder_time: args.reminder_time,
        color: args.color,
        emoji: args.emoji,
        time: args.time,
    })?;
    confirm_saved(created.persisted, "habits").await?;
    let habit = created.value;
    println!("Created habit ID: {}: {}", habit.id, habit.name);
    if let Some(time) = habit.reminder_time {
        println!("Reminder set for {time}.");
    }
    Ok(())
}

fn handle_goal(root: &mut RootStore, command: GoalCommand) -> Result<(), AppError> {
    match command {
        GoalCommand::Add(GoalAdd {
            title,
            description,
            target,
            target_date,
        }) => {
            let goal = root.tasks.add_goal(GoalInput {
                title,
                description,
                target,
                target_date: start_of_day(target_date),
            })?;
            println!("Created goal ID: {}: {}", goal.id, goal.title);
        }
        GoalCommand::List => {
            let goals = root.tasks.goals_with_progress();
            if goals.is_empty() {
                println!("No goals found.");
            }
            for goal in &goals {
                println!("{}", format_goal_line(goal));
            }
        }
        GoalCommand::Show(IdArg { id }) => {
            let goal = root
                .tasks
                .get_goal(&id)
                .ok_or_else(|| AppError::not_found("goal", &id))?;
            println!("{}", format_goal_detail(goal));
        }
        GoalCommand::Update(GoalUpdate {
            id,
            title,
            description,
            target,
            target_date,
        }) => {
            let changes = GoalChanges {
                title,
                description,
                target,
                target_date: target_date.map(start_of_day),
            };
            if !root.tasks.update_goal(&id, changes)? {
                return Err(AppError::not_found("goal", &id));
            }
            println!("Updated goal ID: {id}.");
        }
        GoalCommand::Remove(IdArg { id }) => {
            let goal = root
                .tasks
                .remove_goal(&id)
                .ok_or_else(|| AppError::not_found("goal", &id))?;
            println!(
                "Goal ID: {} removed with {} task(s).",
                goal.id,
                goal.tasks.len()
            );
        }
        GoalCommand::Clear => {
            root.tasks.clear();
            println!("All goals and tasks removed.");
        }
    }
    Ok(())
}

fn handle_task(root: &mut RootStore, command: TaskCommand) -> Result<(), AppError> {
    match command {
        TaskCommand::Add(TaskAdd {
            goal_id,
            title,
            description,
            priority,
            deadline,
            estimated_time,
        }) => {
            let input = TaskInput {
                title,
                description,
                priority: priority_from_arg(priority),
                deadline: deadline.map(start_of_day),
                estimated_time,
            };
            let task = root
                .tasks
                .add_task_to_goal(&goal_id, input)?
                .ok_or_else(|| AppError::not_found("goal", &goal_id))?;
            println!("Created task ID: {} for goal ID: {}", task.id, goal_id);
        }
        TaskCommand::List(TaskList { pending, priority }) => {
            let tasks: Vec<_> = match priority {
                Some(priority) => root.tasks.tasks_by_priority(priority_from_arg(priority)),
                None => root.tasks.tasks().iter().collect(),
            };
            let tasks: Vec<_> = tasks
                .into_iter()
                .filter(|task| !pending || !task.completed)
                .collect();
            if tasks.is_empty() {
                println!("No tasks found.");
            }
            for task in tasks {
                println!("{}", format_task_line(task));
            }
        }
        TaskCommand::Done(IdArg { id }) => {
            require_task(root, &id)?;
            if root.tasks.complete_task(&id) {
                println!("Task ID: {id} marked done.");
            } else {
                println!("Task ID: {id} already done.");
            }
        }
        TaskCommand::Undo(IdArg { id }) => {
            require_task(root, &id)?;
            if root.tasks.uncomplete_task(&id) {
                println!("Task ID: {id} reopened.");
            } else {
                println!("Task ID: {id} is not done.");
            }
        }
        TaskCommand::Update(TaskUpdate {
            id,
            title,
            description,
            priority,
            deadline,
            estimated_time,
        }) => {
            let changes = TaskChanges {
                title,
                description,
                priority: priority.map(priority_from_arg),
                deadline: deadline.map(start_of_day),
                estimated_time,
            };
            if !root.tasks.update_task(&id, changes)? {
                return Err(AppError::not_found("task", &id));
            }
            println!("Updated task ID: {id}.");
        }
        TaskCommand::Remove(IdArg { id }) => {
            if !root.tasks.remove_task(&id) {
                return Err(AppError::not_found("task", &id));
            }
            println!("Task ID: {id} removed.");
        }
        TaskCommand::Schedule => {
            println!("{}", format_schedule(&root.tasks.recommended_schedule()));
        }
        TaskCommand::Stats => {
            println!(
                "{}",
                format_productivity_stats(&root.tasks.productivity_stats())
            );
        }
    }
    Ok(())
}

fn require_task(root: &RootStore, id: &str) -> Result<(), AppError> {
    root.tasks
        .get_task(id)
        .map(|_| ())
        .ok_or_else(|| AppError::not_found("task", id))
}

async fn handle_auth(root: &mut RootStore, command: AuthCommand) -> Result<(), AppError> {
    match command {
        AuthCommand::Register(AuthRegister {
            name,
            email,
            password,
            bio,
        }) => {
            let registered = root
                .auth
                .register(Registration {
                    name,
                    email,
                    password,
                    bio,
                })
                .await?;
            confirm_saved(registered.persisted, "users").await?;
            println!(
                "Registered user ID: {} ({}).",
                registered.value.id, registered.value.email
            );
        }
        AuthCommand::Login(AuthLogin { email, password }) => {
            let session = root.auth.login(&email, &password).await?;
            confirm_saved(session.persisted, "users").await?;
            println!("Signed in as {}.", session.value.email);
        }
        AuthCommand::Logout => {
            confirm_saved(root.auth.logout(), "session").await?;
            println!("Signed out.");
        }
        AuthCommand::Whoami => match (root.auth.user(), root.auth.token()) {
            (Some(user), Some(token)) => {
                println!("{}", format_user(user));
                println!("Session token: {token}");
            }
            _ => println!("Not signed in."),
        },
        AuthCommand::Update(AuthUpdate { name, email, bio }) => {
            let updated = root
                .auth
                .update_profile(ProfileChanges { name, email, bio })
                .await?;
            confirm_saved(updated.persisted, "profile").await?;
            println!("{}", format_user(&updated.value));
        }
        AuthCommand::Users => {
            let users = root.auth.list_users().await;
            if users.is_empty() {
                println!("No users found.");
            }
            for user in users {
                println!("- {} <{}> (user id {})", user.name, user.email, user.id);
            }
        }
        AuthCommand::Reset => {
            confirm_saved(root.auth.reset(), "users").await?;
            println!("All users removed.");
        }
    }
    Ok(())
}

async fn handle_settings(root: &mut RootStore, command: SettingsCommand) -> Result<(), AppError> {
    match command {
        SettingsCommand::Show => {}
        SettingsCommand::Set(SettingsSet {
            theme,
            language,
            notifications,
            vibration,
            sound,
        }) => {
            let mut write = PendingWrite::done();
            if let Some(theme) = theme {
                write = write.and(root.settings.set_theme(theme_from_arg(theme)));
            }
            if let Some(language) = language {
                write = write.and(root.settings.set_language(&language)?);
            }
            if let Some(enabled) = notifications {
                write = write.and(root.settings.set_notifications_enabled(enabled));
            }
            if let Some(enabled) = vibration {
                write = write.and(root.settings.set_vibration_enabled(enabled));
            }
            if let Some(enabled) = sound {
                write = write.and(root.settings.set_sound_enabled(enabled));
            }
            confirm_saved(write, "settings").await?;
        }
        SettingsCommand::Reset => {
            confirm_saved(root.settings.reset(), "settings").await?;
        }
    }
    println!("{}", format_settings(root.settings.settings()));
    Ok(())
}

fn handle_notify(
    root: &mut RootStore,
    reminders: &ReminderBook,
    command: NotifyCommand,
) -> Result<(), AppError> {
    match command {
        NotifyCommand::Show => {}
        NotifyCommand::Set(NotifySet {
            enabled,
            daily,
            weekly,
            time,
        }) => {
            if let Some(time) = time {
                root.notifications.set_reminder_time(time);
            }
            if let Some(daily) = daily {
                root.notifications.set_daily_reminders(daily);
            }
            if let Some(weekly) = weekly {
                root.notifications.set_weekly_reports(weekly);
            }
            if let Some(enabled) = enabled {
                root.notifications.set_enabled(enabled);
            }
        }
        NotifyCommand::Reset => root.notifications.reset(),
        NotifyCommand::Reminders => {
            let scheduled = reminders.scheduled();
            if scheduled.is_empty() {
                println!("No reminders scheduled.");
            }
            for reminder in &scheduled {
                println!("{}", format_reminder(reminder));
            }
            return Ok(());
        }
    }
    println!(
        "{}",
        format_notification_settings(root.notifications.prefs())
    );
    Ok(())
}

async fn handle_progress(root: &mut RootStore, command: ProgressCommand) -> Result<(), AppError> {
    match command {
        ProgressCommand::Add(ProgressAdd {
            date,
            habits_completed,
            tasks_completed,
            mood,
        }) => {
            let entry = ProgressEntry {
                date: day_or_today(date),
                habits_completed,
                tasks_completed,
                mood,
            };
            let line = format_progress_entry(&entry);
            confirm_saved(root.progress.add(entry), "progress").await?;
            println!("Recorded {line}");
        }
        ProgressCommand::Show(args) => {
            let entry = root
                .progress
                .for_date(args.date)
                .ok_or_else(|| AppError::not_found("progress entry", args.date))?;
            println!("{}", format_progress_entry(entry));
        }
        ProgressCommand::Week => {
            let week = root.progress.weekly();
            if week.is_empty() {
                println!("No progress recorded.");
            }
            for entry in week {
                println!("{}", format_progress_entry(entry));
            }
        }
        ProgressCommand::Clear => {
            confirm_saved(root.progress.clear(), "progress").await?;
            println!("Progress cleared.");
        }
    }
    Ok(())
}

async fn handle_snapshot(root: &mut RootStore, command: SnapshotCommand) -> Result<(), AppError> {
    match command {
        SnapshotCommand::Export(args) => {
            let json = serde_json::to_string_pretty(&root.snapshot())?;
            match args.path {
                Some(path) => {
                    db::ensure_parent_dir(&path)?;
                    fs::write(&path, json)?;
                    println!("Exported snapshot to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        SnapshotCommand::Import(args) => {
            let text = fs::read_to_string(&args.path)?;
            let snapshot: Snapshot = serde_json::from_str(&text)?;
            confirm_saved(root.import(snapshot), "snapshot").await?;
            println!(
                "Imported snapshot: {} habit(s), {} goal(s), {} task(s).",
                root.habits.habits().len(),
                root.tasks.goals().len(),
                root.tasks.tasks().len()
            );
        }
    }
    Ok(())
}
