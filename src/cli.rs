use std::path::PathBuf;

use chrono::{NaiveDate, Weekday};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::model::ReminderTime;

#[derive(Parser, Debug)]
#[command(
    name = "habitflow",
    version,
    about = "Track habits, goals and tasks in a local SQLite store"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Data directory (defaults to $HABITFLOW_HOME or ~/.habitflow)"
    )]
    pub data_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(subcommand)]
    Habit(HabitCommand),
    #[command(subcommand)]
    Goal(GoalCommand),
    #[command(subcommand)]
    Task(TaskCommand),
    #[command(subcommand)]
    Auth(AuthCommand),
    #[command(subcommand)]
    Settings(SettingsCommand),
    #[command(subcommand)]
    Notify(NotifyCommand),
    #[command(subcommand)]
    Progress(ProgressCommand),
    /// Combined habit, task and goal statistics.
    Stats(DateArg),
    #[command(subcommand)]
    Snapshot(SnapshotCommand),
}

#[derive(Subcommand, Debug)]
pub enum HabitCommand {
    Add(HabitAdd),
    List(DateArg),
    Show(IdArg),
    Toggle(HabitMark),
    Done(HabitMark),
    Remove(IdArg),
    Stats(DateArg),
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum GoalCommand {
    Add(GoalAdd),
    List,
    Show(IdArg),
    Update(GoalUpdate),
    Remove(IdArg),
    /// Remove every goal and task.
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    Add(TaskAdd),
    List(TaskList),
    Done(IdArg),
    Undo(IdArg),
    Update(TaskUpdate),
    Remove(IdArg),
    Schedule,
    Stats,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    Register(AuthRegister),
    Login(AuthLogin),
    Logout,
    Whoami,
    Update(AuthUpdate),
    Users,
    /// Delete every account and sign out.
    Reset,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    Show,
    Set(SettingsSet),
    Reset,
}

#[derive(Subcommand, Debug)]
pub enum NotifyCommand {
    Show,
    Set(NotifySet),
    Reset,
    /// List the reminders currently scheduled.
    Reminders,
}

#[derive(Subcommand, Debug)]
pub enum ProgressCommand {
    Add(ProgressAdd),
    Show(ProgressShow),
    Week,
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommand {
    /// Print the combined snapshot as JSON (or write it to PATH).
    Export(SnapshotExport),
    /// Replace all data with a snapshot file.
    Import(SnapshotImport),
}

#[derive(Args, Debug)]
pub struct IdArg {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct DateArg {
    #[arg(long, value_name = "YYYY-MM-DD", help = "Day to report on (defaults to today)")]
    pub date: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub struct HabitAdd {
    pub name: String,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long, default_value = "general")]
    pub category: String,
    #[arg(long = "day", value_name = "WEEKDAY", help = "Repeat on this weekday (repeatable)")]
    pub days: Vec<Weekday>,
    #[arg(long, value_name = "COUNT")]
    pub goal: Option<u32>,
    #[arg(long = "remind", value_name = "HH:MM")]
    pub reminder_time: Option<ReminderTime>,
    #[arg(long, default_value = "#4caf50")]
    pub color: String,
    #[arg(long, default_value = "✅")]
    pub emoji: String,
    #[arg(long, value_name = "TEXT")]
    pub time: Option<String>,
}

#[derive(Args, Debug)]
pub struct HabitMark {
    pub id: String,
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub struct GoalAdd {
    pub title: String,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long, default_value_t = 1)]
    pub target: u32,
    #[arg(long = "by", value_name = "YYYY-MM-DD")]
    pub target_date: NaiveDate,
}

#[derive(Args, Debug)]
pub struct GoalUpdate {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub target: Option<u32>,
    #[arg(long = "by", value_name = "YYYY-MM-DD")]
    pub target_date: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub struct TaskAdd {
    pub goal_id: String,
    pub title: String,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long, value_enum, default_value_t = PriorityArg::Medium)]
    pub priority: PriorityArg,
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub deadline: Option<NaiveDate>,
    #[arg(long = "estimate", value_name = "MINUTES")]
    pub estimated_time: Option<u32>,
}

#[derive(Args, Debug)]
pub struct TaskList {
    #[arg(long, help = "Only tasks that are not completed")]
    pub pending: bool,
    #[arg(long, value_enum)]
    pub priority: Option<PriorityArg>,
}

#[derive(Args, Debug)]
pub struct TaskUpdate {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long, value_enum)]
    pub priority: Option<PriorityArg>,
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub deadline: Option<NaiveDate>,
    #[arg(long = "estimate", value_name = "MINUTES")]
    pub estimated_time: Option<u32>,
}

#[derive(Args, Debug)]
pub struct AuthRegister {
    #[arg(long, default_value = "")]
    pub name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub password: String,
    #[arg(long)]
    pub bio: Option<String>,
}

#[derive(Args, Debug)]
pub struct AuthLogin {
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub password: String,
}

#[derive(Args, Debug)]
pub struct AuthUpdate {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub bio: Option<String>,
}

#[derive(Args, Debug)]
pub struct SettingsSet {
    #[arg(long, value_enum)]
    pub theme: Option<ThemeArg>,
    #[arg(long)]
    pub language: Option<String>,
    #[arg(long, value_name = "BOOL")]
    pub notifications: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    pub vibration: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    pub sound: Option<bool>,
}

#[derive(Args, Debug)]
pub struct NotifySet {
    #[arg(long, value_name = "BOOL")]
    pub enabled: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    pub daily: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    pub weekly: Option<bool>,
    #[arg(long, value_name = "HH:MM")]
    pub time: Option<ReminderTime>,
}

#[derive(Args, Debug)]
pub struct ProgressAdd {
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: Option<NaiveDate>,
    #[arg(long = "habits", default_value_t = 0)]
    pub habits_completed: u32,
    #[arg(long = "tasks", default_value_t = 0)]
    pub tasks_completed: u32,
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
    pub mood: Option<u8>,
}

#[derive(Args, Debug)]
pub struct ProgressShow {
    pub date: NaiveDate,
}

#[derive(Args, Debug)]
pub struct SnapshotExport {
    pub path: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SnapshotImport {
    pub path: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum PriorityArg {
    Low,
    Medium,
    High,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ThemeArg {
    Light,
    Dark,
}
