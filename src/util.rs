use chrono::{DateTime, NaiveDate, Utc};

use crate::model::{
    AppSettings, GlobalStats, Goal, Habit, HabitStats, NotificationSettings, ProductivityStats,
    ProgressEntry, PublicUser, ScheduledTask, Task,
};
use crate::notify::{ReminderTrigger, ScheduledReminder};

/// `YYYY-MM-DD`, the key format of `completionsByDate`.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `round(100 * part / total)`, or 0 when there is nothing to count.
pub fn percentage(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (part as f64 * 100.0 / total as f64).round() as u32
}

fn has_text(value: &Option<String>) -> bool {
    value
        .as_deref()
        .map(|text| !text.trim().is_empty())
        .unwrap_or(false)
}

fn checkbox(done: bool) -> &'static str {
    if done {
        "x"
    } else {
        " "
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M").to_string()
}

pub fn format_habit_line(habit: &Habit, day: NaiveDate) -> String {
    let done = habit
        .completions_by_date
        .get(&date_key(day))
        .copied()
        .unwrap_or(false);
    format!(
        "- [{}] {} {} (habit id {}, streak {})",
        checkbox(done),
        habit.emoji,
        habit.name,
        habit.id,
        habit.streak
    )
}

pub fn format_habit_detail(habit: &Habit) -> String {
    let mut output = String::new();
    output.push_str(&format!("Habit ID: {}\n", habit.id));
    output.push_str(&format!("Name: {} {}\n", habit.emoji, habit.name));
    if has_text(&habit.description) {
        output.push_str(&format!(
            "Description: {}\n",
            habit.description.as_deref().unwrap_or("")
        ));
    }
    output.push_str(&format!("Category: {}\n", habit.category));
    if habit.frequency.is_empty() {
        output.push_str("Frequency: every day\n");
    } else {
        let days: Vec<String> = habit.frequency.iter().map(|day| day.to_string()).collect();
        output.push_str(&format!("Frequency: {}\n", days.join(", ")));
    }
    if let Some(goal) = habit.goal {
        output.push_str(&format!("Goal: {goal}\n"));
    }
    if let Some(time) = habit.reminder_time {
        output.push_str(&format!("Reminder: {time}\n"));
    }
    if has_text(&habit.time) {
        output.push_str(&format!("Time: {}\n", habit.time.as_deref().unwrap_or("")));
    }
    output.push_str(&format!("Color: {}\n", habit.color));
    output.push_str(&format!("Streak: {}\n", habit.streak));
    output.push_str(&format!("Created: {}\n", format_datetime(habit.created_at)));
    output.push_str(&format!("Updated: {}\n", format_datetime(habit.updated_at)));
    output.push('\n');
    let done: Vec<&str> = habit
        .completions_by_date
        .iter()
        .filter(|(_, done)| **done)
        .map(|(day, _)| day.as_str())
        .collect();
    if done.is_empty() {
        output.push_str("Completed: (none)");
    } else {
        output.push_str(&format!("Completed: {}", done.join(", ")));
    }
    output
}

pub fn format_habit_stats(stats: &HabitStats) -> String {
    format!(
        "Habits: {}\nCompleted today: {}\nTotal completions: {}\nCompletion rate: {}%",
        stats.total, stats.completed_today, stats.total_completions, stats.completion_rate
    )
}

pub fn format_task_line(task: &Task) -> String {
    let mut line = format!(
        "- [{}] {} (task id {}, {})",
        checkbox(task.completed),
        task.title,
        task.id,
        task.priority.as_str()
    );
    if let Some(deadline) = task.deadline {
        line.push_str(&format!(" due {}", deadline.format("%Y-%m-%d")));
    }
    line
}

pub fn format_goal_line(goal: &Goal) -> String {
    format!(
        "- [{}] {} (goal id {}, {}%, tasks {}/{})",
        checkbox(goal.completed),
        goal.title,
        goal.id,
        goal.progress,
        goal.current,
        goal.tasks.len()
    )
}

pub fn format_goal_detail(goal: &Goal) -> String {
    let mut output = String::new();
    output.push_str(&format!("Goal ID: {}\n", goal.id));
    output.push_str(&format!("Title: {}\n", goal.title));
    if has_text(&goal.description) {
        output.push_str(&format!(
            "Description: {}\n",
            goal.description.as_deref().unwrap_or("")
        ));
    }
    output.push_str(&format!("Target: {}\n", goal.target));
    output.push_str(&format!("Target date: {}\n", goal.target_date.format("%Y-%m-%d")));
    output.push_str(&format!("Progress: {}%\n", goal.progress));
    output.push_str(&format!(
        "Status: {}\n",
        if goal.completed { "done" } else { "todo" }
    ));
    output.push_str(&format!("Created: {}\n", format_datetime(goal.created_at)));
    output.push('\n');
    if goal.tasks.is_empty() {
        output.push_str("Tasks: (none)");
        return output;
    }
    output.push_str("Tasks:\n");
    for task in &goal.tasks {
        output.push_str(&format_task_line(task));
        output.push('\n');
    }
    output.trim_end().to_string()
}

pub fn format_schedule(schedule: &[ScheduledTask]) -> String {
    if schedule.is_empty() {
        return "Nothing scheduled.".to_string();
    }
    schedule
        .iter()
        .enumerate()
        .map(|(index, task)| {
            format!(
                "{}. {} ({}, {} min, task id {})",
                index + 1,
                task.title,
                task.priority.as_str(),
                task.estimated_time,
                task.id
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_productivity_stats(stats: &ProductivityStats) -> String {
    format!(
        "Tasks: {}/{} ({}%)\nGoals: {}/{} ({}%)",
        stats.completed_tasks,
        stats.total_tasks,
        stats.task_completion_rate,
        stats.completed_goals,
        stats.total_goals,
        stats.goal_completion_rate
    )
}

pub fn format_global_stats(stats: &GlobalStats) -> String {
    format!(
        "Habits: {} ({} done today)\nTasks: {}/{} ({}%)\nGoals: {}/{} ({}%)",
        stats.habits_total,
        stats.habits_completed_today,
        stats.tasks_completed,
        stats.tasks_total,
        stats.task_completion_rate,
        stats.goals_completed,
        stats.goals_total,
        stats.goal_completion_rate
    )
}

pub fn format_user(user: &PublicUser) -> String {
    let mut output = String::new();
    output.push_str(&format!("User ID: {}\n", user.id));
    output.push_str(&format!("Name: {}\n", user.name));
    output.push_str(&format!("Email: {}\n", user.email));
    if has_text(&user.bio) {
        output.push_str(&format!("Bio: {}\n", user.bio.as_deref().unwrap_or("")));
    }
    output.push_str(&format!("Created: {}", format_datetime(user.created_at)));
    output
}

pub fn format_settings(settings: &AppSettings) -> String {
    format!(
        "Theme: {}\nLanguage: {}\nNotifications: {}\nVibration: {}\nSound: {}",
        settings.theme.as_str(),
        settings.language,
        on_off(settings.notifications_enabled),
        on_off(settings.vibration_enabled),
        on_off(settings.sound_enabled)
    )
}

pub fn format_notification_settings(prefs: &NotificationSettings) -> String {
    format!(
        "Enabled: {}\nDaily reminders: {}\nWeekly reports: {}\nReminder time: {}",
        on_off(prefs.enabled),
        on_off(prefs.daily_reminders),
        on_off(prefs.weekly_reports),
        prefs.reminder_time
    )
}

pub fn format_reminder(reminder: &ScheduledReminder) -> String {
    let when = match reminder.trigger {
        ReminderTrigger::Daily { hour, minute } => format!("daily {hour:02}:{minute:02}"),
        ReminderTrigger::Weekly {
            weekday,
            hour,
            minute,
        } => format!("weekly day {weekday} {hour:02}:{minute:02}"),
    };
    match &reminder.habit_id {
        Some(habit_id) => format!("- {when} {} (habit id {habit_id})", reminder.body),
        None => format!("- {when} {}", reminder.body),
    }
}

pub fn format_progress_entry(entry: &ProgressEntry) -> String {
    let mut line = format!(
        "{}: habits {}, tasks {}",
        date_key(entry.date),
        entry.habits_completed,
        entry.tasks_completed
    );
    if let Some(mood) = entry.mood {
        line.push_str(&format!(", mood {mood}"));
    }
    line
}
