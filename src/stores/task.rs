use std::cmp::Reverse;

use chrono::Utc;
use tracing::info;

use crate::changes::{Change, ChangeFeed};
use crate::error::AppError;
use crate::ids::IdGenerator;
use crate::model::{
    Goal, GoalChanges, GoalInput, Priority, ProductivityStats, ScheduledTask, Task, TaskChanges,
    TaskInput,
};
use crate::stores::ensure_non_empty;
use crate::util::percentage;

const RECOMMENDED_LIMIT: usize = 5;
const DEFAULT_ESTIMATE_MINUTES: u32 = 30;

/// Goals and their tasks.
///
/// Each task lives twice: inside its goal and in the flat `tasks` list. Both
/// copies are updated together. This store has no key of its own; it is
/// persisted as part of the root snapshot.
pub struct TaskStore {
    tasks: Vec<Task>,
    goals: Vec<Goal>,
    feed: ChangeFeed,
    ids: IdGenerator,
}

impl TaskStore {
    pub fn new(feed: ChangeFeed, ids: IdGenerator) -> Self {
        Self {
            tasks: Vec::new(),
            goals: Vec::new(),
            feed,
            ids,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn replace(&mut self, tasks: Vec<Task>, goals: Vec<Goal>) {
        for task in &tasks {
            self.ids.observe_str(&task.id);
        }
        for goal in &goals {
            self.ids.observe_str(&goal.id);
            for task in &goal.tasks {
                self.ids.observe_str(&task.id);
            }
        }
        self.tasks = tasks;
        self.goals = goals;
    }

    pub fn add_goal(&mut self, input: GoalInput) -> Result<Goal, AppError> {
        ensure_non_empty("goal title", &input.title)?;
        let goal = Goal {
            id: self.ids.next_string(),
            title: input.title,
            description: input.description,
            target: input.target,
            current: 0,
            progress: 0,
            target_date: input.target_date,
            completed: false,
            created_at: Utc::now(),
            tasks: Vec::new(),
        };
        self.goals.push(goal.clone());
        info!(goal_id = %goal.id, "goal added");
        self.changed();
        Ok(goal)
    }

    /// Returns `Ok(None)` when the goal does not exist.
    pub fn add_task_to_goal(
        &mut self,
        goal_id: &str,
        input: TaskInput,
    ) -> Result<Option<Task>, AppError> {
        ensure_non_empty("task title", &input.title)?;
        let Some(goal) = self.goals.iter_mut().find(|goal| goal.id == goal_id) else {
            return Ok(None);
        };
        let task = Task {
            id: self.ids.next_string(),
            title: input.title,
            description: input.description,
            completed: false,
            priority: input.priority,
            deadline: input.deadline,
            created_at: Utc::now(),
            estimated_time: input.estimated_time,
        };
        goal.tasks.push(task.clone());
        refresh_goal_progress(goal);
        self.tasks.push(task.clone());
        self.changed();
        Ok(Some(task))
    }

    /// Returns `false` for unknown or already completed tasks.
    pub fn complete_task(&mut self, task_id: &str) -> bool {
        self.set_completed(task_id, true)
    }

    /// Returns `false` for unknown or not yet completed tasks.
    pub fn uncomplete_task(&mut self, task_id: &str) -> bool {
        self.set_completed(task_id, false)
    }

    fn set_completed(&mut self, task_id: &str, completed: bool) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == task_id) else {
            return false;
        };
        if task.completed == completed {
            return false;
        }
        task.completed = completed;
        for goal in &mut self.goals {
            if let Some(owned) = goal.tasks.iter_mut().find(|task| task.id == task_id) {
                owned.completed = completed;
                refresh_goal_progress(goal);
            }
        }
        self.changed();
        true
    }

    /// Removes the goal together with its tasks in the flat list.
    pub fn remove_goal(&mut self, goal_id: &str) -> Option<Goal> {
        let index = self.goals.iter().position(|goal| goal.id == goal_id)?;
        let goal = self.goals.remove(index);
        self.tasks
            .retain(|task| !goal.tasks.iter().any(|owned| owned.id == task.id));
        info!(goal_id, removed_tasks = goal.tasks.len(), "goal removed");
        self.changed();
        Some(goal)
    }

    pub fn remove_task(&mut self, task_id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != task_id);
        let mut found = before != self.tasks.len();
        for goal in &mut self.goals {
            let owned = goal.tasks.len();
            goal.tasks.retain(|task| task.id != task_id);
            if goal.tasks.len() != owned {
                found = true;
                refresh_goal_progress(goal);
            }
        }
        if found {
            self.changed();
        }
        found
    }

    pub fn update_task(&mut self, task_id: &str, changes: TaskChanges) -> Result<bool, AppError> {
        if let Some(title) = changes.title.as_deref() {
            ensure_non_empty("task title", title)?;
        }
        let mut found = false;
        if let Some(task) = self.tasks.iter_mut().find(|task| task.id == task_id) {
            apply_task_changes(task, &changes);
            found = true;
        }
        for goal in &mut self.goals {
            if let Some(owned) = goal.tasks.iter_mut().find(|task| task.id == task_id) {
                apply_task_changes(owned, &changes);
                refresh_goal_progress(goal);
                found = true;
            }
        }
        if found {
            self.changed();
        }
        Ok(found)
    }

    pub fn update_goal(&mut self, goal_id: &str, changes: GoalChanges) -> Result<bool, AppError> {
        if let Some(title) = changes.title.as_deref() {
            ensure_non_empty("goal title", title)?;
        }
        let Some(goal) = self.goals.iter_mut().find(|goal| goal.id == goal_id) else {
            return Ok(false);
        };
        if let Some(title) = changes.title {
            goal.title = title;
        }
        if let Some(description) = changes.description {
            goal.description = Some(description);
        }
        if let Some(target) = changes.target {
            goal.target = target;
        }
        if let Some(target_date) = changes.target_date {
            goal.target_date = target_date;
        }
        refresh_goal_progress(goal);
        self.changed();
        Ok(true)
    }

    pub fn get_goal(&self, goal_id: &str) -> Option<&Goal> {
        self.goals.iter().find(|goal| goal.id == goal_id)
    }

    pub fn get_task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    pub fn pending_tasks(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|task| !task.completed).collect()
    }

    pub fn tasks_by_priority(&self, priority: Priority) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| task.priority == priority)
            .collect()
    }

    /// Goals with progress recomputed from their tasks, whatever was stored.
    pub fn goals_with_progress(&self) -> Vec<Goal> {
        self.goals
            .iter()
            .cloned()
            .map(|mut goal| {
                refresh_goal_progress(&mut goal);
                goal
            })
            .collect()
    }

    /// Up to five open tasks, highest priority first. Ties keep list order.
    pub fn recommended_schedule(&self) -> Vec<ScheduledTask> {
        let mut pending = self.pending_tasks();
        pending.sort_by_key(|task| Reverse(task.priority.weight()));
        pending
            .into_iter()
            .take(RECOMMENDED_LIMIT)
            .map(|task| ScheduledTask {
                id: task.id.clone(),
                title: task.title.clone(),
                priority: task.priority,
                estimated_time: task.estimated_time.unwrap_or(DEFAULT_ESTIMATE_MINUTES),
            })
            .collect()
    }

    pub fn productivity_stats(&self) -> ProductivityStats {
        let total_tasks = self.tasks.len();
        let completed_tasks = self.tasks.iter().filter(|task| task.completed).count();
        let total_goals = self.goals.len();
        let completed_goals = self.goals.iter().filter(|goal| goal.completed).count();
        ProductivityStats {
            total_tasks,
            completed_tasks,
            total_goals,
            completed_goals,
            task_completion_rate: percentage(completed_tasks, total_tasks),
            goal_completion_rate: percentage(completed_goals, total_goals),
        }
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
        self.goals.clear();
        self.changed();
    }

    fn changed(&self) {
        self.feed.publish(Change::Tasks {
            tasks: self.tasks.clone(),
            goals: self.goals.clone(),
        });
    }
}

/// Re-derives `current`, `progress` and `completed` from the goal's tasks.
pub fn refresh_goal_progress(goal: &mut Goal) {
    let total = goal.tasks.len();
    let done = goal.tasks.iter().filter(|task| task.completed).count();
    goal.current = u32::try_from(done).unwrap_or(u32::MAX);
    goal.progress = percentage(done, total);
    goal.completed = goal.progress >= 100;
}

fn apply_task_changes(task: &mut Task, changes: &TaskChanges) {
    if let Some(title) = &changes.title {
        task.title = title.clone();
    }
    if let Some(description) = &changes.description {
        task.description = Some(description.clone());
    }
    if let Some(priority) = changes.priority {
        task.priority = priority;
    }
    if let Some(deadline) = changes.deadline {
        task.deadline = Some(deadline);
    }
    if let Some(estimated_time) = changes.estimated_time {
        task.estimated_time = Some(estimated_time);
    }
}
