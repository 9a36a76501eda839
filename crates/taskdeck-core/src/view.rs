use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, instrument};

use crate::datetime::format_display_date;
use crate::filter::FilterState;
use crate::sort::{SortMode, sort_tasks};
use crate::task::Task;

/// Filter, then sort the survivors. Always a full recomputation.
#[instrument(skip(tasks, filter, sort), fields(total = tasks.len(), sort = %sort))]
pub fn compose_view(tasks: &[Task], filter: &FilterState, sort: SortMode) -> Vec<Task> {
    let survivors: Vec<Task> = tasks
        .iter()
        .filter(|task| filter.matches(task))
        .cloned()
        .collect();
    debug!(visible = survivors.len(), "filtered view");
    sort_tasks(&survivors, sort)
}

/// A task decorated with what a list row needs to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayTask {
    pub task: Task,
    pub is_overdue: bool,
    pub formatted_due_date: Option<String>,
    pub formatted_created_date: Option<String>,
}

impl DisplayTask {
    pub fn new(task: Task, now: DateTime<Utc>, tz: Tz) -> Self {
        let is_overdue = task.is_overdue(now);
        let formatted_due_date = task.due_date.map(|due| format_display_date(due, tz));
        let formatted_created_date = task
            .created_at
            .map(|created| format_display_date(created, tz));
        Self {
            task,
            is_overdue,
            formatted_due_date,
            formatted_created_date,
        }
    }
}

pub fn decorate(view: Vec<Task>, now: DateTime<Utc>, tz: Tz) -> Vec<DisplayTask> {
    view.into_iter()
        .map(|task| DisplayTask::new(task, now, tz))
        .collect()
}
