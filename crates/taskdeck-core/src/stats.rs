use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::task::{Priority, Task};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PendingByPriority {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl PendingByPriority {
    pub fn is_empty(&self) -> bool {
        self.high == 0 && self.medium == 0 && self.low == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub overdue: usize,
    /// Rounded, always within 0..=100.
    pub completion_percentage: u8,
    pub pending_by_priority: PendingByPriority,
}

/// Aggregates over the full collection; `now` only affects `overdue`.
pub fn compute_stats(tasks: &[Task], now: DateTime<Utc>) -> TaskStats {
    let mut stats = TaskStats {
        total: tasks.len(),
        ..TaskStats::default()
    };

    for task in tasks {
        if task.done {
            stats.completed += 1;
            continue;
        }

        if task.is_overdue(now) {
            stats.overdue += 1;
        }
        match &task.priority {
            Priority::High => stats.pending_by_priority.high += 1,
            Priority::Medium => stats.pending_by_priority.medium += 1,
            Priority::Low => stats.pending_by_priority.low += 1,
            Priority::Other(_) => {}
        }
    }

    stats.pending = stats.total - stats.completed;
    stats.completion_percentage = completion_percentage(stats.completed, stats.total);
    stats
}

fn completion_percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    // Round half up in integer space.
    let pct = (completed * 200 + total) / (total * 2);
    pct.min(100) as u8
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{PendingByPriority, TaskStats, completion_percentage, compute_stats};
    use crate::task::{Priority, Task, TaskDraft};

    fn task(priority: Priority, done: bool) -> Task {
        let created = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut draft = TaskDraft::new("t");
        draft.priority = Some(priority);
        let mut task = Task::from_draft(draft, created).unwrap();
        task.done = done;
        task
    }

    #[test]
    fn empty_collection_is_all_zero() {
        let now = Utc::now();
        assert_eq!(compute_stats(&[], now), TaskStats::default());
    }

    #[test]
    fn counts_pending_completed_and_overdue() {
        let now = Utc.with_ymd_and_hms(2026, 2, 16, 12, 0, 0).unwrap();

        let mut late = task(Priority::High, false);
        late.due_date = Some(now - Duration::days(1));
        let mut late_but_done = task(Priority::High, true);
        late_but_done.due_date = Some(now - Duration::days(1));
        let mut upcoming = task(Priority::Medium, false);
        upcoming.due_date = Some(now + Duration::days(1));
        let undated = task(Priority::Low, false);

        let stats = compute_stats(&[late, late_but_done, upcoming, undated], now);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 3);
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.completion_percentage, 25);
        assert_eq!(
            stats.pending_by_priority,
            PendingByPriority {
                high: 1,
                medium: 1,
                low: 1
            }
        );
    }

    #[test]
    fn overdue_depends_on_the_instant() {
        let due = Utc.with_ymd_and_hms(2026, 2, 16, 12, 0, 0).unwrap();
        let mut t = task(Priority::Low, false);
        t.due_date = Some(due);
        let tasks = [t];

        assert_eq!(compute_stats(&tasks, due - Duration::seconds(1)).overdue, 0);
        assert_eq!(compute_stats(&tasks, due).overdue, 0);
        assert_eq!(compute_stats(&tasks, due + Duration::seconds(1)).overdue, 1);
    }

    #[test]
    fn percentage_rounds_and_stays_in_range() {
        assert_eq!(completion_percentage(0, 0), 0);
        assert_eq!(completion_percentage(1, 3), 33);
        assert_eq!(completion_percentage(2, 3), 67);
        assert_eq!(completion_percentage(1, 8), 13);
        assert_eq!(completion_percentage(5, 5), 100);
        for total in 1..40 {
            for done in 0..=total {
                assert!(completion_percentage(done, total) <= 100);
            }
        }
    }
}
