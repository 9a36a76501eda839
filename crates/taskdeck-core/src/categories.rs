use std::collections::HashSet;

use crate::task::Task;

/// Categories the edit form offers; stored data may use anything.
pub const SUGGESTED_CATEGORIES: [&str; 6] =
    ["Personal", "Work", "Shopping", "Health", "Education", "Other"];

/// Distinct, trimmed, non-empty categories in first-seen order.
pub fn unique_categories(tasks: &[Task]) -> Vec<String> {
    let mut seen = HashSet::new();
    tasks
        .iter()
        .filter_map(|task| task.category.as_deref())
        .map(str::trim)
        .filter(|category| !category.is_empty())
        .filter(|category| seen.insert(*category))
        .map(ToString::to_string)
        .collect()
}
