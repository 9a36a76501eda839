use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::iso_date_serde;
use crate::error::StoreError;

const ID_SUFFIX_LEN: usize = 9;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
    /// A stored value we do not recognize, kept verbatim so saving writes it back.
    Other(String),
}

impl Priority {
    /// Sort weight: high=3, medium=2, low=1, unrecognized=0.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
            Priority::Other(_) => 0,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Other(raw) => raw,
        }
    }
}

impl From<String> for Priority {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "low" => Priority::Low,
            "medium" => Priority::Medium,
            "high" => Priority::High,
            _ => Priority::Other(raw),
        }
    }
}

impl From<Priority> for String {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "l" => Ok(Priority::Low),
            "medium" | "m" => Ok(Priority::Medium),
            "high" | "h" => Ok(Priority::High),
            other => Err(anyhow::anyhow!(
                "invalid priority: {other} (expected low, medium or high)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,

    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default, with = "iso_date_serde::option")]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub done: bool,

    #[serde(default, with = "iso_date_serde::option")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, with = "iso_date_serde::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Builds a fresh, not-done task from a validated draft.
    pub fn from_draft(draft: TaskDraft, now: DateTime<Utc>) -> Result<Self, StoreError> {
        let fields = draft.normalize()?;
        let now = stored_precision(now);
        Ok(Self {
            id: generate_task_id(now),
            text: fields.text,
            description: fields.description,
            category: fields.category,
            priority: fields.priority,
            due_date: fields.due_date,
            done: false,
            created_at: Some(now),
            updated_at: Some(now),
        })
    }

    /// Replaces the editable fields, keeping identity, completion and creation time.
    pub fn apply_draft(&mut self, draft: TaskDraft, now: DateTime<Utc>) -> Result<(), StoreError> {
        let fields = draft.normalize()?;
        self.text = fields.text;
        self.description = fields.description;
        self.category = fields.category;
        self.priority = fields.priority;
        self.due_date = fields.due_date;
        self.touch(now);
        Ok(())
    }

    pub fn toggle(&mut self, now: DateTime<Utc>) {
        self.done = !self.done;
        self.touch(now);
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.done && self.due_date.map(|due| due < now).unwrap_or(false)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        let now = stored_precision(now);
        // updatedAt never drops below createdAt, even with a skewed clock.
        self.updated_at = Some(match self.created_at {
            Some(created) if created > now => created,
            _ => now,
        });
    }
}

/// Add/edit payload as supplied by the presentation layer, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub text: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default, with = "iso_date_serde::option")]
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Seeds an edit form from an existing task.
    pub fn from_task(task: &Task) -> Self {
        Self {
            text: task.text.clone(),
            description: task.description.clone(),
            category: task.category.clone(),
            priority: Some(task.priority.clone()),
            due_date: task.due_date,
        }
    }

    fn normalize(self) -> Result<NormalizedDraft, StoreError> {
        let text = self.text.trim().to_string();
        if text.is_empty() {
            return Err(StoreError::EmptyText);
        }

        Ok(NormalizedDraft {
            text,
            description: non_empty_trimmed(self.description),
            category: non_empty_trimmed(self.category),
            priority: self.priority.unwrap_or_default(),
            due_date: self.due_date.map(stored_precision),
        })
    }
}

struct NormalizedDraft {
    text: String,
    description: Option<String>,
    category: Option<String>,
    priority: Priority,
    due_date: Option<DateTime<Utc>>,
}

fn non_empty_trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

/// Timestamps are persisted with millisecond precision; truncate up front so a
/// save/load cycle hands back identical values.
pub fn stored_precision(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.trunc_subsecs(3)
}

/// Epoch milliseconds followed by a short random lowercase hex suffix.
pub fn generate_task_id(now: DateTime<Utc>) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(ID_SUFFIX_LEN)
        .collect();
    format!("{}{}", now.timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{Priority, Task, TaskDraft, generate_task_id};
    use crate::error::StoreError;

    #[test]
    fn draft_normalizes_fields() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let draft = TaskDraft {
            text: "  Buy milk  ".to_string(),
            description: Some("   ".to_string()),
            category: Some(" Shopping ".to_string()),
            priority: None,
            due_date: None,
        };

        let task = Task::from_draft(draft, now).unwrap();
        assert_eq!(task.text, "Buy milk");
        assert_eq!(task.description, None);
        assert_eq!(task.category.as_deref(), Some("Shopping"));
        assert_eq!(task.priority, Priority::Low);
        assert!(!task.done);
        assert_eq!(task.created_at, Some(now));
        assert_eq!(task.updated_at, Some(now));
    }

    #[test]
    fn whitespace_only_text_is_rejected() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let err = Task::from_draft(TaskDraft::new("  \t "), now).unwrap_err();
        assert!(matches!(err, StoreError::EmptyText));
    }

    #[test]
    fn edit_keeps_identity_and_creation_time() {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let later = created + Duration::hours(3);
        let mut task = Task::from_draft(TaskDraft::new("Draft report"), created).unwrap();
        task.done = true;
        let id = task.id.clone();

        let mut draft = TaskDraft::from_task(&task);
        draft.text = "Final report".to_string();
        draft.priority = Some(Priority::High);
        task.apply_draft(draft, later).unwrap();

        assert_eq!(task.id, id);
        assert!(task.done);
        assert_eq!(task.text, "Final report");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.created_at, Some(created));
        assert_eq!(task.updated_at, Some(later));
    }

    #[test]
    fn failed_edit_leaves_task_untouched() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let mut task = Task::from_draft(TaskDraft::new("Keep me"), now).unwrap();
        let before = task.clone();
        assert!(task.apply_draft(TaskDraft::new(""), now).is_err());
        assert_eq!(task, before);
    }

    #[test]
    fn toggle_flips_done_and_refreshes_updated_at() {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let mut task = Task::from_draft(TaskDraft::new("Walk dog"), created).unwrap();

        let later = created + Duration::minutes(5);
        task.toggle(later);
        assert!(task.done);
        assert_eq!(task.updated_at, Some(later));

        // Clock went backwards: updatedAt is clamped to createdAt.
        task.toggle(created - Duration::days(1));
        assert!(!task.done);
        assert_eq!(task.updated_at, Some(created));
    }

    #[test]
    fn ids_carry_timestamp_prefix_and_differ() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let a = generate_task_id(now);
        let b = generate_task_id(now);
        let prefix = now.timestamp_millis().to_string();
        assert!(a.starts_with(&prefix));
        assert_eq!(a.len(), prefix.len() + 9);
        assert_ne!(a, b);
    }

    #[test]
    fn priority_parses_and_ranks() {
        assert_eq!("High".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("m".parse::<Priority>().unwrap(), Priority::Medium);
        assert!("urgent".parse::<Priority>().is_err());
        assert!(Priority::High.rank() > Priority::Medium.rank());
        assert!(Priority::Low.rank() > Priority::Other("urgent".to_string()).rank());
    }

    #[test]
    fn unknown_priority_in_stored_data_is_tolerated() {
        let raw = r#"{"id":"1","text":"x","priority":"urgent"}"#;
        let task: Task = serde_json::from_str(raw).unwrap();
        assert_eq!(task.priority, Priority::Other("urgent".to_string()));
        assert_eq!(task.created_at, None);
        assert!(!task.done);
    }

    #[test]
    fn unknown_priority_is_written_back_verbatim() {
        let raw = r#"{"id":"1","text":"x","priority":"urgent"}"#;
        let task: Task = serde_json::from_str(raw).unwrap();
        let saved = serde_json::to_value(&task).unwrap();
        assert_eq!(saved["priority"], "urgent");

        let known = Task::from_draft(TaskDraft::new("y"), Utc::now()).unwrap();
        assert_eq!(serde_json::to_value(&known).unwrap()["priority"], "low");
    }
}
