use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use icu_collator::options::{CollatorOptions, Strength};
use icu_collator::{Collator, CollatorBorrowed, CollatorPreferences};
use tracing::{debug, instrument, warn};

use crate::task::Task;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    /// Newest first.
    #[default]
    Created,
    /// Soonest deadline first, undated last.
    DueDate,
    /// High, medium, low, then anything unrecognized.
    Priority,
    Alphabetical,
}

impl SortMode {
    pub const ALL: [SortMode; 4] = [
        SortMode::Created,
        SortMode::DueDate,
        SortMode::Priority,
        SortMode::Alphabetical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::Created => "created",
            SortMode::DueDate => "dueDate",
            SortMode::Priority => "priority",
            SortMode::Alphabetical => "alphabetical",
        }
    }

    /// Lenient parse: anything unrecognized falls back to `Created`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "duedate" | "due" | "due-date" | "due_date" => SortMode::DueDate,
            "priority" => SortMode::Priority,
            "alphabetical" | "alpha" | "text" => SortMode::Alphabetical,
            "created" => SortMode::Created,
            other => {
                debug!(mode = %other, "unrecognized sort mode; using created");
                SortMode::Created
            }
        }
    }

    pub fn compare(self, a: &Task, b: &Task) -> Ordering {
        match self {
            SortMode::Created => b.created_at.cmp(&a.created_at),
            SortMode::DueDate => cmp_optional(a.due_date.as_ref(), b.due_date.as_ref()),
            SortMode::Priority => b.priority.rank().cmp(&a.priority.rank()),
            SortMode::Alphabetical => compare_text(&a.text, &b.text),
        }
    }
}

impl FromStr for SortMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_lenient(s))
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns a newly ordered copy; ties keep their input order.
#[instrument(skip(tasks), fields(count = tasks.len()))]
pub fn sort_tasks(tasks: &[Task], mode: SortMode) -> Vec<Task> {
    let mut sorted = tasks.to_vec();
    sorted.sort_by(|a, b| mode.compare(a, b));
    sorted
}

/// `Some` before `None`, otherwise natural order.
fn cmp_optional<T: Ord>(left: Option<&T>, right: Option<&T>) -> Ordering {
    match (left, right) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

thread_local! {
    static COLLATOR: Option<CollatorBorrowed<'static>> = root_collator();
}

/// Root-locale collator at tertiary strength: accents and case only break
/// ties between otherwise equal letters.
fn root_collator() -> Option<CollatorBorrowed<'static>> {
    let mut options = CollatorOptions::default();
    options.strength = Some(Strength::Tertiary);
    match Collator::try_new(CollatorPreferences::default(), options) {
        Ok(collator) => Some(collator),
        Err(err) => {
            warn!(error = %err, "collation data unavailable; sorting by folded case");
            None
        }
    }
}

/// Locale-aware text order. Equal keys stay equal so the stable sort keeps
/// their input order.
fn compare_text(a: &str, b: &str) -> Ordering {
    COLLATOR.with(|collator| match collator {
        Some(collator) => collator.compare(a, b),
        None => a.to_lowercase().cmp(&b.to_lowercase()),
    })
}
