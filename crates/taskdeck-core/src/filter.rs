use std::fmt;
use std::str::FromStr;

use tracing::trace;

use crate::task::{
  Priority,
  Task
};

/// Sentinel shared by the category and
/// priority selectors.
pub const ALL: &str = "all";

#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
)]
pub enum CategoryFilter {
  #[default]
  All,
  Named(String)
}

impl From<String> for CategoryFilter {
  fn from(raw: String) -> Self {
    if raw == ALL {
      CategoryFilter::All
    } else {
      CategoryFilter::Named(raw)
    }
  }
}

impl FromStr for CategoryFilter {
  type Err = std::convert::Infallible;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Ok(Self::from(s.to_string()))
  }
}

impl fmt::Display for CategoryFilter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | CategoryFilter::All => {
        f.write_str(ALL)
      }
      | CategoryFilter::Named(name) => {
        f.write_str(name)
      }
    }
  }
}

#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
)]
pub enum PriorityFilter {
  #[default]
  All,
  Only(Priority)
}

impl FromStr for PriorityFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    if s.trim().eq_ignore_ascii_case(ALL)
    {
      return Ok(PriorityFilter::All);
    }
    s.parse().map(PriorityFilter::Only)
  }
}

impl fmt::Display for PriorityFilter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | PriorityFilter::All => {
        f.write_str(ALL)
      }
      | PriorityFilter::Only(p) => {
        write!(f, "{p}")
      }
    }
  }
}

/// Transient selection the presentation
/// layer drives; never persisted.
#[derive(
  Debug, Clone, PartialEq, Eq,
)]
pub struct FilterState {
  pub search_query:      String,
  pub selected_category: CategoryFilter,
  pub selected_priority: PriorityFilter,
  pub show_completed:    bool
}

impl Default for FilterState {
  fn default() -> Self {
    Self {
      search_query:      String::new(),
      selected_category:
        CategoryFilter::All,
      selected_priority:
        PriorityFilter::All,
      show_completed:    true
    }
  }
}

impl FilterState {
  /// True iff `task` passes the search,
  /// category, priority and completion
  /// checks together.
  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    let search = self.matches_search(task);
    let category =
      self.matches_category(task);
    let priority =
      self.matches_priority(task);
    let completion =
      self.matches_completion(task);

    let ok = search
      && category
      && priority
      && completion;
    trace!(
      id = %task.id,
      search,
      category,
      priority,
      completion,
      ok,
      "filter evaluation"
    );
    ok
  }

  pub fn matches_search(
    &self,
    task: &Task
  ) -> bool {
    if self.search_query.is_empty() {
      return true;
    }
    let needle =
      self.search_query.to_lowercase();

    task
      .text
      .to_lowercase()
      .contains(&needle)
      || task
        .description
        .as_deref()
        .map(|desc| {
          desc
            .to_lowercase()
            .contains(&needle)
        })
        .unwrap_or(false)
  }

  pub fn matches_category(
    &self,
    task: &Task
  ) -> bool {
    match &self.selected_category {
      | CategoryFilter::All => true,
      | CategoryFilter::Named(name) => {
        task.category.as_deref()
          == Some(name.as_str())
      }
    }
  }

  pub fn matches_priority(
    &self,
    task: &Task
  ) -> bool {
    match &self.selected_priority {
      | PriorityFilter::All => true,
      | PriorityFilter::Only(p) => {
        task.priority == *p
      }
    }
  }

  pub fn matches_completion(
    &self,
    task: &Task
  ) -> bool {
    self.show_completed || !task.done
  }

  /// No field narrows the view.
  pub fn is_unrestricted(
    &self
  ) -> bool {
    self.search_query.is_empty()
      && self.selected_category
        == CategoryFilter::All
      && self.selected_priority
        == PriorityFilter::All
      && self.show_completed
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };

  use super::{
    CategoryFilter,
    FilterState,
    PriorityFilter
  };
  use crate::task::{
    Priority,
    Task,
    TaskDraft
  };

  fn task(
    text: &str,
    priority: Priority,
    done: bool
  ) -> Task {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 16, 5, 0, 0
      )
      .unwrap();
    let mut draft = TaskDraft::new(text);
    draft.priority = Some(priority);
    let mut task =
      Task::from_draft(draft, now)
        .unwrap();
    task.done = done;
    task
  }

  #[test]
  fn hides_completed_when_requested() {
    let milk =
      task("Buy milk", Priority::High, false);
    let book =
      task("Read book", Priority::Low, true);

    let filter = FilterState {
      show_completed: false,
      ..FilterState::default()
    };

    assert!(filter.matches(&milk));
    assert!(!filter.matches(&book));
  }

  #[test]
  fn search_covers_text_and_description()
  {
    let mut t = task(
      "Call plumber",
      Priority::Low,
      false
    );
    t.description =
      Some("Kitchen SINK leaking".to_string());

    let by_text = FilterState {
      search_query: "PLUMB".to_string(),
      ..FilterState::default()
    };
    let by_desc = FilterState {
      search_query: "sink".to_string(),
      ..FilterState::default()
    };
    let miss = FilterState {
      search_query: "garage".to_string(),
      ..FilterState::default()
    };

    assert!(by_text.matches(&t));
    assert!(by_desc.matches(&t));
    assert!(!miss.matches(&t));

    t.description = None;
    assert!(!by_desc.matches(&t));
  }

  #[test]
  fn category_match_is_exact_and_case_sensitive()
   {
    let mut t =
      task("Standup", Priority::Low, false);
    t.category = Some("Work".to_string());

    let exact = FilterState {
      selected_category:
        CategoryFilter::Named(
          "Work".to_string()
        ),
      ..FilterState::default()
    };
    let lower = FilterState {
      selected_category:
        CategoryFilter::Named(
          "work".to_string()
        ),
      ..FilterState::default()
    };

    assert!(exact.matches(&t));
    assert!(!lower.matches(&t));

    t.category = None;
    assert!(!exact.matches(&t));
  }

  #[test]
  fn every_condition_must_hold() {
    let mut t =
      task("Pay rent", Priority::High, true);
    t.category = Some("Home".to_string());

    let all_pass = FilterState {
      search_query:      "rent".to_string(),
      selected_category:
        CategoryFilter::Named(
          "Home".to_string()
        ),
      selected_priority:
        PriorityFilter::Only(
          Priority::High
        ),
      show_completed:    true
    };
    assert!(all_pass.matches(&t));

    let failing = [
      FilterState {
        search_query: "nope".to_string(),
        ..all_pass.clone()
      },
      FilterState {
        selected_category:
          CategoryFilter::Named(
            "Work".to_string()
          ),
        ..all_pass.clone()
      },
      FilterState {
        selected_priority:
          PriorityFilter::Only(
            Priority::Low
          ),
        ..all_pass.clone()
      },
      FilterState {
        show_completed: false,
        ..all_pass.clone()
      }
    ];
    for filter in &failing {
      assert!(!filter.matches(&t));
    }
  }

  #[test]
  fn sentinels_parse() {
    assert_eq!(
      "all"
        .parse::<PriorityFilter>()
        .unwrap(),
      PriorityFilter::All
    );
    assert_eq!(
      "medium"
        .parse::<PriorityFilter>()
        .unwrap(),
      PriorityFilter::Only(
        Priority::Medium
      )
    );
    assert_eq!(
      "all"
        .parse::<CategoryFilter>()
        .unwrap(),
      CategoryFilter::All
    );
    assert!(
      FilterState::default()
        .is_unrestricted()
    );
  }
}
