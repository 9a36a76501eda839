use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument, warn};

use crate::categories::unique_categories;
use crate::datastore::TaskPersistence;
use crate::error::{StoreError, StoreWarning};
use crate::filter::{CategoryFilter, FilterState, PriorityFilter};
use crate::sort::SortMode;
use crate::stats::{TaskStats, compute_stats};
use crate::task::{Task, TaskDraft};
use crate::view::{DisplayTask, compose_view, decorate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&[Task])>;

/// Owns the canonical collection plus the transient filter and sort state.
///
/// Every mutation addresses tasks by id, saves the complete resulting
/// collection, and recomputes the derived view before notifying listeners.
/// Persistence failures never undo an in-memory change; they are logged and
/// queued as warnings for the caller to surface.
pub struct TaskStore<P: TaskPersistence> {
    persistence: P,
    tasks: Vec<Task>,
    filter: FilterState,
    sort: SortMode,
    view: Vec<Task>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
    warnings: Vec<StoreWarning>,
}

impl<P: TaskPersistence> fmt::Debug for TaskStore<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStore")
            .field("tasks", &self.tasks.len())
            .field("filter", &self.filter)
            .field("sort", &self.sort)
            .field("view", &self.view.len())
            .field("listeners", &self.listeners.len())
            .field("warnings", &self.warnings)
            .finish()
    }
}

impl<P: TaskPersistence> TaskStore<P> {
    /// Loads once from `persistence`; a failed load starts empty.
    #[instrument(skip(persistence))]
    pub fn open(persistence: P) -> Self {
        let mut warnings = Vec::new();
        let tasks = match persistence.load() {
            Ok(tasks) => sanitize_loaded(tasks),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed to load tasks; starting empty");
                warnings.push(StoreWarning::LoadFailed(format!("{err:#}")));
                Vec::new()
            }
        };
        info!(count = tasks.len(), "task store ready");

        let mut store = Self {
            persistence,
            tasks,
            filter: FilterState::default(),
            sort: SortMode::default(),
            view: Vec::new(),
            listeners: Vec::new(),
            next_subscription: 0,
            warnings,
        };
        store.recompute();
        store
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Replaces the whole collection, e.g. after an import.
    #[instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn set_tasks(&mut self, tasks: Vec<Task>) -> Result<(), StoreError> {
        let mut seen = HashSet::new();
        for task in &tasks {
            if !seen.insert(task.id.as_str()) {
                return Err(StoreError::DuplicateId(task.id.clone()));
            }
            if task.text.trim().is_empty() {
                return Err(StoreError::EmptyText);
            }
        }
        self.commit(tasks);
        Ok(())
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&[Task]) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        debug!(subscription = id.0, "listener subscribed");
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        before != self.listeners.len()
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: FilterState) {
        self.filter = filter;
        self.recompute();
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.filter.search_query = query.into();
        self.recompute();
    }

    pub fn set_selected_category(&mut self, category: CategoryFilter) {
        self.filter.selected_category = category;
        self.recompute();
    }

    pub fn set_selected_priority(&mut self, priority: PriorityFilter) {
        self.filter.selected_priority = priority;
        self.recompute();
    }

    pub fn set_show_completed(&mut self, show: bool) {
        self.filter.show_completed = show;
        self.recompute();
    }

    pub fn sort_mode(&self) -> SortMode {
        self.sort
    }

    pub fn set_sort_mode(&mut self, sort: SortMode) {
        self.sort = sort;
        self.recompute();
    }

    /// The derived filtered-and-sorted view. Read-only.
    pub fn view(&self) -> &[Task] {
        &self.view
    }

    pub fn display_view(&self, now: DateTime<Utc>, tz: Tz) -> Vec<DisplayTask> {
        decorate(self.view.clone(), now, tz)
    }

    /// Stats always cover the canonical collection, not the view.
    pub fn stats(&self, now: DateTime<Utc>) -> TaskStats {
        compute_stats(&self.tasks, now)
    }

    pub fn categories(&self) -> Vec<String> {
        unique_categories(&self.tasks)
    }

    pub fn warnings(&self) -> &[StoreWarning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<StoreWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// Maps a position in the current view back to a stable id.
    pub fn id_at(&self, view_index: usize) -> Result<&str, StoreError> {
        self.view
            .get(view_index)
            .map(|task| task.id.as_str())
            .ok_or(StoreError::IndexOutOfRange {
                index: view_index,
                len: self.view.len(),
            })
    }

    /// Resolves a full id or a unique id prefix against the canonical collection.
    pub fn resolve(&self, selector: &str) -> Result<String, StoreError> {
        let selector = selector.trim();
        if let Some(task) = self.get(selector) {
            return Ok(task.id.clone());
        }
        if selector.is_empty() {
            return Err(StoreError::NotFound(selector.to_string()));
        }

        let mut hits = self
            .tasks
            .iter()
            .filter(|task| task.id.starts_with(selector));
        match (hits.next(), hits.next()) {
            (Some(task), None) => Ok(task.id.clone()),
            (Some(_), Some(_)) => Err(StoreError::AmbiguousSelector(selector.to_string())),
            (None, _) => Err(StoreError::NotFound(selector.to_string())),
        }
    }

    #[instrument(skip(self, draft, now))]
    pub fn add(&mut self, draft: TaskDraft, now: DateTime<Utc>) -> Result<Task, StoreError> {
        let task = Task::from_draft(draft, now)?;
        if self.get(&task.id).is_some() {
            return Err(StoreError::DuplicateId(task.id));
        }
        info!(id = %task.id, "adding task");

        let mut next = self.tasks.clone();
        next.push(task.clone());
        self.commit(next);
        Ok(task)
    }

    #[instrument(skip(self, draft, now))]
    pub fn edit(
        &mut self,
        id: &str,
        draft: TaskDraft,
        now: DateTime<Utc>,
    ) -> Result<Task, StoreError> {
        let mut next = self.tasks.clone();
        let task = find_mut(&mut next, id)?;
        task.apply_draft(draft, now)?;
        let updated = task.clone();
        info!(id = %id, "edited task");

        self.commit(next);
        Ok(updated)
    }

    #[instrument(skip(self, now))]
    pub fn toggle(&mut self, id: &str, now: DateTime<Utc>) -> Result<Task, StoreError> {
        let mut next = self.tasks.clone();
        let task = find_mut(&mut next, id)?;
        task.toggle(now);
        let updated = task.clone();
        info!(id = %id, done = updated.done, "toggled task");

        self.commit(next);
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub fn delete(&mut self, id: &str) -> Result<Task, StoreError> {
        let idx = self
            .tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut next = self.tasks.clone();
        let removed = next.remove(idx);
        info!(id = %id, "deleted task");

        self.commit(next);
        Ok(removed)
    }

    /// Toggles whatever sits at `view_index` in the current view.
    pub fn toggle_at(&mut self, view_index: usize, now: DateTime<Utc>) -> Result<Task, StoreError> {
        let id = self.id_at(view_index)?.to_string();
        self.toggle(&id, now)
    }

    pub fn edit_at(
        &mut self,
        view_index: usize,
        draft: TaskDraft,
        now: DateTime<Utc>,
    ) -> Result<Task, StoreError> {
        let id = self.id_at(view_index)?.to_string();
        self.edit(&id, draft, now)
    }

    pub fn delete_at(&mut self, view_index: usize) -> Result<Task, StoreError> {
        let id = self.id_at(view_index)?.to_string();
        self.delete(&id)
    }

    /// Drops every completed task; returns how many went.
    #[instrument(skip(self))]
    pub fn clear_completed(&mut self) -> usize {
        let next: Vec<Task> = self.tasks.iter().filter(|t| !t.done).cloned().collect();
        let removed = self.tasks.len() - next.len();
        if removed == 0 {
            return 0;
        }
        info!(removed, "cleared completed tasks");
        self.commit(next);
        removed
    }

    /// Explicit save of the current collection, reporting failure directly.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.persistence
            .save(&self.tasks)
            .map_err(|err| StoreError::Persistence(format!("{err:#}")))
    }

    fn commit(&mut self, next: Vec<Task>) {
        self.tasks = next;
        if let Err(err) = self.persistence.save(&self.tasks) {
            let msg = format!("{err:#}");
            warn!(error = %msg, "failed to save tasks; keeping in-memory state");
            self.warnings.push(StoreWarning::SaveFailed(msg));
        }
        self.recompute();
    }

    fn recompute(&mut self) {
        self.view = compose_view(&self.tasks, &self.filter, self.sort);
        for (_, listener) in &mut self.listeners {
            listener(&self.view);
        }
    }
}

fn find_mut<'a>(tasks: &'a mut [Task], id: &str) -> Result<&'a mut Task, StoreError> {
    tasks
        .iter_mut()
        .find(|task| task.id == id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
}

/// Drops stored records that could never have been created here: blank text
/// or a repeated id (the first copy wins).
fn sanitize_loaded(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(tasks.len());
    for task in tasks {
        if task.text.trim().is_empty() {
            warn!(id = %task.id, "dropped stored task with blank text");
            continue;
        }
        if !seen.insert(task.id.clone()) {
            warn!(id = %task.id, "dropped stored task with duplicate id");
            continue;
        }
        kept.push(task);
    }
    kept
}
