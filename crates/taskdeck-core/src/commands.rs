use anyhow::Context;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument, warn};

use crate::categories::SUGGESTED_CATEGORIES;
use crate::cli::{AddArgs, Command, EditArgs, ListArgs};
use crate::config::Config;
use crate::datastore::TaskPersistence;
use crate::datetime::parse_due_input;
use crate::filter::{CategoryFilter, FilterState, PriorityFilter};
use crate::render::Renderer;
use crate::sort::SortMode;
use crate::store::TaskStore;
use crate::task::{Priority, TaskDraft};

#[instrument(skip(store, cfg, renderer, command))]
pub fn dispatch<P: TaskPersistence>(
    store: &mut TaskStore<P>,
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let tz = cfg.timezone();
    debug!(?command, "dispatching command");

    let result = match command {
        Command::Add(args) => cmd_add(store, renderer, args, now, tz),
        Command::Edit(args) => cmd_edit(store, renderer, args, now, tz),
        Command::Toggle { selector } => cmd_toggle(store, &selector, now),
        Command::Delete { selector } => cmd_delete(store, &selector),
        Command::ClearCompleted => {
            let removed = store.clear_completed();
            println!("Removed {removed} completed task(s).");
            Ok(())
        }
        Command::List(args) => cmd_list(store, cfg, renderer, args, now, tz),
        Command::Stats => renderer.print_stats(&store.stats(now)),
        Command::Categories => {
            renderer.print_categories(&store.categories(), &SUGGESTED_CATEGORIES)
        }
    };

    // Persistence problems never fail the command; surface them instead.
    for warning in store.take_warnings() {
        warn!(%warning, "store warning");
        eprintln!("warning: {warning}");
    }

    result
}

/// The command-line defaults a bare `list` starts from.
pub fn default_filter(cfg: &Config) -> FilterState {
    FilterState {
        show_completed: cfg.show_completed(),
        ..FilterState::default()
    }
}

#[instrument(skip(store, renderer, args, now, tz))]
fn cmd_add<P: TaskPersistence>(
    store: &mut TaskStore<P>,
    renderer: &Renderer,
    args: AddArgs,
    now: DateTime<Utc>,
    tz: Tz,
) -> anyhow::Result<()> {
    info!("command add");

    let draft = TaskDraft {
        text: args.text.join(" "),
        description: args.description,
        category: args.category,
        priority: parse_priority_arg(args.priority.as_deref())?,
        due_date: args
            .due
            .as_deref()
            .map(|raw| parse_due_input(raw, now, tz))
            .transpose()?,
    };

    let task = store.add(draft, now)?;
    println!("Created task {}.", task.id);
    renderer.print_task_info(&task)
}

#[instrument(skip(store, renderer, args, now, tz))]
fn cmd_edit<P: TaskPersistence>(
    store: &mut TaskStore<P>,
    renderer: &Renderer,
    args: EditArgs,
    now: DateTime<Utc>,
    tz: Tz,
) -> anyhow::Result<()> {
    info!("command edit");

    let id = store.resolve(&args.selector)?;
    let current = store
        .get(&id)
        .with_context(|| format!("task vanished while editing: {id}"))?;

    // Unspecified flags keep the current value.
    let mut draft = TaskDraft::from_task(current);
    if let Some(text) = args.text {
        draft.text = text;
    }
    if let Some(description) = args.description {
        draft.description = Some(description);
    }
    if let Some(category) = args.category {
        draft.category = Some(category);
    }
    if let Some(priority) = parse_priority_arg(args.priority.as_deref())? {
        draft.priority = Some(priority);
    }
    if args.clear_due {
        draft.due_date = None;
    } else if let Some(raw) = args.due.as_deref() {
        draft.due_date = Some(parse_due_input(raw, now, tz)?);
    }

    let task = store.edit(&id, draft, now)?;
    println!("Updated task {}.", task.id);
    renderer.print_task_info(&task)
}

#[instrument(skip(store, now))]
fn cmd_toggle<P: TaskPersistence>(
    store: &mut TaskStore<P>,
    selector: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let id = store.resolve(selector)?;
    let task = store.toggle(&id, now)?;
    let state = if task.done { "done" } else { "pending" };
    println!("Marked '{}' as {state}.", task.text);
    Ok(())
}

#[instrument(skip(store))]
fn cmd_delete<P: TaskPersistence>(store: &mut TaskStore<P>, selector: &str) -> anyhow::Result<()> {
    let id = store.resolve(selector)?;
    let task = store.delete(&id)?;
    println!("Deleted '{}'.", task.text);
    Ok(())
}

#[instrument(skip(store, cfg, renderer, args, now, tz))]
fn cmd_list<P: TaskPersistence>(
    store: &mut TaskStore<P>,
    cfg: &Config,
    renderer: &Renderer,
    args: ListArgs,
    now: DateTime<Utc>,
    tz: Tz,
) -> anyhow::Result<()> {
    let filter = build_filter(cfg, &args)?;
    let sort = args
        .sort
        .as_deref()
        .map(SortMode::parse_lenient)
        .unwrap_or_else(|| cfg.default_sort());
    debug!(?filter, %sort, "list filter");

    store.set_filter(filter);
    store.set_sort_mode(sort);
    renderer.print_task_table(&store.display_view(now, tz))
}

fn build_filter(cfg: &Config, args: &ListArgs) -> anyhow::Result<FilterState> {
    let mut filter = default_filter(cfg);
    if let Some(search) = &args.search {
        filter.search_query = search.clone();
    }
    if let Some(category) = &args.category {
        filter.selected_category = CategoryFilter::from(category.clone());
    }
    if let Some(priority) = &args.priority {
        filter.selected_priority = priority.parse::<PriorityFilter>()?;
    }
    if args.hide_completed {
        filter.show_completed = false;
    }
    Ok(filter)
}

fn parse_priority_arg(raw: Option<&str>) -> anyhow::Result<Option<Priority>> {
    raw.map(str::parse::<Priority>).transpose()
}
