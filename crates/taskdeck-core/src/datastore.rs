use std::cell::{Cell, RefCell};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::task::Task;

/// The single collection key every task snapshot is stored under.
pub const TASKS_KEY: &str = "tasks";

/// Opaque blob store for the whole collection. `save` always receives the
/// complete snapshot, never a delta.
pub trait TaskPersistence {
    fn load(&self) -> anyhow::Result<Vec<Task>>;
    fn save(&self, tasks: &[Task]) -> anyhow::Result<()>;
}

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join(format!("{TASKS_KEY}.data"));

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            tasks_path,
        })
    }
}

impl TaskPersistence for DataStore {
    #[tracing::instrument(skip(self))]
    fn load(&self) -> anyhow::Result<Vec<Task>> {
        if !self.tasks_path.exists() {
            debug!(file = %self.tasks_path.display(), "no saved tasks yet");
            return Ok(Vec::new());
        }
        load_jsonl(&self.tasks_path).context("failed to load tasks.data")
    }

    #[tracing::instrument(skip(self, tasks))]
    fn save(&self, tasks: &[Task]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.tasks_path, tasks).context("failed to save tasks.data")
    }
}

/// In-process store, handy for embedding and tests. Failures can be switched
/// on to exercise the degraded paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tasks: RefCell<Vec<Task>>,
    fail_load: Cell<bool>,
    fail_save: Cell<bool>,
    saves: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: RefCell::new(tasks),
            ..Self::default()
        }
    }

    pub fn set_fail_load(&self, fail: bool) {
        self.fail_load.set(fail);
    }

    pub fn set_fail_save(&self, fail: bool) {
        self.fail_save.set(fail);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.get()
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.borrow().clone()
    }
}

impl TaskPersistence for MemoryStore {
    fn load(&self) -> anyhow::Result<Vec<Task>> {
        if self.fail_load.get() {
            return Err(anyhow!("memory store: load disabled"));
        }
        Ok(self.tasks.borrow().clone())
    }

    fn save(&self, tasks: &[Task]) -> anyhow::Result<()> {
        if self.fail_save.get() {
            return Err(anyhow!("memory store: save disabled"));
        }
        *self.tasks.borrow_mut() = tasks.to_vec();
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

impl<P: TaskPersistence + ?Sized> TaskPersistence for &P {
    fn load(&self) -> anyhow::Result<Vec<Task>> {
        (**self).load()
    }

    fn save(&self, tasks: &[Task]) -> anyhow::Result<()> {
        (**self).save(tasks)
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Task>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let task: Task = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(task);
    }

    debug!(count = out.len(), "loaded tasks from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, tasks))]
fn save_jsonl_atomic(path: &Path, tasks: &[Task]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = tasks.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for task in tasks {
        let serialized = serde_json::to_string(task)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
