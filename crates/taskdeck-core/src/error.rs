use thiserror::Error;

/// Failures a store operation can report back to the presentation layer.
///
/// None of these are fatal: the operation simply did not apply, and the
/// session carries on with the in-memory collection.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task text cannot be empty")]
    EmptyText,

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("task id already exists: {0}")]
    DuplicateId(String),

    #[error("no task at view position {index} (view has {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("selector {0:?} matches more than one task")]
    AmbiguousSelector(String),

    #[error("persistence failed: {0}")]
    Persistence(String),
}

/// Non-fatal persistence problems recorded while the session continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWarning {
    LoadFailed(String),
    SaveFailed(String),
}

impl std::fmt::Display for StoreWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreWarning::LoadFailed(msg) => write!(f, "could not load saved tasks: {msg}"),
            StoreWarning::SaveFailed(msg) => write!(f, "changes were not saved: {msg}"),
        }
    }
}
