use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// The line does not match the checklist grammar. Callers leave such
    /// lines untouched.
    #[error("Not a task line: {0}")]
    Parse(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error while trying to {operation} '{}': {source}", path.display())]
    Storage {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Metadata error")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Document already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error(transparent)]
    GroupApply(Box<GroupApplyError>),
}

impl CoreError {
    pub fn storage(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::Storage {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// A group operation stopped partway through. `applied` members were
/// already written when `source` occurred.
#[derive(Error, Debug)]
#[error("Group update stopped after {applied} of {total} members: {source}")]
pub struct GroupApplyError {
    pub applied: usize,
    pub total: usize,
    #[source]
    pub source: CoreError,
}

impl From<GroupApplyError> for CoreError {
    fn from(err: GroupApplyError) -> Self {
        CoreError::GroupApply(Box::new(err))
    }
}
