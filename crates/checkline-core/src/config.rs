use serde::{Deserialize, Serialize};

use crate::status::StatusTable;

/// Property names and status vocabulary the core operates with.
/// Supplied by the caller; nothing in the core hardcodes these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub due_key: String,
    pub start_key: String,
    pub recurrence_key: String,
    pub recurrence_id_key: String,
    /// Metadata key holding a document task's status symbol.
    pub status_key: String,
    /// Metadata key holding a document task's text.
    pub title_key: String,
    /// Pre-materialized children created with a new series.
    pub child_count: usize,
    pub statuses: StatusTable,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            due_key: "due".to_string(),
            start_key: "start".to_string(),
            recurrence_key: "recurrence".to_string(),
            recurrence_id_key: "recurrence_id".to_string(),
            status_key: "status".to_string(),
            title_key: "title".to_string(),
            child_count: 5,
            statuses: StatusTable::default(),
        }
    }
}
