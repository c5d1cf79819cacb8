//! Queue item types and status lifecycle.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of work a queue item tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Generate,
    Rewrite,
    Summarize,
    Analyze,
    Custom,
}

/// Item lifecycle states.
///
/// `Queued` is the only initial state, `Completed` and `Failed` the only
/// terminal ones. No transition leads back to `Queued`; terminal items are
/// only ever removed via `clear_completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueItemStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub kind: RequestKind,
    pub status: QueueItemStatus,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set only by the terminal transition, and only on failure
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl QueueItem {
    pub fn new(kind: RequestKind, priority: i32, metadata: HashMap<String, String>) -> Self {
        Self {
            id: generate_item_id(),
            kind,
            status: QueueItemStatus::Queued,
            priority,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            metadata,
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self.status, QueueItemStatus::Queued)
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.status, QueueItemStatus::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            QueueItemStatus::Completed | QueueItemStatus::Failed
        )
    }

    /// `Queued -> Processing`
    pub(crate) fn start(&mut self) {
        self.status = QueueItemStatus::Processing;
        self.started_at = Some(Utc::now());
    }

    /// `Processing -> Completed | Failed`; a non-empty error means failure
    pub(crate) fn complete(&mut self, error: Option<String>) {
        match error.filter(|e| !e.is_empty()) {
            Some(e) => {
                self.status = QueueItemStatus::Failed;
                self.error = Some(e);
            }
            None => self.status = QueueItemStatus::Completed,
        }
        self.completed_at = Some(Utc::now());
    }
}

/// Short prefixed id, e.g. `req-1a2b3c`
fn generate_item_id() -> String {
    let hex = format!("{:x}", Uuid::new_v4());
    format!("req-{}", &hex[..6])
}
