use crate::io::kv::{KeyValueStore, KvError};
use crate::io::recovery::{log_recovery, RecoveryCategory, RecoveryEntry};
use crate::model::task::Task;
use crate::ops::undo::PendingDelete;

/// Error type for task persistence. Never escapes `TaskStore`: failures
/// are logged and absorbed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error("stored data is not valid: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Persists the task collection (and the pending-delete token) in a
/// key-value store. Loads degrade to "start empty", saves are best effort.
#[derive(Debug)]
pub struct TaskStore<K> {
    kv: K,
    key: String,
}

impl<K: KeyValueStore> TaskStore<K> {
    pub fn new(kv: K, key: impl Into<String>) -> Self {
        TaskStore {
            kv,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kv(&self) -> &K {
        &self.kv
    }

    fn pending_key(&self) -> String {
        format!("{}.pending", self.key)
    }

    // -----------------------------------------------------------------------
    // Collection
    // -----------------------------------------------------------------------

    /// Load the collection. Missing or unreadable data yields an empty list.
    pub fn load(&self) -> Vec<Task> {
        match self.kv.get(&self.key) {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(tasks) => tasks,
                Err(e) => {
                    self.report(
                        RecoveryEntry::new(RecoveryCategory::Parser, "stored tasks unreadable")
                            .field("Key", &self.key)
                            .field("Error", e.to_string())
                            .body(String::from_utf8_lossy(&bytes)),
                    );
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                self.report(
                    RecoveryEntry::new(RecoveryCategory::Parser, "task load failed")
                        .field("Key", &self.key)
                        .field("Error", e.to_string()),
                );
                Vec::new()
            }
        }
    }

    /// Save the collection. Failures are logged, never returned.
    pub fn save(&mut self, tasks: &[Task]) {
        if let Err(e) = self.try_save(tasks) {
            let body = serde_json::to_string_pretty(tasks).unwrap_or_default();
            self.report(
                RecoveryEntry::new(RecoveryCategory::Write, "task save failed")
                    .field("Key", &self.key)
                    .field("Error", e.to_string())
                    .body(body),
            );
        }
    }

    fn try_save(&mut self, tasks: &[Task]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(tasks)?;
        self.kv.set(&self.key, &bytes)?;
        Ok(())
    }

    /// Record stored tasks dropped on load because their id repeated an
    /// earlier record.
    pub fn log_dropped(&self, ids: &[String]) {
        self.report(
            RecoveryEntry::new(RecoveryCategory::Parser, "duplicate stored tasks dropped")
                .field("Key", &self.key)
                .field("Ids", ids.join(", ")),
        );
    }

    // -----------------------------------------------------------------------
    // Pending delete
    // -----------------------------------------------------------------------

    pub fn load_pending(&self) -> Option<PendingDelete> {
        let key = self.pending_key();
        let bytes = self.kv.get(&key).ok()??;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn save_pending(&mut self, pending: Option<&PendingDelete>) {
        let key = self.pending_key();
        let result: Result<(), StoreError> = match pending {
            Some(p) => serde_json::to_vec(p)
                .map_err(StoreError::from)
                .and_then(|bytes| self.kv.set(&key, &bytes).map_err(StoreError::from)),
            None => self.kv.remove(&key).map_err(StoreError::from),
        };
        if let Err(e) = result {
            self.report(
                RecoveryEntry::new(RecoveryCategory::Write, "pending delete save failed")
                    .field("Key", key)
                    .field("Error", e.to_string()),
            );
        }
    }

    /// Record a deletion that can no longer be undone.
    pub fn log_finalized(&self, pending: &PendingDelete) {
        self.report(
            RecoveryEntry::new(
                RecoveryCategory::Delete,
                format!("task {} deleted", pending.task.id),
            )
            .field("Task", &pending.task.id)
            .field("Text", &pending.task.text)
            .body(serde_json::to_string_pretty(&pending.task).unwrap_or_default()),
        );
    }

    fn report(&self, entry: RecoveryEntry) {
        match self.kv.log_dir() {
            Some(dir) => log_recovery(dir, entry),
            None => eprintln!("warning: {}: {}", entry.category, entry.description),
        }
    }
}
