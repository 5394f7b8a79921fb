use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::model::task::{Priority, Task};
use crate::ops::task_ops::{reindex, settle_completion, IdGenerator};

/// Format version written into export files
pub const EXPORT_VERSION: &str = "1.0";

/// Error type for import operations
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("import file is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("invalid import format: expected an array of tasks")]
    NotAnArray,
    #[error("invalid task at index {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },
}

/// Export file: the whole collection plus a version stamp
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub tasks: Vec<Task>,
}

/// Result of a successful import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Records found in the payload
    pub count: usize,
    /// Records added to the collection
    pub added: usize,
    /// Records skipped because their id was already present
    pub skipped: usize,
}

/// What the caller gets back from an import: `{success, count, ...}` or
/// `{success: false, error}` when serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Success(ImportSummary),
    Failure { error: String },
}

impl ImportOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ImportOutcome::Success(_))
    }
}

impl From<Result<ImportSummary, ImportError>> for ImportOutcome {
    fn from(result: Result<ImportSummary, ImportError>) -> Self {
        match result {
            Ok(summary) => ImportOutcome::Success(summary),
            Err(e) => ImportOutcome::Failure {
                error: e.to_string(),
            },
        }
    }
}

impl Serialize for ImportOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ImportOutcome::Success(summary) => {
                let mut map = serializer.serialize_map(Some(4))?;
                map.serialize_entry("success", &true)?;
                map.serialize_entry("count", &summary.count)?;
                map.serialize_entry("added", &summary.added)?;
                map.serialize_entry("skipped", &summary.skipped)?;
                map.end()
            }
            ImportOutcome::Failure { error } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", error)?;
                map.end()
            }
        }
    }
}

/// An incoming task record; everything but `text` may be missing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskRecord {
    id: Option<String>,
    text: Option<String>,
    priority: Option<Priority>,
    category: Option<String>,
    due_date: Option<NaiveDate>,
    completed: Option<bool>,
    completed_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    order: Option<usize>,
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

pub fn export_tasks(tasks: &[Task], now: DateTime<Utc>) -> ExportEnvelope {
    ExportEnvelope {
        version: EXPORT_VERSION.to_string(),
        exported_at: now,
        tasks: tasks.to_vec(),
    }
}

/// Pretty-printed export file contents
pub fn export_json(tasks: &[Task], now: DateTime<Utc>) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&export_tasks(tasks, now))
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Merge an export envelope or a bare array of task records into `tasks`.
///
/// Records whose id is already present, or is `held` (the task waiting in
/// the pending-delete slot), are skipped, never overwritten. Every record is validated before anything is added, so a failed import
/// leaves `tasks` untouched. New tasks are appended and the whole
/// collection renumbered.
pub fn import_tasks(
    tasks: &mut Vec<Task>,
    payload: &str,
    now: DateTime<Utc>,
    ids: &mut IdGenerator,
    held: Option<&str>,
) -> Result<ImportSummary, ImportError> {
    let value: serde_json::Value = serde_json::from_str(payload)?;
    let records = match value {
        serde_json::Value::Object(mut obj) if obj.contains_key("tasks") => {
            obj.remove("tasks").unwrap_or_default()
        }
        other => other,
    };
    let serde_json::Value::Array(records) = records else {
        return Err(ImportError::NotAnArray);
    };

    let mut seen: HashSet<String> = tasks
        .iter()
        .map(|t| t.id.clone())
        .chain(held.map(str::to_string))
        .collect();
    let mut incoming = Vec::new();
    let mut skipped = 0;
    let count = records.len();

    for (index, raw) in records.into_iter().enumerate() {
        if !raw.is_object() {
            return Err(ImportError::InvalidRecord {
                index,
                reason: "expected an object".to_string(),
            });
        }
        let record: TaskRecord =
            serde_json::from_value(raw).map_err(|e| ImportError::InvalidRecord {
                index,
                reason: e.to_string(),
            })?;

        if let Some(id) = &record.id
            && seen.contains(id)
        {
            skipped += 1;
            continue;
        }

        let task = record_to_task(record, index, tasks.len() + incoming.len(), now, ids, &seen)?;
        seen.insert(task.id.clone());
        incoming.push(task);
    }

    let added = incoming.len();
    tasks.extend(incoming);
    reindex(tasks);

    Ok(ImportSummary {
        count,
        added,
        skipped,
    })
}

fn record_to_task(
    record: TaskRecord,
    index: usize,
    default_order: usize,
    now: DateTime<Utc>,
    ids: &mut IdGenerator,
    seen: &HashSet<String>,
) -> Result<Task, ImportError> {
    let text = record.text.as_deref().map(str::trim).unwrap_or("");
    if text.is_empty() {
        return Err(ImportError::InvalidRecord {
            index,
            reason: "task text is missing or empty".to_string(),
        });
    }

    let id = match record.id {
        Some(id) if !id.is_empty() => id,
        _ => ids.next_id(now, |candidate| seen.contains(candidate)),
    };
    let mut task = Task {
        id,
        text: text.to_string(),
        priority: record.priority.unwrap_or_default(),
        category: record.category.unwrap_or_default(),
        due_date: record.due_date,
        completed: record.completed.unwrap_or(false),
        completed_at: record.completed_at,
        created_at: record.created_at.unwrap_or(now),
        order: record.order.unwrap_or(default_order),
    };
    settle_completion(&mut task);
    Ok(task)
}
