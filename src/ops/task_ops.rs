use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::model::task::{Priority, Task, TaskDraft, TaskPatch};

/// Error type for task operations
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("task text cannot be empty")]
    EmptyText,
    #[error("task not found: {0}")]
    NotFound(String),
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Renumber `order` to match list position (0..n).
pub fn reindex(tasks: &mut [Task]) {
    for (i, task) in tasks.iter_mut().enumerate() {
        task.order = i;
    }
}

/// True when `order` values are exactly 0..n in list position.
pub fn is_contiguous(tasks: &[Task]) -> bool {
    tasks.iter().enumerate().all(|(i, t)| t.order == i)
}

/// Make `completed_at` agree with `completed`. An undated completion is
/// taken to have happened at creation.
pub fn settle_completion(task: &mut Task) {
    if task.completed {
        let created = task.created_at;
        task.completed_at.get_or_insert(created);
    } else {
        task.completed_at = None;
    }
}

/// Repair a collection read back from storage: later records repeating an
/// id are dropped, completion stamps settled and `order` renumbered.
/// Returns the ids of the dropped records.
pub fn repair_loaded(tasks: &mut Vec<Task>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut dropped = Vec::new();
    tasks.retain(|t| {
        if seen.insert(t.id.clone()) {
            true
        } else {
            dropped.push(t.id.clone());
            false
        }
    });
    tasks.iter_mut().for_each(settle_completion);
    if !is_contiguous(tasks) {
        reindex(tasks);
    }
    dropped
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

pub fn position_of(tasks: &[Task], id: &str) -> Option<usize> {
    tasks.iter().position(|t| t.id == id)
}

pub fn find_task<'a>(tasks: &'a [Task], id: &str) -> Option<&'a Task> {
    tasks.iter().find(|t| t.id == id)
}

pub fn find_task_mut<'a>(tasks: &'a mut [Task], id: &str) -> Option<&'a mut Task> {
    tasks.iter_mut().find(|t| t.id == id)
}

// ---------------------------------------------------------------------------
// Id generation
// ---------------------------------------------------------------------------

/// Time-based id source. Ids are the creation millisecond in base 36
/// followed by a per-millisecond sequence, so ids minted by one generator
/// sort in creation order.
#[derive(Debug, Default, Clone)]
pub struct IdGenerator {
    last_millis: i64,
    seq: u32,
}

impl IdGenerator {
    /// Mint an id not rejected by `taken`.
    pub fn next_id(&mut self, now: DateTime<Utc>, taken: impl Fn(&str) -> bool) -> String {
        let millis = now.timestamp_millis().max(self.last_millis);
        if millis == self.last_millis {
            self.seq += 1;
        } else {
            self.last_millis = millis;
            self.seq = 0;
        }
        loop {
            let id = format!("{}{}", to_base36(millis as u64), to_base36_padded(self.seq as u64, 3));
            if !taken(&id) {
                return id;
            }
            self.seq += 1;
        }
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn to_base36_padded(n: u64, width: usize) -> String {
    format!("{:0>width$}", to_base36(n), width = width)
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Build a new task from a draft. Text is trimmed and must not be empty.
pub fn new_task(
    draft: TaskDraft,
    id: String,
    now: DateTime<Utc>,
    order: usize,
) -> Result<Task, TaskError> {
    let text = draft.text.trim();
    if text.is_empty() {
        return Err(TaskError::EmptyText);
    }
    Ok(Task {
        id,
        text: text.to_string(),
        priority: draft.priority.unwrap_or(Priority::Medium),
        category: draft.category.map(|c| c.trim().to_string()).unwrap_or_default(),
        due_date: draft.due_date,
        completed: false,
        completed_at: None,
        created_at: now,
        order,
    })
}

/// Insert at the front and renumber.
pub fn insert_front(tasks: &mut Vec<Task>, task: Task) {
    tasks.insert(0, task);
    reindex(tasks);
}

/// Merge `patch` into the task with `id`.
/// Returns `Ok(None)` when no such task exists.
pub fn update_task<'a>(
    tasks: &'a mut [Task],
    id: &str,
    patch: TaskPatch,
) -> Result<Option<&'a Task>, TaskError> {
    let text = match patch.text {
        Some(t) => {
            let trimmed = t.trim();
            if trimmed.is_empty() {
                return Err(TaskError::EmptyText);
            }
            Some(trimmed.to_string())
        }
        None => None,
    };

    let Some(task) = find_task_mut(tasks, id) else {
        return Ok(None);
    };
    if let Some(text) = text {
        task.text = text;
    }
    if let Some(priority) = patch.priority {
        task.priority = priority;
    }
    if let Some(category) = patch.category {
        task.category = category.trim().to_string();
    }
    if let Some(due) = patch.due_date {
        task.due_date = due;
    }
    Ok(Some(task))
}

/// Flip completion, stamping or clearing `completed_at`.
pub fn toggle_completion<'a>(
    tasks: &'a mut [Task],
    id: &str,
    now: DateTime<Utc>,
) -> Option<&'a Task> {
    let task = find_task_mut(tasks, id)?;
    let completed = !task.completed;
    task.set_completed(completed, now);
    Some(task)
}

/// Remove the task with `id` and renumber the rest.
pub fn remove_task(tasks: &mut Vec<Task>, id: &str) -> Option<Task> {
    let idx = position_of(tasks, id)?;
    let task = tasks.remove(idx);
    reindex(tasks);
    Some(task)
}

/// Move `dragged_id` to the position `target_id` occupies once the dragged
/// task has been taken out, then renumber. Returns false (and changes
/// nothing) when either id is missing or both are the same.
pub fn reorder(tasks: &mut Vec<Task>, dragged_id: &str, target_id: &str) -> bool {
    if dragged_id == target_id {
        return false;
    }
    let Some(from) = position_of(tasks, dragged_id) else {
        return false;
    };
    if position_of(tasks, target_id).is_none() {
        return false;
    }

    let task = tasks.remove(from);
    // Target is still present: only the dragged task was removed
    let to = position_of(tasks, target_id).unwrap_or(tasks.len());
    tasks.insert(to, task);
    reindex(tasks);
    true
}

/// Drop every completed task. Returns how many were removed.
pub fn clear_completed(tasks: &mut Vec<Task>) -> usize {
    let before = tasks.len();
    tasks.retain(|t| !t.completed);
    reindex(tasks);
    before - tasks.len()
}
