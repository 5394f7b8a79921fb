//! The task collection engine.
//!
//! `TaskEngine` owns the authoritative task list, the view settings and the
//! pending-delete slot. Every mutation runs to completion, renumbers
//! `order` where the list structure changed and persists through the
//! store before returning. Lookups by an unknown id are soft failures
//! (`None`/`false`) and leave state unchanged.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use indexmap::IndexMap;

use crate::io::kv::KeyValueStore;
use crate::io::task_store::TaskStore;
use crate::model::task::{Priority, Task, TaskDraft, TaskPatch};
use crate::model::view::{SortKey, StatusFilter, ViewSettings};
use crate::ops::analytics::{self, DayCount, DueSummary, Insight, Stats, Tally};
use crate::ops::import::{self, ExportEnvelope, ImportOutcome};
use crate::ops::task_ops::{self, IdGenerator, TaskError};
use crate::ops::undo::{PendingDelete, PendingDeleteSlot};
use crate::ops::view;

/// Source of the current time
pub type Clock = Box<dyn Fn() -> DateTime<Utc> + Send>;

/// Engine shared between threads; every operation goes through the one
/// mutex so reindexing and persistence are seen atomically.
pub type SharedEngine<K> = Arc<Mutex<TaskEngine<K>>>;

/// Default lifetime of a pending delete
pub const DEFAULT_UNDO_WINDOW_SECS: i64 = 5;

pub struct TaskEngine<K: KeyValueStore> {
    tasks: Vec<Task>,
    view: ViewSettings,
    pending: PendingDeleteSlot,
    undo_window: Duration,
    ids: IdGenerator,
    store: TaskStore<K>,
    clock: Clock,
}

impl<K: KeyValueStore> TaskEngine<K> {
    /// Rebuild the engine from whatever the store holds, using the system
    /// clock.
    pub fn new(store: TaskStore<K>) -> Self {
        Self::with_clock(store, Box::new(Utc::now))
    }

    pub fn with_clock(mut store: TaskStore<K>, clock: Clock) -> Self {
        let mut tasks = store.load();
        let dropped = task_ops::repair_loaded(&mut tasks);
        if !dropped.is_empty() {
            store.log_dropped(&dropped);
        }
        let mut pending = PendingDeleteSlot::default();
        if let Some(token) = store.load_pending() {
            let now = clock();
            if token.is_live(now) {
                pending.restore(token, now);
            } else {
                // expired while no engine was running
                store.log_finalized(&token);
                store.save_pending(None);
            }
        }
        TaskEngine {
            tasks,
            view: ViewSettings::default(),
            pending,
            undo_window: Duration::seconds(DEFAULT_UNDO_WINDOW_SECS),
            ids: IdGenerator::default(),
            store,
            clock,
        }
    }

    pub fn with_undo_window(mut self, window: Duration) -> Self {
        self.undo_window = window;
        self
    }

    pub fn with_view(mut self, settings: ViewSettings) -> Self {
        self.view = settings;
        self
    }

    /// Wrap for use from several threads.
    pub fn into_shared(self) -> SharedEngine<K>
    where
        K: Send,
    {
        Arc::new(Mutex::new(self))
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Current UTC calendar day
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    fn persist(&mut self) {
        self.store.save(&self.tasks);
    }

    fn persist_pending(&mut self) {
        let live = self.pending.peek().cloned();
        self.store.save_pending(live.as_ref());
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    /// The whole collection in list order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn find(&self, id: &str) -> Option<&Task> {
        task_ops::find_task(&self.tasks, id)
    }

    /// Like `find`, but an unknown id is an error.
    pub fn require(&self, id: &str) -> Result<&Task, TaskError> {
        self.find(id).ok_or_else(|| TaskError::NotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn store(&self) -> &TaskStore<K> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Create a task at the front of the list.
    pub fn add(&mut self, draft: TaskDraft) -> Result<Task, TaskError> {
        let now = self.now();
        let tasks = &self.tasks;
        let held = self.pending.peek().map(|p| p.task.id.as_str());
        let id = self.ids.next_id(now, |candidate| {
            held == Some(candidate) || task_ops::find_task(tasks, candidate).is_some()
        });
        let task = task_ops::new_task(draft, id, now, self.tasks.len())?;
        task_ops::insert_front(&mut self.tasks, task);
        self.persist();
        Ok(self.tasks[0].clone())
    }

    /// Merge `patch` into a task. `Ok(None)` when the id is unknown.
    pub fn update(&mut self, id: &str, patch: TaskPatch) -> Result<Option<Task>, TaskError> {
        let updated = task_ops::update_task(&mut self.tasks, id, patch)?.cloned();
        if updated.is_some() {
            self.persist();
        }
        Ok(updated)
    }

    pub fn toggle_completion(&mut self, id: &str) -> Option<Task> {
        let now = self.now();
        let task = task_ops::toggle_completion(&mut self.tasks, id, now)?.clone();
        self.persist();
        Some(task)
    }

    /// Remove a task, keeping it undoable until the undo window closes.
    /// A task already waiting in the slot is finalized.
    pub fn delete(&mut self, id: &str) -> Option<Task> {
        let task = task_ops::remove_task(&mut self.tasks, id)?;
        let now = self.now();
        if let Some(displaced) = self.pending.hold(task.clone(), now, self.undo_window) {
            self.store.log_finalized(&displaced);
        }
        self.persist();
        self.persist_pending();
        Some(task)
    }

    /// Put the most recently deleted task back at the front, if its undo
    /// window is still open.
    pub fn undo_delete(&mut self) -> Option<Task> {
        self.expire_pending_delete();
        let pending = self.pending.clear()?;
        if self.find(&pending.task.id).is_some() {
            // the id came back some other way; restoring would duplicate it
            self.store.log_finalized(&pending);
            self.persist_pending();
            return None;
        }
        task_ops::insert_front(&mut self.tasks, pending.task);
        self.persist();
        self.persist_pending();
        Some(self.tasks[0].clone())
    }

    /// Finalize the pending delete if its deadline has passed. Hosts call
    /// this from their scheduler; it is also checked on undo.
    pub fn expire_pending_delete(&mut self) -> Option<Task> {
        let now = self.now();
        let expired = self.pending.expire(now)?;
        self.store.log_finalized(&expired);
        self.persist_pending();
        Some(expired.task)
    }

    /// The task currently recoverable by `undo_delete`, if any.
    pub fn pending_delete(&self) -> Option<&PendingDelete> {
        let now = self.now();
        self.pending.peek().filter(|p| p.is_live(now))
    }

    /// Move `dragged_id` to where `target_id` sits. False when either id is
    /// unknown or both are the same.
    pub fn reorder(&mut self, dragged_id: &str, target_id: &str) -> bool {
        if !task_ops::reorder(&mut self.tasks, dragged_id, target_id) {
            return false;
        }
        self.persist();
        true
    }

    /// Remove every completed task; returns how many went.
    pub fn clear_completed(&mut self) -> usize {
        let removed = task_ops::clear_completed(&mut self.tasks);
        self.persist();
        removed
    }

    /// Remove everything; returns the previous count. Not undoable.
    pub fn clear_all(&mut self) -> usize {
        let removed = self.tasks.len();
        self.tasks.clear();
        self.persist();
        removed
    }

    /// Merge an export file or bare task array into the collection. A record
    /// carrying the id of the task awaiting undo is skipped.
    pub fn import_tasks(&mut self, payload: &str) -> ImportOutcome {
        let now = self.now();
        let held = self.pending.peek().map(|p| p.task.id.clone());
        let result = import::import_tasks(&mut self.tasks, payload, now, &mut self.ids, held.as_deref());
        if result.is_ok() {
            self.persist();
        }
        result.into()
    }

    pub fn export(&self) -> ExportEnvelope {
        import::export_tasks(&self.tasks, self.now())
    }

    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        import::export_json(&self.tasks, self.now())
    }

    // -----------------------------------------------------------------------
    // View settings
    // -----------------------------------------------------------------------

    pub fn view_settings(&self) -> &ViewSettings {
        &self.view
    }

    pub fn set_view_settings(&mut self, settings: ViewSettings) {
        self.view = settings;
    }

    pub fn set_filter(&mut self, filter: StatusFilter) {
        self.view.filter = filter;
    }

    pub fn set_sort_key(&mut self, key: SortKey) {
        self.view.sort_key = key;
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.view.search_query = query.into();
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Filtered, searched and sorted view under the current settings.
    pub fn query_view(&self) -> Vec<&Task> {
        view::query_view(&self.tasks, &self.view)
    }

    pub fn stats(&self) -> Stats {
        analytics::stats(&self.tasks)
    }

    pub fn category_breakdown(&self) -> IndexMap<String, Tally> {
        analytics::category_breakdown(&self.tasks)
    }

    pub fn priority_breakdown(&self) -> Vec<(Priority, Tally)> {
        analytics::priority_breakdown(&self.tasks)
    }

    pub fn calculate_streak(&self) -> u32 {
        analytics::calculate_streak(&self.tasks, self.today())
    }

    pub fn due_summary(&self) -> DueSummary {
        analytics::due_summary(&self.tasks, self.today())
    }

    pub fn completion_history(&self, days: u32) -> Vec<DayCount> {
        analytics::completion_history(&self.tasks, self.today(), days)
    }

    pub fn insights(&self) -> Vec<Insight> {
        analytics::insights(&self.stats(), self.calculate_streak(), &self.due_summary())
    }
}
