//! End-to-end behavior of `TaskEngine` through its public API, on an
//! in-memory store with a clock the tests control.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;

use taskdeck::io::kv::{FileKv, KeyValueStore, MemoryKv};
use taskdeck::io::task_store::TaskStore;
use taskdeck::model::task::{Priority, TaskDraft, TaskPatch};
use taskdeck::model::view::{SortKey, StatusFilter};
use taskdeck::ops::analytics::Stats;
use taskdeck::{Clock, TaskEngine};

struct Harness {
    engine: TaskEngine<MemoryKv>,
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl Harness {
    fn new() -> Self {
        Self::with_kv(MemoryKv::new())
    }

    fn with_kv(kv: MemoryKv) -> Self {
        let now = Arc::new(Mutex::new(Utc.with_ymd_and_hms(2025, 5, 10, 9, 30, 0).unwrap()));
        let handle = Arc::clone(&now);
        let clock: Clock = Box::new(move || *handle.lock().unwrap());
        Harness {
            engine: TaskEngine::with_clock(TaskStore::new(kv, "tasks"), clock),
            now,
        }
    }

    fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }

    fn add(&mut self, text: &str) -> String {
        let id = self.engine.add(TaskDraft::new(text)).unwrap().id;
        // distinct createdAt for every task
        self.advance(Duration::seconds(1));
        id
    }

    fn view_texts(&self) -> Vec<String> {
        self.engine.query_view().iter().map(|t| t.text.clone()).collect()
    }

    fn list_texts(&self) -> Vec<String> {
        self.engine.tasks().iter().map(|t| t.text.clone()).collect()
    }

    fn orders(&self) -> Vec<(String, usize)> {
        self.engine
            .tasks()
            .iter()
            .map(|t| (t.text.clone(), t.order))
            .collect()
    }
}

fn assert_invariants<K: KeyValueStore>(engine: &TaskEngine<K>) {
    let orders: BTreeSet<usize> = engine.tasks().iter().map(|t| t.order).collect();
    assert_eq!(orders, (0..engine.len()).collect::<BTreeSet<_>>());
    for (i, t) in engine.tasks().iter().enumerate() {
        assert_eq!(t.order, i, "order out of step with position for {}", t.id);
        assert_eq!(t.completed, t.completed_at.is_some(), "completedAt out of step for {}", t.id);
    }
    let ids: BTreeSet<&str> = engine.tasks().iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids.len(), engine.len());
}

fn three() -> (Harness, String, String, String) {
    let mut h = Harness::new();
    let t1 = h.add("T1");
    let t2 = h.add("T2");
    let t3 = h.add("T3");
    (h, t1, t2, t3)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn add_single_task() {
    let mut h = Harness::new();
    let task = h.engine.add(TaskDraft::new("Buy milk")).unwrap();
    assert_eq!(task.priority, Priority::Medium);
    assert_eq!(task.category, "");
    assert_eq!(task.due_date, None);
    assert_eq!(h.engine.len(), 1);
    assert_eq!(h.engine.tasks()[0].order, 0);
    assert!(!h.engine.tasks()[0].completed);
    assert_eq!(
        h.engine.stats(),
        Stats {
            total: 1,
            completed: 0,
            pending: 1,
            productivity_percent: 0,
        }
    );
}

#[test]
fn default_view_is_newest_first() {
    let (h, ..) = three();
    assert_eq!(h.engine.view_settings().sort_key, SortKey::DateAdded);
    assert_eq!(h.view_texts(), vec!["T3", "T2", "T1"]);
}

#[test]
fn delete_then_undo_restores_at_front() {
    let (mut h, _t1, t2, t3) = three();
    h.engine.delete(&t2).unwrap();
    assert_eq!(h.view_texts(), vec!["T3", "T1"]);
    assert_eq!(h.orders(), vec![("T3".into(), 0), ("T1".into(), 1)]);
    assert_invariants(&h.engine);

    let restored = h.engine.undo_delete().unwrap();
    assert_eq!(restored.id, t2);
    assert_eq!(h.list_texts(), vec!["T2", "T3", "T1"]);
    assert_invariants(&h.engine);
    assert!(h.engine.find(&t3).is_some());
}

#[test]
fn toggle_sets_and_clears_completed_at() {
    let (mut h, t1, ..) = three();
    let now = h.engine.now();
    let done = h.engine.toggle_completion(&t1).unwrap();
    assert_eq!(done.completed_at, Some(now));

    h.advance(Duration::minutes(5));
    let undone = h.engine.toggle_completion(&t1).unwrap();
    assert!(!undone.completed);
    assert_eq!(undone.completed_at, None);
    assert_invariants(&h.engine);
}

#[test]
fn streak_over_consecutive_days_then_gap() {
    let mut h = Harness::new();
    let a = h.add("yesterday");
    let b = h.add("today");
    h.engine.toggle_completion(&a).unwrap();
    h.advance(Duration::days(1));
    h.engine.toggle_completion(&b).unwrap();
    assert_eq!(h.engine.calculate_streak(), 2);

    // only a completion three days back, nothing since
    let mut h = Harness::new();
    let c = h.add("old");
    h.engine.toggle_completion(&c).unwrap();
    h.advance(Duration::days(3));
    assert_eq!(h.engine.calculate_streak(), 0);
}

#[test]
fn streak_uses_utc_day_boundaries() {
    let mut h = Harness::new();
    let a = h.add("late");
    let b = h.add("early");
    *h.now.lock().unwrap() = Utc.with_ymd_and_hms(2025, 5, 10, 23, 59, 0).unwrap();
    h.engine.toggle_completion(&a).unwrap();
    h.advance(Duration::minutes(2));
    h.engine.toggle_completion(&b).unwrap();
    assert_eq!(h.engine.calculate_streak(), 2);
}

#[test]
fn reorder_splices_and_rejects_self() {
    let (mut h, t1, _t2, t3) = three();
    assert!(h.engine.reorder(&t1, &t3));
    assert_eq!(
        h.orders(),
        vec![("T1".into(), 0), ("T3".into(), 1), ("T2".into(), 2)]
    );

    let before = h.engine.tasks().to_vec();
    assert!(!h.engine.reorder(&t1, &t1));
    assert!(!h.engine.reorder(&t1, "missing"));
    assert_eq!(h.engine.tasks(), before.as_slice());
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn invariants_hold_across_mixed_mutations() {
    let mut h = Harness::new();
    let ids: Vec<String> = (0..6).map(|i| h.add(&format!("task {}", i))).collect();
    assert_invariants(&h.engine);

    h.engine.toggle_completion(&ids[1]);
    h.engine.toggle_completion(&ids[4]);
    assert_invariants(&h.engine);
    h.engine.reorder(&ids[0], &ids[5]);
    assert_invariants(&h.engine);
    h.engine.delete(&ids[2]);
    assert_invariants(&h.engine);
    h.engine.delete(&ids[3]);
    assert_invariants(&h.engine);
    h.engine.undo_delete();
    assert_invariants(&h.engine);
    assert_eq!(h.engine.clear_completed(), 2);
    assert_invariants(&h.engine);
    h.engine
        .update(&ids[0], TaskPatch {
            text: Some("renamed".into()),
            ..TaskPatch::default()
        })
        .unwrap();
    assert_invariants(&h.engine);
    assert_eq!(h.engine.len(), 3);
}

#[test]
fn query_view_is_idempotent() {
    let (mut h, t1, ..) = three();
    h.engine.toggle_completion(&t1);
    h.engine.set_sort_key(SortKey::Priority);
    h.engine.set_filter(StatusFilter::All);
    let first: Vec<String> = h.engine.query_view().iter().map(|t| t.id.clone()).collect();
    let second: Vec<String> = h.engine.query_view().iter().map(|t| t.id.clone()).collect();
    assert_eq!(first, second);
}

#[test]
fn export_then_import_into_fresh_engine() {
    let (mut h, t1, t2, _) = three();
    h.engine.toggle_completion(&t1);
    h.engine
        .update(&t2, TaskPatch {
            priority: Some(Priority::High),
            category: Some("health".into()),
            due_date: Some(chrono::NaiveDate::from_ymd_opt(2025, 6, 1)),
            ..TaskPatch::default()
        })
        .unwrap();
    let payload = h.engine.export_json().unwrap();

    let mut fresh = Harness::new();
    let outcome = fresh.engine.import_tasks(&payload);
    assert!(outcome.is_success());
    assert_eq!(fresh.engine.tasks(), h.engine.tasks());
    assert_invariants(&fresh.engine);
}

#[test]
fn import_bare_array_and_skip_duplicates() {
    let (mut h, t1, ..) = three();
    let payload = format!(
        r#"[{{"id": "{}", "text": "dup"}}, {{"text": "  fresh  ", "priority": "low"}}]"#,
        t1
    );
    let json = serde_json::to_value(h.engine.import_tasks(&payload)).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["count"], 2);
    assert_eq!(json["added"], 1);
    assert_eq!(json["skipped"], 1);
    assert_eq!(h.list_texts(), vec!["T3", "T2", "T1", "fresh"]);
    assert_eq!(h.engine.find(&t1).unwrap().text, "T1");
    assert_invariants(&h.engine);
}

#[test]
fn import_failure_is_reported_and_harmless() {
    let (mut h, ..) = three();
    let before = h.engine.tasks().to_vec();
    for payload in [
        "not json",
        r#"{"tasks": {"a": 1}}"#,
        r#"[{"text": "ok"}, {"text": ""}]"#,
        r#"[{"text": "ok", "priority": "urgent"}]"#,
    ] {
        let json = serde_json::to_value(h.engine.import_tasks(payload)).unwrap();
        assert_eq!(json["success"], false, "{} should fail", payload);
        assert!(json["error"].as_str().is_some_and(|e| !e.is_empty()));
        assert_eq!(h.engine.tasks(), before.as_slice());
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn restart_rebuilds_from_store() {
    let tmp = tempfile::TempDir::new().unwrap();
    let ids = {
        let mut engine = TaskEngine::new(TaskStore::new(FileKv::open(tmp.path()).unwrap(), "tasks"));
        let a = engine.add(TaskDraft::new("a")).unwrap().id;
        let b = engine.add(TaskDraft::new("b").priority(Priority::High)).unwrap().id;
        engine.toggle_completion(&a);
        vec![b, a]
    };

    let engine = TaskEngine::new(TaskStore::new(FileKv::open(tmp.path()).unwrap(), "tasks"));
    let loaded: Vec<String> = engine.tasks().iter().map(|t| t.id.clone()).collect();
    assert_eq!(loaded, ids);
    assert!(engine.tasks()[1].completed);
    assert_invariants(&engine);
}

#[test]
fn storage_failure_keeps_memory_state() {
    let mut h = Harness::with_kv(MemoryKv::with_quota(64));
    let a = h.add("this task will not fit in the store");
    h.add("neither will this one");
    assert_eq!(h.engine.len(), 2);
    assert!(h.engine.store().load().is_empty());

    h.engine.delete(&a).unwrap();
    assert!(h.engine.undo_delete().is_some());
    assert_eq!(h.engine.len(), 2);
    assert_invariants(&h.engine);
}

#[test]
fn non_contiguous_store_is_renumbered_on_load() {
    let mut kv = MemoryKv::new();
    let raw = r#"[
        {"id":"a","text":"a","priority":"low","category":"","dueDate":null,"completed":false,"completedAt":null,"createdAt":"2025-05-01T00:00:00Z","order":4},
        {"id":"b","text":"b","priority":"high","category":"work","dueDate":"2025-05-03","completed":true,"completedAt":"2025-05-02T10:00:00Z","createdAt":"2025-05-01T00:00:00Z","order":9}
    ]"#;
    kv.set("tasks", raw.as_bytes()).unwrap();
    let h = Harness::with_kv(kv);
    assert_eq!(h.orders(), vec![("a".into(), 0), ("b".into(), 1)]);
}

#[test]
fn stored_completion_stamps_and_repeated_ids_are_repaired_on_load() {
    let mut kv = MemoryKv::new();
    let raw = r#"[
        {"id":"a","text":"done, undated","priority":"low","category":"","dueDate":null,"completed":true,"completedAt":null,"createdAt":"2025-05-09T08:00:00Z","order":0},
        {"id":"b","text":"pending, stamped","priority":"low","category":"","dueDate":null,"completed":false,"completedAt":"2025-05-09T09:00:00Z","createdAt":"2025-05-01T00:00:00Z","order":1},
        {"id":"a","text":"repeat of a","priority":"high","category":"","dueDate":null,"completed":false,"completedAt":null,"createdAt":"2025-05-01T00:00:00Z","order":2}
    ]"#;
    kv.set("tasks", raw.as_bytes()).unwrap();
    let h = Harness::with_kv(kv);

    assert_eq!(h.list_texts(), vec!["done, undated", "pending, stamped"]);
    assert_invariants(&h.engine);
    let a = h.engine.find("a").unwrap();
    assert_eq!(a.completed_at, Some(a.created_at));
    // the settled stamp lands on yesterday, so it counts toward the streak
    assert_eq!(h.engine.calculate_streak(), 1);
}

#[test]
fn import_of_backup_while_delete_is_pending_keeps_ids_unique() {
    let mut h = Harness::new();
    let a = h.add("A");
    let backup = h.engine.export_json().unwrap();
    h.engine.delete(&a).unwrap();

    let json = serde_json::to_value(h.engine.import_tasks(&backup)).unwrap();
    assert_eq!(json["added"], 0);
    assert_eq!(json["skipped"], 1);

    let restored = h.engine.undo_delete().unwrap();
    assert_eq!(restored.id, a);
    assert_eq!(h.list_texts(), vec!["A"]);
    assert_invariants(&h.engine);
}

#[test]
fn undo_never_duplicates_an_id_already_back_in_the_list() {
    let mut kv = MemoryKv::new();
    let raw = r#"[{"id":"a","text":"A","priority":"medium","category":"","dueDate":null,"completed":false,"completedAt":null,"createdAt":"2025-05-10T09:00:00Z","order":0}]"#;
    kv.set("tasks", raw.as_bytes()).unwrap();
    let pending = r#"{"task":{"id":"a","text":"A","priority":"medium","category":"","dueDate":null,"completed":false,"completedAt":null,"createdAt":"2025-05-10T09:00:00Z","order":0},"deadline":"2025-05-10T09:30:05Z"}"#;
    kv.set("tasks.pending", pending.as_bytes()).unwrap();
    let mut h = Harness::with_kv(kv);

    assert!(h.engine.pending_delete().is_some());
    assert!(h.engine.undo_delete().is_none());
    assert!(h.engine.pending_delete().is_none());
    assert_eq!(h.engine.len(), 1);
    assert_invariants(&h.engine);
}

#[test]
fn shared_engine_across_threads() {
    let h = Harness::new();
    let shared = h.engine.into_shared();
    let workers: Vec<_> = (0..3)
        .map(|w| {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                for i in 0..5 {
                    let mut engine = shared.lock().unwrap();
                    let id = engine.add(TaskDraft::new(format!("w{} #{}", w, i))).unwrap().id;
                    if i % 2 == 0 {
                        engine.toggle_completion(&id);
                    }
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }
    let engine = shared.lock().unwrap();
    assert_eq!(engine.len(), 15);
    assert_eq!(engine.stats().completed, 9);
    assert_invariants(&*engine);
}
