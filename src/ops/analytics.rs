use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};
use indexmap::IndexMap;
use serde::Serialize;

use crate::model::task::{Priority, Task};

/// Completion counts for the whole collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub productivity_percent: u32,
}

/// Per-bucket totals used by the category and priority breakdowns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub total: usize,
    pub completed: usize,
}

impl Tally {
    fn count(&mut self, task: &Task) {
        self.total += 1;
        if task.completed {
            self.completed += 1;
        }
    }
}

/// Incomplete tasks with due dates that need attention
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DueSummary {
    pub overdue: usize,
    pub due_today: usize,
}

/// Completions on one UTC day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub completed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InsightKind {
    GettingStarted,
    Productivity,
    Streak,
    Overdue,
    DueToday,
}

/// One human-readable observation. Only `kind` is meant for matching;
/// the wording may change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Counts
// ---------------------------------------------------------------------------

pub fn stats(tasks: &[Task]) -> Stats {
    let total = tasks.len();
    let completed = tasks.iter().filter(|t| t.completed).count();
    Stats {
        total,
        completed,
        pending: total - completed,
        productivity_percent: percent(completed, total),
    }
}

/// `round(100 * part / whole)`, 0 when `whole` is 0
pub fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (100.0 * part as f64 / whole as f64).round() as u32
}

/// Group every task by category (empty → `other`), in order of first
/// appearance.
pub fn category_breakdown(tasks: &[Task]) -> IndexMap<String, Tally> {
    let mut buckets: IndexMap<String, Tally> = IndexMap::new();
    for task in tasks {
        buckets
            .entry(task.category_bucket().to_string())
            .or_default()
            .count(task);
    }
    buckets
}

/// Totals per priority, high to low. Every priority is present.
pub fn priority_breakdown(tasks: &[Task]) -> Vec<(Priority, Tally)> {
    Priority::ALL
        .iter()
        .map(|&p| {
            let mut tally = Tally::default();
            for task in tasks.iter().filter(|t| t.priority == p) {
                tally.count(task);
            }
            (p, tally)
        })
        .collect()
}

pub fn due_summary(tasks: &[Task], today: NaiveDate) -> DueSummary {
    let mut summary = DueSummary::default();
    for task in tasks.iter().filter(|t| !t.completed) {
        if task.is_overdue(today) {
            summary.overdue += 1;
        } else if task.is_due_on(today) {
            summary.due_today += 1;
        }
    }
    summary
}

// ---------------------------------------------------------------------------
// Streak
// ---------------------------------------------------------------------------

/// Distinct UTC days on which some task was completed
fn completion_days(tasks: &[Task]) -> BTreeSet<NaiveDate> {
    tasks
        .iter()
        .filter(|t| t.completed)
        .filter_map(|t| t.completed_at)
        .map(|at| at.date_naive())
        .collect()
}

/// Number of consecutive UTC days with at least one completion, counting
/// back from the most recent such day. That day has to be `today` or the
/// day before, otherwise the streak is broken and 0 is returned.
pub fn calculate_streak(tasks: &[Task], today: NaiveDate) -> u32 {
    let days = completion_days(tasks);
    let mut newest_first = days.iter().rev();

    let Some(&latest) = newest_first.next() else {
        return 0;
    };
    let yesterday = today.checked_sub_days(Days::new(1));
    if latest != today && Some(latest) != yesterday {
        return 0;
    }

    let mut streak = 1;
    let mut expected = latest.checked_sub_days(Days::new(1));
    for &day in newest_first {
        match expected {
            Some(e) if day == e => {
                streak += 1;
                expected = e.checked_sub_days(Days::new(1));
            }
            _ => break,
        }
    }
    streak
}

/// Completions per UTC day for the `days` days ending at `today`, oldest
/// first.
pub fn completion_history(tasks: &[Task], today: NaiveDate, days: u32) -> Vec<DayCount> {
    let mut history: Vec<DayCount> = (0..days)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(back as u64)))
        .map(|date| DayCount { date, completed: 0 })
        .collect();

    for at in tasks.iter().filter(|t| t.completed).filter_map(|t| t.completed_at) {
        let day = at.date_naive();
        if let Some(slot) = history.iter_mut().find(|d| d.date == day) {
            slot.completed += 1;
        }
    }
    history
}

// ---------------------------------------------------------------------------
// Insights
// ---------------------------------------------------------------------------

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{} {}", n, one)
    } else {
        format!("{} {}", n, many)
    }
}

/// Short ordered list of observations about the collection.
pub fn insights(stats: &Stats, streak: u32, due: &DueSummary) -> Vec<Insight> {
    let mut out = Vec::new();

    if stats.total == 0 {
        out.push(Insight {
            kind: InsightKind::GettingStarted,
            message: "No tasks yet. Add one to get started.".to_string(),
        });
        return out;
    }

    let message = if stats.completed == 0 {
        format!(
            "Nothing completed yet; {} waiting.",
            plural(stats.pending, "task is", "tasks are")
        )
    } else if stats.productivity_percent >= 80 {
        format!(
            "Great work: {}% of your tasks are complete.",
            stats.productivity_percent
        )
    } else if stats.productivity_percent >= 50 {
        format!(
            "Solid progress: {}% complete, {} to go.",
            stats.productivity_percent, stats.pending
        )
    } else {
        format!(
            "{} still pending. Keep going!",
            plural(stats.pending, "task", "tasks")
        )
    };
    out.push(Insight {
        kind: InsightKind::Productivity,
        message,
    });

    if streak > 0 {
        out.push(Insight {
            kind: InsightKind::Streak,
            message: format!("You're on a {}-day completion streak.", streak),
        });
    }
    if due.overdue > 0 {
        out.push(Insight {
            kind: InsightKind::Overdue,
            message: format!("{} overdue.", plural(due.overdue, "task is", "tasks are")),
        });
    }
    if due.due_today > 0 {
        out.push(Insight {
            kind: InsightKind::DueToday,
            message: format!("{} due today.", plural(due.due_today, "task is", "tasks are")),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn task(id: &str) -> Task {
        Task {
            id: id.into(),
            text: format!("Task {}", id),
            priority: Priority::Medium,
            category: String::new(),
            due_date: None,
            completed: false,
            completed_at: None,
            created_at: Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap(),
            order: 0,
        }
    }

    fn done_at(id: &str, at: DateTime<Utc>) -> Task {
        let mut t = task(id);
        t.completed = true;
        t.completed_at = Some(at);
        t
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
    }

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, d, h, 0, 0).unwrap()
    }

    // --- Stats ---

    #[test]
    fn stats_empty_collection() {
        assert_eq!(
            stats(&[]),
            Stats {
                total: 0,
                completed: 0,
                pending: 0,
                productivity_percent: 0
            }
        );
    }

    #[test]
    fn stats_rounds_percentage() {
        let tasks = vec![done_at("a", at(1, 1)), task("b"), task("c")];
        let s = stats(&tasks);
        assert_eq!(s.total, 3);
        assert_eq!(s.completed, 1);
        assert_eq!(s.pending, 2);
        assert_eq!(s.productivity_percent, 33);

        let tasks = vec![done_at("a", at(1, 1)), done_at("b", at(1, 1)), task("c")];
        assert_eq!(stats(&tasks).productivity_percent, 67);
        assert_eq!(percent(1, 2), 50);
        assert_eq!(percent(1, 8), 13);
    }

    // --- Breakdowns ---

    #[test]
    fn category_breakdown_groups_empty_as_other() {
        let mut a = task("a");
        a.category = "work".into();
        let mut b = done_at("b", at(1, 1));
        b.category = "work".into();
        let c = task("c");
        let mut d = task("d");
        d.category = "other".into();

        let breakdown = category_breakdown(&[a, b, c, d]);
        let keys: Vec<&str> = breakdown.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["work", "other"]);
        assert_eq!(breakdown["work"], Tally { total: 2, completed: 1 });
        assert_eq!(breakdown["other"], Tally { total: 2, completed: 0 });
    }

    #[test]
    fn priority_breakdown_lists_every_priority() {
        let mut a = task("a");
        a.priority = Priority::High;
        let b = done_at("b", at(1, 1));
        let breakdown = priority_breakdown(&[a, b]);
        assert_eq!(
            breakdown,
            vec![
                (Priority::High, Tally { total: 1, completed: 0 }),
                (Priority::Medium, Tally { total: 1, completed: 1 }),
                (Priority::Low, Tally::default()),
            ]
        );
    }

    #[test]
    fn due_summary_counts_only_incomplete() {
        let mut overdue = task("a");
        overdue.due_date = Some(day(9));
        let mut today = task("b");
        today.due_date = Some(day(10));
        let mut done_late = done_at("c", at(9, 1));
        done_late.due_date = Some(day(1));
        let mut future = task("d");
        future.due_date = Some(day(20));

        let summary = due_summary(&[overdue, today, done_late, future], day(10));
        assert_eq!(summary, DueSummary { overdue: 1, due_today: 1 });
    }

    // --- Streak ---

    #[test]
    fn streak_zero_without_completions() {
        assert_eq!(calculate_streak(&[task("a")], day(10)), 0);
    }

    #[test]
    fn streak_today_and_yesterday() {
        let tasks = vec![done_at("a", at(10, 9)), done_at("b", at(9, 23))];
        assert_eq!(calculate_streak(&tasks, day(10)), 2);
    }

    #[test]
    fn streak_anchored_yesterday() {
        let tasks = vec![done_at("a", at(9, 9)), done_at("b", at(8, 9)), done_at("c", at(7, 9))];
        assert_eq!(calculate_streak(&tasks, day(10)), 3);
    }

    #[test]
    fn streak_broken_when_latest_too_old() {
        let tasks = vec![done_at("a", at(7, 9))];
        assert_eq!(calculate_streak(&tasks, day(10)), 0);
    }

    #[test]
    fn streak_stops_at_gap() {
        let tasks = vec![
            done_at("a", at(10, 1)),
            done_at("b", at(9, 1)),
            done_at("c", at(7, 1)),
            done_at("d", at(6, 1)),
        ];
        assert_eq!(calculate_streak(&tasks, day(10)), 2);
    }

    #[test]
    fn streak_counts_each_day_once() {
        let tasks = vec![
            done_at("a", at(10, 1)),
            done_at("b", at(10, 22)),
            done_at("c", at(9, 5)),
            done_at("d", at(9, 6)),
        ];
        assert_eq!(calculate_streak(&tasks, day(10)), 2);
    }

    #[test]
    fn streak_uses_utc_day_boundaries() {
        // 23:30 at UTC-5 on the 9th is 04:30 UTC on the 10th
        let offset = chrono::FixedOffset::west_opt(5 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2025, 5, 9, 23, 30, 0).unwrap();
        let tasks = vec![done_at("a", local.with_timezone(&Utc)), done_at("b", at(9, 12))];
        assert_eq!(calculate_streak(&tasks, day(10)), 2);
    }

    #[test]
    fn streak_ignores_uncompleted_timestamps() {
        let mut stale = task("a");
        stale.completed_at = Some(at(10, 1));
        assert_eq!(calculate_streak(&[stale], day(10)), 0);
    }

    // --- History ---

    #[test]
    fn completion_history_oldest_first() {
        let tasks = vec![done_at("a", at(10, 1)), done_at("b", at(10, 2)), done_at("c", at(8, 1)), done_at("d", at(1, 1))];
        let history = completion_history(&tasks, day(10), 3);
        assert_eq!(
            history,
            vec![
                DayCount { date: day(8), completed: 1 },
                DayCount { date: day(9), completed: 0 },
                DayCount { date: day(10), completed: 2 },
            ]
        );
    }

    // --- Insights ---

    #[test]
    fn insights_for_empty_collection() {
        let list = insights(&Stats::default(), 0, &DueSummary::default());
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].kind, InsightKind::GettingStarted);
    }

    #[test]
    fn insights_report_streak_and_due_counts() {
        let s = Stats {
            total: 4,
            completed: 1,
            pending: 3,
            productivity_percent: 25,
        };
        let due = DueSummary { overdue: 2, due_today: 1 };
        let list = insights(&s, 3, &due);
        let kinds: Vec<InsightKind> = list.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                InsightKind::Productivity,
                InsightKind::Streak,
                InsightKind::Overdue,
                InsightKind::DueToday
            ]
        );
        assert!(list[1].message.contains("3-day"));
        assert!(list[2].message.starts_with("2 tasks are"));
        assert!(list[3].message.starts_with("1 task is"));
    }

    #[test]
    fn insights_high_productivity() {
        let s = Stats {
            total: 5,
            completed: 4,
            pending: 1,
            productivity_percent: 80,
        };
        let list = insights(&s, 0, &DueSummary::default());
        assert_eq!(list.len(), 1);
        assert!(list[0].message.contains("80%"));
    }
}
