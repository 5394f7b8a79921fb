use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;

use crate::model::task::{CATEGORIES, Priority, Task};
use crate::model::view::{SortKey, StatusFilter, ViewSettings};
use crate::ops::analytics::{DayCount, DueSummary, Insight, Stats, Tally};
use crate::util::unicode::{display_width, fit_to_width};

/// Widest the text column gets in list output
const TEXT_COLUMN_MAX: usize = 48;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListJson<'a> {
    pub view: &'a ViewSettings,
    pub tasks: Vec<&'a Task>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteJson<'a> {
    pub task: &'a Task,
    /// Seconds left to undo
    pub undo_seconds: i64,
}

#[derive(Serialize)]
pub struct CountJson {
    pub removed: usize,
}

#[derive(Serialize)]
pub struct MovedJson {
    pub moved: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsJson {
    #[serde(flatten)]
    pub stats: Stats,
    #[serde(flatten)]
    pub due: DueSummary,
    pub streak: u32,
}

#[derive(Serialize)]
pub struct BreakdownJson<'a> {
    pub categories: &'a IndexMap<String, Tally>,
    pub priorities: IndexMap<&'static str, Tally>,
}

#[derive(Serialize)]
pub struct StreakJson {
    pub streak: u32,
}

// ---------------------------------------------------------------------------
// Argument parsing
// ---------------------------------------------------------------------------

pub fn parse_priority_arg(s: &str) -> Result<Priority, String> {
    Priority::parse_priority(s)
        .ok_or_else(|| format!("unknown priority '{}' (expected: high, medium, low)", s))
}

/// Only the offered categories are accepted from the command line.
pub fn parse_category_arg(s: &str) -> Result<String, String> {
    let lower = s.to_ascii_lowercase();
    if CATEGORIES.contains(&lower.as_str()) {
        Ok(lower)
    } else {
        Err(format!(
            "unknown category '{}' (expected: {})",
            s,
            CATEGORIES.join(", ")
        ))
    }
}

pub fn parse_due_arg(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("invalid due date '{}' (expected YYYY-MM-DD)", s))
}

pub fn parse_filter_arg(s: &str) -> Result<StatusFilter, String> {
    StatusFilter::parse_filter(s)
        .ok_or_else(|| format!("unknown filter '{}' (expected: all, pending, completed)", s))
}

pub fn parse_sort_arg(s: &str) -> Result<SortKey, String> {
    SortKey::parse_sort(s).ok_or_else(|| {
        format!(
            "unknown sort '{}' (expected: dateAdded, dueDate, priority, name, manual)",
            s
        )
    })
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

fn check_char(task: &Task) -> char {
    if task.completed { 'x' } else { ' ' }
}

fn priority_mark(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "!!",
        Priority::Medium => "! ",
        Priority::Low => "  ",
    }
}

fn due_label(task: &Task, today: NaiveDate) -> String {
    match task.due_date {
        None => String::new(),
        Some(d) if task.is_overdue(today) => format!("due {} (overdue)", d),
        Some(d) if !task.completed && d == today => format!("due {} (today)", d),
        Some(d) => format!("due {}", d),
    }
}

/// One task per line: check box, id, priority mark, text, category, due.
pub fn format_task_line(task: &Task, today: NaiveDate, text_width: usize) -> String {
    let mut line = format!(
        "[{}] {}  {} {}  {:<8}",
        check_char(task),
        task.id,
        priority_mark(task.priority),
        fit_to_width(&task.text, text_width),
        task.category_bucket()
    );
    let due = due_label(task, today);
    if !due.is_empty() {
        line.push_str("  ");
        line.push_str(&due);
    }
    line.trim_end().to_string()
}

/// Format the listing with a shared text column width
pub fn format_task_list(tasks: &[&Task], today: NaiveDate) -> Vec<String> {
    let text_width = tasks
        .iter()
        .map(|t| display_width(&t.text))
        .max()
        .unwrap_or(0)
        .min(TEXT_COLUMN_MAX);
    tasks
        .iter()
        .map(|t| format_task_line(t, today, text_width))
        .collect()
}

pub fn format_view_settings(view: &ViewSettings) -> String {
    let mut s = format!(
        "filter: {}  sort: {}",
        view.filter.as_str(),
        view.sort_key.as_str()
    );
    if !view.search_query.is_empty() {
        s.push_str(&format!("  search: \"{}\"", view.search_query));
    }
    s
}

pub fn format_task_detail(task: &Task, today: NaiveDate) -> Vec<String> {
    let mut lines = vec![format!("[{}] {} {}", check_char(task), task.id, task.text)];
    lines.push(format!("priority: {}", task.priority.as_str()));
    lines.push(format!("category: {}", task.category_bucket()));
    let due = due_label(task, today);
    if !due.is_empty() {
        lines.push(due);
    }
    lines.push(format!("created: {}", task.created_at.to_rfc3339()));
    if let Some(at) = task.completed_at {
        lines.push(format!("completed: {}", at.to_rfc3339()));
    }
    lines.push(format!("order: {}", task.order));
    lines
}

pub fn format_stats(stats: &Stats, due: &DueSummary, streak: u32) -> Vec<String> {
    vec![
        format!("total:        {}", stats.total),
        format!("completed:    {}", stats.completed),
        format!("pending:      {}", stats.pending),
        format!("productivity: {}%", stats.productivity_percent),
        format!("overdue:      {}", due.overdue),
        format!("due today:    {}", due.due_today),
        format!("streak:       {} day{}", streak, if streak == 1 { "" } else { "s" }),
    ]
}

fn format_tally_rows<'a>(rows: impl Iterator<Item = (&'a str, &'a Tally)>) -> Vec<String> {
    let rows: Vec<_> = rows.collect();
    let name_w = rows.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
    rows.iter()
        .map(|(name, t)| {
            format!(
                "  {:<name_w$}  {:>3} done / {:>3}",
                name,
                t.completed,
                t.total,
                name_w = name_w
            )
        })
        .collect()
}

pub fn format_breakdown(
    categories: &IndexMap<String, Tally>,
    priorities: &[(Priority, Tally)],
) -> Vec<String> {
    let mut lines = vec!["categories:".to_string()];
    if categories.is_empty() {
        lines.push("  (none)".to_string());
    }
    lines.extend(format_tally_rows(
        categories.iter().map(|(k, v)| (k.as_str(), v)),
    ));
    lines.push("priorities:".to_string());
    lines.extend(format_tally_rows(
        priorities.iter().map(|(p, t)| (p.as_str(), t)),
    ));
    lines
}

/// Completions per day as a bar chart, oldest first
pub fn format_history(history: &[DayCount]) -> Vec<String> {
    history
        .iter()
        .map(|d| {
            let bar = "#".repeat(d.completed);
            format!("{}  {:>3} {}", d.date, d.completed, bar).trim_end().to_string()
        })
        .collect()
}

pub fn format_insights(insights: &[Insight]) -> Vec<String> {
    insights.iter().map(|i| format!("* {}", i.message)).collect()
}
