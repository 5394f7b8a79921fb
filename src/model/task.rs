use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Known category labels offered to the user. Imported tasks may carry
/// anything; an empty category is reported as `other`.
pub const CATEGORIES: &[&str] = &["work", "personal", "shopping", "health", "learning", "other"];

/// Name of the bucket used for tasks without a category.
pub const OTHER_CATEGORY: &str = "other";

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    /// Sort rank: high first
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    /// Parse a priority name (case-insensitive)
    pub fn parse_priority(s: &str) -> Option<Priority> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

/// A single to-do item. Field names on the wire are camelCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    pub priority: Priority,
    /// Category label, possibly empty
    pub category: String,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    /// Set exactly while `completed` is true
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Manual (drag) rank, contiguous 0..n after every structural change
    pub order: usize,
}

impl Task {
    /// Category with the empty label folded into `other`
    pub fn category_bucket(&self) -> &str {
        if self.category.is_empty() {
            OTHER_CATEGORY
        } else {
            &self.category
        }
    }

    /// Set completion state, keeping `completed_at` in step with it.
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        if self.completed == completed {
            return;
        }
        self.completed = completed;
        self.completed_at = if completed { Some(now) } else { None };
    }

    /// Incomplete and due strictly before `today`
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.due_date.is_some_and(|d| d < today)
    }

    pub fn is_due_on(&self, day: NaiveDate) -> bool {
        self.due_date == Some(day)
    }
}

/// Input for creating a task
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub text: String,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl TaskDraft {
    pub fn new(text: impl Into<String>) -> Self {
        TaskDraft {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn due(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }
}

/// Partial update merged into an existing task. `None` leaves a field
/// untouched; `due_date: Some(None)` clears the due date.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub due_date: Option<Option<NaiveDate>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.priority.is_none()
            && self.category.is_none()
            && self.due_date.is_none()
    }
}
