use serde::{Deserialize, Serialize};

/// Which tasks the view shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Completed,
}

impl StatusFilter {
    pub fn parse_filter(s: &str) -> Option<StatusFilter> {
        match s {
            "all" => Some(StatusFilter::All),
            "pending" => Some(StatusFilter::Pending),
            "completed" => Some(StatusFilter::Completed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Pending => "pending",
            StatusFilter::Completed => "completed",
        }
    }
}

/// View ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    /// Newest first
    #[default]
    DateAdded,
    /// Earliest due first, undated last
    DueDate,
    /// High before medium before low
    Priority,
    /// Alphabetical by text
    Name,
    /// Drag order
    Manual,
}

impl SortKey {
    pub fn parse_sort(s: &str) -> Option<SortKey> {
        match s {
            "dateAdded" | "date-added" | "added" => Some(SortKey::DateAdded),
            "dueDate" | "due-date" | "due" => Some(SortKey::DueDate),
            "priority" => Some(SortKey::Priority),
            "name" => Some(SortKey::Name),
            "manual" => Some(SortKey::Manual),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::DateAdded => "dateAdded",
            SortKey::DueDate => "dueDate",
            SortKey::Priority => "priority",
            SortKey::Name => "name",
            SortKey::Manual => "manual",
        }
    }
}

/// Filter, search and sort state that drives `query_view`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSettings {
    #[serde(default)]
    pub filter: StatusFilter,
    #[serde(default)]
    pub sort_key: SortKey,
    #[serde(default)]
    pub search_query: String,
}
