use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};

use crate::model::task::Task;
use crate::model::view::{SortKey, StatusFilter, ViewSettings};

/// Build the filtered, searched and sorted view of `tasks`.
///
/// Pure function of its inputs: the collection itself is never touched and
/// nothing is cached, so calling it twice without a mutation in between
/// yields the same list.
pub fn query_view<'a>(tasks: &'a [Task], settings: &ViewSettings) -> Vec<&'a Task> {
    let matcher = search_matcher(&settings.search_query);
    let mut view: Vec<&Task> = tasks
        .iter()
        .filter(|t| matches_filter(t, settings.filter))
        .filter(|t| matcher.as_ref().is_none_or(|re| matches_search(re, t)))
        .collect();
    sort_view(&mut view, settings.sort_key);
    view
}

pub fn matches_filter(task: &Task, filter: StatusFilter) -> bool {
    match filter {
        StatusFilter::All => true,
        StatusFilter::Pending => !task.completed,
        StatusFilter::Completed => task.completed,
    }
}

/// Case-insensitive literal matcher for a search query; `None` when the
/// query is empty (search disabled).
pub fn search_matcher(query: &str) -> Option<Regex> {
    if query.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Substring match against the task text or its category.
pub fn matches_search(re: &Regex, task: &Task) -> bool {
    re.is_match(&task.text) || re.is_match(&task.category)
}

/// Stable sort by the given key.
pub fn sort_view(view: &mut [&Task], key: SortKey) {
    match key {
        SortKey::DateAdded => view.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortKey::DueDate => view.sort_by(|a, b| compare_due(a, b)),
        SortKey::Priority => view.sort_by_key(|t| t.priority.rank()),
        SortKey::Name => view.sort_by(|a, b| compare_text(&a.text, &b.text)),
        SortKey::Manual => view.sort_by_key(|t| t.order),
    }
}

fn compare_due(a: &Task, b: &Task) -> Ordering {
    match (a.due_date, b.due_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Dictionary-style text order: letters compare without regard to case,
/// and only exact case-folded ties fall back to the raw strings.
pub fn compare_text(a: &str, b: &str) -> Ordering {
    let folded = a.to_lowercase().cmp(&b.to_lowercase());
    folded.then_with(|| b.cmp(a))
}
