use std::fs;
use std::path::Path;

use crate::io::recovery::atomic_write;
use crate::model::view::ViewSettings;

const STATE_FILE: &str = ".state.json";

/// Read the saved view settings; `None` when missing or unreadable.
pub fn read_view_state(data_dir: &Path) -> Option<ViewSettings> {
    let content = fs::read_to_string(data_dir.join(STATE_FILE)).ok()?;
    serde_json::from_str(&content).ok()
}

/// Save the view settings for the next invocation.
pub fn write_view_state(data_dir: &Path, settings: &ViewSettings) -> Result<(), std::io::Error> {
    let content = serde_json::to_string_pretty(settings)?;
    atomic_write(&data_dir.join(STATE_FILE), content.as_bytes())
}
