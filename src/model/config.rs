use serde::{Deserialize, Serialize};

use super::view::{SortKey, StatusFilter, ViewSettings};

/// Configuration from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub undo: UndoConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Key under which the task collection is stored
    #[serde(default = "default_store_key")]
    pub key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            key: default_store_key(),
        }
    }
}

fn default_store_key() -> String {
    "tasks".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoConfig {
    /// How long a deleted task stays recoverable
    #[serde(default = "default_undo_window")]
    pub window_secs: u64,
}

impl Default for UndoConfig {
    fn default() -> Self {
        UndoConfig {
            window_secs: default_undo_window(),
        }
    }
}

fn default_undo_window() -> u64 {
    5
}

impl UndoConfig {
    /// The window as a duration; absurdly large values saturate.
    pub fn window(&self) -> chrono::Duration {
        i64::try_from(self.window_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

/// Initial view used when no view state has been saved yet
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default)]
    pub filter: StatusFilter,
    #[serde(default)]
    pub sort: SortKey,
}

impl ViewConfig {
    pub fn initial_settings(&self) -> ViewSettings {
        ViewSettings {
            filter: self.filter,
            sort_key: self.sort,
            search_query: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.store.key, "tasks");
        assert_eq!(config.undo.window_secs, 5);
        assert_eq!(config.view.filter, StatusFilter::All);
        assert_eq!(config.view.sort, SortKey::DateAdded);
    }

    #[test]
    fn partial_config() {
        let config: Config = toml::from_str(
            r#"
[undo]
window_secs = 30

[view]
sort = "manual"
"#,
        )
        .unwrap();
        assert_eq!(config.store.key, "tasks");
        assert_eq!(config.undo.window_secs, 30);
        assert_eq!(config.view.sort, SortKey::Manual);
        assert_eq!(config.view.filter, StatusFilter::All);
    }

    #[test]
    fn undo_window_saturates() {
        let undo = UndoConfig {
            window_secs: u64::MAX,
        };
        assert_eq!(undo.window(), chrono::Duration::MAX);
        assert_eq!(UndoConfig::default().window(), chrono::Duration::seconds(5));
    }
}
