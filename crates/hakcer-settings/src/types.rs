//! Settings type definitions.
//!
//! All types use camelCase JSON and `#[serde(default)]`, so a partial
//! settings file only needs the keys it changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::loader::hakcer_dir;

/// Root settings type.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HakcerSettings {
    pub sync: SyncSettings,
    pub analyzer: AnalyzerSettings,
    pub history: HistorySettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

/// Remote rule manifest fetching.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    pub manifest_url: String,
    pub timeout_ms: u64,
    /// Run the periodic refresher.
    pub auto_refresh: bool,
    pub refresh_interval_secs: u64,
    pub max_manifest_bytes: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            manifest_url: "https://rules.prompthakcer.dev/v1/rules.json".to_string(),
            timeout_ms: 10_000,
            auto_refresh: false,
            refresh_interval_secs: 24 * 60 * 60,
            max_manifest_bytes: 1024 * 1024,
        }
    }
}

impl SyncSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

/// Rule application limits and the token heuristic.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzerSettings {
    pub chars_per_token: usize,
    /// Wall-clock backstop for one rule over one input. Zero disables it,
    /// which keeps analysis reproducible.
    pub rule_budget_ms: u64,
    pub max_matches_per_rule: usize,
    /// Compiled program size ceiling in bytes.
    pub regex_size_limit: usize,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            chars_per_token: 4,
            rule_budget_ms: 0,
            max_matches_per_rule: 100_000,
            regex_size_limit: 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistorySettings {
    /// Oldest entries are dropped past this count. Zero keeps everything.
    pub max_entries: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self { max_entries: 1000 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    pub db_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            db_path: hakcer_dir().join("hakcer.db").to_string_lossy().into_owned(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
