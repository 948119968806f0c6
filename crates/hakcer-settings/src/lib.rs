//! # hakcer-settings
//!
//! Layered configuration for the prompt compressor.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`HakcerSettings::default()`]
//! 2. **User file**: `~/.hakcer/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `HAKCER_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, hakcer_dir, load_settings, load_settings_from_path, settings_path};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = HakcerSettings::default();
        assert_eq!(settings.sync.timeout_ms, 10_000);
        assert!(!settings.sync.auto_refresh);
        assert_eq!(settings.analyzer.chars_per_token, 4);
        assert_eq!(settings.analyzer.rule_budget_ms, 0);
        assert_eq!(settings.history.max_entries, 1000);
        assert_eq!(settings.logging.level, "info");
        assert!(settings.storage.db_path.ends_with("hakcer.db"));
    }
}
