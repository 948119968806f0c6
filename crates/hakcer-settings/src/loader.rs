//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`HakcerSettings::default()`]
//! 2. If `~/.hakcer/settings.json` exists, deep-merge user values over defaults
//! 3. Reset out-of-range numbers from the file to their defaults
//! 4. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::HakcerSettings;

// Inclusive bounds, shared by the file and env layers.
const TIMEOUT_MS: (u64, u64) = (100, 600_000);
const REFRESH_INTERVAL_SECS: (u64, u64) = (60, 30 * 86_400);
const MAX_MANIFEST_BYTES: (u64, u64) = (1024, 64 * 1024 * 1024);
const CHARS_PER_TOKEN: (u64, u64) = (1, 64);
const RULE_BUDGET_MS: (u64, u64) = (0, 60_000);
const MAX_MATCHES_PER_RULE: (u64, u64) = (1, 10_000_000);
// The floor is the default so the bundled rules always compile.
const REGEX_SIZE_LIMIT: (u64, u64) = (1024 * 1024, 256 * 1024 * 1024);
const HISTORY_MAX: (u64, u64) = (0, 1_000_000);

/// `~/.hakcer`, falling back to `/tmp/.hakcer` without `HOME`.
pub fn hakcer_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".hakcer")
}

/// Resolve the path to the settings file (`~/.hakcer/settings.json`).
pub fn settings_path() -> PathBuf {
    hakcer_dir().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<HakcerSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<HakcerSettings> {
    let defaults = serde_json::to_value(HakcerSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: HakcerSettings = serde_json::from_value(merged)?;
    enforce_ranges(&mut settings);
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Reset numeric settings outside their bounds to the defaults, with a warning.
pub fn enforce_ranges(settings: &mut HakcerSettings) {
    let defaults = HakcerSettings::default();

    let sync = &mut settings.sync;
    if !in_range("sync.timeoutMs", sync.timeout_ms, TIMEOUT_MS) {
        sync.timeout_ms = defaults.sync.timeout_ms;
    }
    if !in_range("sync.refreshIntervalSecs", sync.refresh_interval_secs, REFRESH_INTERVAL_SECS) {
        sync.refresh_interval_secs = defaults.sync.refresh_interval_secs;
    }
    if !in_range("sync.maxManifestBytes", widen(sync.max_manifest_bytes), MAX_MANIFEST_BYTES) {
        sync.max_manifest_bytes = defaults.sync.max_manifest_bytes;
    }

    let analyzer = &mut settings.analyzer;
    if !in_range("analyzer.charsPerToken", widen(analyzer.chars_per_token), CHARS_PER_TOKEN) {
        analyzer.chars_per_token = defaults.analyzer.chars_per_token;
    }
    if !in_range("analyzer.ruleBudgetMs", analyzer.rule_budget_ms, RULE_BUDGET_MS) {
        analyzer.rule_budget_ms = defaults.analyzer.rule_budget_ms;
    }
    if !in_range(
        "analyzer.maxMatchesPerRule",
        widen(analyzer.max_matches_per_rule),
        MAX_MATCHES_PER_RULE,
    ) {
        analyzer.max_matches_per_rule = defaults.analyzer.max_matches_per_rule;
    }
    if !in_range("analyzer.regexSizeLimit", widen(analyzer.regex_size_limit), REGEX_SIZE_LIMIT) {
        analyzer.regex_size_limit = defaults.analyzer.regex_size_limit;
    }

    if !in_range("history.maxEntries", widen(settings.history.max_entries), HISTORY_MAX) {
        settings.history.max_entries = defaults.history.max_entries;
    }
}

fn in_range(key: &str, value: u64, (min, max): (u64, u64)) -> bool {
    let ok = (min..=max).contains(&value);
    if !ok {
        tracing::warn!(key, value, min, max, "setting out of range, using default");
    }
    ok
}

fn widen(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (fall back to file/default).
pub fn apply_env_overrides(settings: &mut HakcerSettings) {
    // ── Sync ────────────────────────────────────────────────────────
    if let Some(v) = read_env_string("HAKCER_MANIFEST_URL") {
        settings.sync.manifest_url = v;
    }
    if let Some(v) = read_env_u64("HAKCER_SYNC_TIMEOUT_MS", TIMEOUT_MS) {
        settings.sync.timeout_ms = v;
    }
    if let Some(v) = read_env_bool("HAKCER_AUTO_REFRESH") {
        settings.sync.auto_refresh = v;
    }
    if let Some(v) = read_env_u64("HAKCER_REFRESH_INTERVAL_SECS", REFRESH_INTERVAL_SECS) {
        settings.sync.refresh_interval_secs = v;
    }

    // ── Analyzer ────────────────────────────────────────────────────
    if let Some(v) = read_env_u64("HAKCER_CHARS_PER_TOKEN", CHARS_PER_TOKEN) {
        settings.analyzer.chars_per_token = usize::try_from(v).unwrap_or(4);
    }
    if let Some(v) = read_env_u64("HAKCER_RULE_BUDGET_MS", RULE_BUDGET_MS) {
        settings.analyzer.rule_budget_ms = v;
    }

    // ── History / storage / logging ─────────────────────────────────
    if let Some(v) = read_env_u64("HAKCER_HISTORY_MAX", HISTORY_MAX) {
        settings.history.max_entries = usize::try_from(v).unwrap_or(1000);
    }
    if let Some(v) = read_env_string("HAKCER_DB_PATH") {
        settings.storage.db_path = v;
    }
    if let Some(v) = read_env_string("HAKCER_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("HAKCER_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, (min, max): (u64, u64)) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}
