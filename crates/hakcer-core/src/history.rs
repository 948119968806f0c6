use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::analysis::AnalysisResult;
use crate::ids::HistoryId;

/// Characters of the original prompt kept in a history entry.
pub const PREVIEW_CHARS: usize = 80;

/// What the user did with an analysis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Optimised and previewed only.
    Optimized,
    /// Optimised text was written back to the prompt.
    Applied,
}

/// One persisted record of a past analysis.
///
/// Only `id` is required when importing; other fields default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub prompt_hash: String,
    #[serde(default)]
    pub prompt_preview: String,
    #[serde(default)]
    pub original_length: usize,
    #[serde(default)]
    pub optimized_length: usize,
    #[serde(default)]
    pub tokens_saved: i64,
    #[serde(default)]
    pub characters_saved: i64,
    #[serde(default)]
    pub applied_rule_ids: Vec<String>,
    #[serde(default)]
    pub applied: bool,
}

impl HistoryEntry {
    pub fn from_analysis(result: &AnalysisResult, prompt: &str, disposition: Disposition) -> Self {
        Self {
            id: HistoryId::new().into_string(),
            timestamp: Utc::now().to_rfc3339(),
            prompt_hash: prompt_hash(prompt),
            prompt_preview: prompt.chars().take(PREVIEW_CHARS).collect(),
            original_length: result.stats.original_length,
            optimized_length: result.stats.optimized_length,
            tokens_saved: result.stats.tokens_saved,
            characters_saved: result.stats.characters_saved,
            applied_rule_ids: result.applied_rule_ids(),
            applied: disposition == Disposition::Applied,
        }
    }
}

/// SHA-256 of the prompt, lowercase hex.
pub fn prompt_hash(prompt: &str) -> String {
    format!("{:x}", Sha256::digest(prompt.as_bytes()))
}

/// Lifetime counters, persisted as a single record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregateStats {
    pub prompts_optimized: u64,
    pub prompts_applied: u64,
    pub tokens_saved: i64,
    pub characters_saved: i64,
    pub rules_applied: BTreeMap<String, u64>,
}

impl AggregateStats {
    /// Fold one recorded entry into the counters.
    pub fn fold(&mut self, entry: &HistoryEntry) {
        self.prompts_optimized += 1;
        if entry.applied {
            self.prompts_applied += 1;
        }
        self.tokens_saved = self.tokens_saved.saturating_add(entry.tokens_saved);
        self.characters_saved = self.characters_saved.saturating_add(entry.characters_saved);
        for rule_id in &entry.applied_rule_ids {
            *self.rules_applied.entry(rule_id.clone()).or_insert(0) += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AppliedRule, SavingsStats};
    use crate::tokens::TokenEstimator;

    fn result(original: &str, optimized: &str, rules: &[&str]) -> AnalysisResult {
        AnalysisResult {
            optimized_text: optimized.into(),
            applied_rules: rules
                .iter()
                .map(|id| AppliedRule {
                    rule_id: (*id).into(),
                    match_count: 1,
                })
                .collect(),
            stats: SavingsStats::compute(original, optimized, &TokenEstimator::default()),
            skipped_rules: Vec::new(),
        }
    }

    #[test]
    fn entry_from_analysis() {
        let r = result("please do it", "do it", &["politeness-please"]);
        let entry = HistoryEntry::from_analysis(&r, "please do it", Disposition::Applied);
        assert!(entry.id.starts_with("hist_"));
        assert_eq!(entry.characters_saved, 7);
        assert_eq!(entry.applied_rule_ids, vec!["politeness-please".to_string()]);
        assert!(entry.applied);
        assert_eq!(entry.prompt_hash.len(), 64);
        assert_eq!(entry.prompt_preview, "please do it");
    }

    #[test]
    fn preview_is_truncated() {
        let long = "x".repeat(500);
        let r = result(&long, &long, &[]);
        let entry = HistoryEntry::from_analysis(&r, &long, Disposition::Optimized);
        assert_eq!(entry.prompt_preview.chars().count(), PREVIEW_CHARS);
        assert!(!entry.applied);
    }

    #[test]
    fn hash_is_stable() {
        assert_eq!(prompt_hash("abc"), prompt_hash("abc"));
        assert_eq!(
            prompt_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn fold_counts() {
        let mut stats = AggregateStats::default();
        let r = result("please please", "", &["a", "b"]);
        stats.fold(&HistoryEntry::from_analysis(&r, "please please", Disposition::Optimized));
        stats.fold(&HistoryEntry::from_analysis(&r, "please please", Disposition::Applied));
        assert_eq!(stats.prompts_optimized, 2);
        assert_eq!(stats.prompts_applied, 1);
        assert_eq!(stats.characters_saved, 26);
        assert_eq!(stats.rules_applied["a"], 2);
        assert_eq!(stats.rules_applied["b"], 2);
    }

    #[test]
    fn import_tolerates_sparse_entries() {
        let entries: Vec<HistoryEntry> =
            serde_json::from_str(r#"[{"id":"1"},{"id":"2","tokensSaved":5}]"#).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].tokens_saved, 5);
        assert!(entries[0].applied_rule_ids.is_empty());
    }

    #[test]
    fn stats_tolerate_missing_fields() {
        let stats: AggregateStats = serde_json::from_str(r#"{"tokensSaved":3}"#).unwrap();
        assert_eq!(stats.tokens_saved, 3);
        assert!(stats.rules_applied.is_empty());
    }
}
