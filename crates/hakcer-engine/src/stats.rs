//! Analysis history and lifetime savings counters.

use std::collections::HashSet;
use std::sync::Arc;

use hakcer_core::{AggregateStats, AnalysisResult, Disposition, HistoryEntry};
use hakcer_store::{get_json, set_json, KvStore, KvWrite};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::keys;

/// Default number of history entries kept.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Records analyses to storage. History is newest first and capped.
///
/// Read-modify-write cycles are serialized within one aggregator only.
pub struct StatsAggregator {
    store: Arc<dyn KvStore>,
    max_entries: usize,
    write_lock: Mutex<()>,
}

impl StatsAggregator {
    /// A cap of zero keeps every entry.
    pub fn new(store: Arc<dyn KvStore>, max_entries: usize) -> Self {
        Self {
            store,
            max_entries: if max_entries == 0 { usize::MAX } else { max_entries },
            write_lock: Mutex::new(()),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Append a history entry for `result` and fold it into the totals.
    pub async fn record(
        &self,
        result: &AnalysisResult,
        prompt: &str,
        disposition: Disposition,
    ) -> Result<HistoryEntry, EngineError> {
        let entry = HistoryEntry::from_analysis(result, prompt, disposition);
        let _guard = self.write_lock.lock().await;

        let mut history = self.load_history().await?;
        history.insert(0, entry.clone());
        history.truncate(self.max_entries);

        let mut totals = self.stats().await?;
        totals.fold(&entry);

        self.store
            .write_batch(vec![
                KvWrite::set_json(keys::PROMPT_HISTORY, &history)?,
                KvWrite::set_json(keys::TOTAL_STATS, &totals)?,
            ])
            .await?;

        debug!(
            entry_id = %entry.id,
            tokens_saved = entry.tokens_saved,
            applied = entry.applied,
            "analysis recorded"
        );
        Ok(entry)
    }

    /// Newest first.
    pub async fn history(&self) -> Result<Vec<HistoryEntry>, EngineError> {
        self.load_history().await
    }

    pub async fn stats(&self) -> Result<AggregateStats, EngineError> {
        Ok(get_json::<AggregateStats>(self.store.as_ref(), keys::TOTAL_STATS)
            .await?
            .unwrap_or_default())
    }

    pub async fn export_json(&self) -> Result<String, EngineError> {
        let history = self.load_history().await?;
        Ok(serde_json::to_string_pretty(&history)?)
    }

    /// Merge entries into history, skipping ids already present.
    ///
    /// The merged log is re-ordered newest first by timestamp before the cap
    /// applies, so the oldest entries are the ones dropped. Totals are left
    /// alone. Returns how many entries were new.
    pub async fn import_history(&self, entries: Vec<HistoryEntry>) -> Result<usize, EngineError> {
        let _guard = self.write_lock.lock().await;

        let mut history = self.load_history().await?;
        let mut seen: HashSet<String> = history.iter().map(|e| e.id.clone()).collect();
        let offered = entries.len();
        let mut added = 0;
        for entry in entries {
            if seen.insert(entry.id.clone()) {
                history.push(entry);
                added += 1;
            }
        }
        if added == 0 {
            debug!(offered, "history import added nothing");
            return Ok(0);
        }

        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        history.truncate(self.max_entries);

        set_json(self.store.as_ref(), keys::PROMPT_HISTORY, &history).await?;
        info!(offered, added, total = history.len(), "history imported");
        Ok(added)
    }

    /// Parse a JSON array of history entries and import it.
    pub async fn import_json(&self, json: &str) -> Result<usize, EngineError> {
        let entries: Vec<HistoryEntry> = serde_json::from_str(json)?;
        self.import_history(entries).await
    }

    /// Drop history and reset totals.
    pub async fn clear(&self) -> Result<(), EngineError> {
        let _guard = self.write_lock.lock().await;
        self.store
            .write_batch(vec![
                KvWrite::remove(keys::PROMPT_HISTORY),
                KvWrite::remove(keys::TOTAL_STATS),
            ])
            .await?;
        info!("history cleared");
        Ok(())
    }

    async fn load_history(&self) -> Result<Vec<HistoryEntry>, EngineError> {
        Ok(get_json::<Vec<HistoryEntry>>(self.store.as_ref(), keys::PROMPT_HISTORY)
            .await?
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::FlakyStore;
    use hakcer_core::{AppliedRule, SavingsStats, TokenEstimator};
    use hakcer_store::MemoryStore;

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

    fn entry(id: &str) -> HistoryEntry {
        serde_json::from_value(serde_json::json!({ "id": id })).unwrap()
    }

    fn aggregator(max: usize) -> StatsAggregator {
        StatsAggregator::new(Arc::new(MemoryStore::new()), max)
    }

    #[tokio::test]
    async fn record_prepends_and_folds_totals() {
        let stats = aggregator(10);
        let first = stats
            .record(&result("aaaaaaaa", "aaaa", &["r1"]), "aaaaaaaa", Disposition::Optimized)
            .await
            .unwrap();
        let second = stats
            .record(&result("bbbbbbbb", "bb", &["r1", "r2"]), "bbbbbbbb", Disposition::Applied)
            .await
            .unwrap();

        let history = stats.history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].id, first.id);

        let totals = stats.stats().await.unwrap();
        assert_eq!(totals.prompts_optimized, 2);
        assert_eq!(totals.prompts_applied, 1);
        assert_eq!(totals.characters_saved, 4 + 6);
        assert_eq!(totals.rules_applied.get("r1"), Some(&2));
        assert_eq!(totals.rules_applied.get("r2"), Some(&1));
    }

    #[tokio::test]
    async fn history_is_capped() {
        let stats = aggregator(3);
        for _ in 0..5 {
            stats
                .record(&result("ab", "a", &[]), "ab", Disposition::Optimized)
                .await
                .unwrap();
        }
        assert_eq!(stats.history().await.unwrap().len(), 3);
        assert_eq!(stats.stats().await.unwrap().prompts_optimized, 5);
    }

    #[tokio::test]
    async fn import_dedupes_by_id() {
        let stats = aggregator(100);
        assert_eq!(
            stats.import_history(vec![entry("a"), entry("b")]).await.unwrap(),
            2
        );
        assert_eq!(
            stats
                .import_history(vec![entry("b"), entry("c"), entry("c")])
                .await
                .unwrap(),
            1
        );
        let ids: Vec<_> = stats.history().await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn import_keeps_newest_within_cap() {
        let stats = aggregator(2);
        let dated = |id: &str, ts: &str| {
            serde_json::from_value::<HistoryEntry>(serde_json::json!({ "id": id, "timestamp": ts }))
                .unwrap()
        };
        let added = stats
            .import_history(vec![
                dated("old", "2025-01-01T00:00:00+00:00"),
                dated("new", "2025-03-01T00:00:00+00:00"),
                dated("mid", "2025-02-01T00:00:00+00:00"),
            ])
            .await
            .unwrap();
        assert_eq!(added, 3);
        let ids: Vec<_> = stats.history().await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }

    #[tokio::test]
    async fn export_then_import_into_fresh_store() {
        let source = aggregator(10);
        source
            .record(&result("hello world", "hello", &["x"]), "hello world", Disposition::Applied)
            .await
            .unwrap();
        let json = source.export_json().await.unwrap();

        let target = aggregator(10);
        assert_eq!(target.import_json(&json).await.unwrap(), 1);
        assert_eq!(target.history().await.unwrap(), source.history().await.unwrap());
        assert_eq!(target.import_json(&json).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn import_rejects_malformed_json() {
        let stats = aggregator(10);
        assert!(matches!(
            stats.import_json("{\"id\": 1}").await,
            Err(EngineError::Serialization(_))
        ));
        assert!(stats.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_resets_everything() {
        let stats = aggregator(10);
        stats
            .record(&result("ab", "a", &["r"]), "ab", Disposition::Optimized)
            .await
            .unwrap();
        stats.clear().await.unwrap();
        assert!(stats.history().await.unwrap().is_empty());
        assert_eq!(stats.stats().await.unwrap(), AggregateStats::default());
    }

    #[tokio::test]
    async fn failed_record_keeps_history_and_totals_in_step() {
        let flaky = FlakyStore::new();
        let stats = StatsAggregator::new(Arc::new(flaky.clone()), 10);
        stats
            .record(&result("abcd", "ab", &["r"]), "abcd", Disposition::Optimized)
            .await
            .unwrap();

        flaky.fail_writes_to(keys::TOTAL_STATS);
        assert!(stats
            .record(&result("abcd", "a", &["r"]), "abcd", Disposition::Applied)
            .await
            .is_err());

        assert_eq!(stats.history().await.unwrap().len(), 1);
        let totals = stats.stats().await.unwrap();
        assert_eq!(totals.prompts_optimized, 1);
        assert_eq!(totals.prompts_applied, 0);
    }
}
