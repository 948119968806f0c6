use std::sync::Arc;
use std::time::Duration;

use hakcer_core::{AnalysisResult, CompileOptions, ExecutionBudget, TokenEstimator};
use hakcer_settings::HakcerSettings;
use hakcer_store::KvStore;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::analyzer::Analyzer;
use crate::error::{EngineError, SyncError};
use crate::rules::RuleStore;
use crate::stats::{StatsAggregator, DEFAULT_MAX_ENTRIES};
use crate::sync::{
    HttpManifestSource, ManifestSource, RefreshReport, RefreshScheduler, RemoteSync,
    SchedulerConfig,
};

/// Tunables for one engine instance.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub compile: CompileOptions,
    pub budget: ExecutionBudget,
    pub estimator: TokenEstimator,
    pub history_max: usize,
    pub sync_timeout: Duration,
    pub scheduler: SchedulerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            compile: CompileOptions::default(),
            budget: ExecutionBudget::default(),
            estimator: TokenEstimator::default(),
            history_max: DEFAULT_MAX_ENTRIES,
            sync_timeout: Duration::from_secs(10),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_settings(settings: &HakcerSettings) -> Self {
        let analyzer = &settings.analyzer;
        Self {
            compile: CompileOptions {
                size_limit: analyzer.regex_size_limit,
            },
            budget: ExecutionBudget {
                max_elapsed: (analyzer.rule_budget_ms > 0)
                    .then(|| Duration::from_millis(analyzer.rule_budget_ms)),
                max_matches: analyzer.max_matches_per_rule,
            },
            estimator: TokenEstimator::new(analyzer.chars_per_token),
            history_max: settings.history.max_entries,
            sync_timeout: settings.sync.timeout(),
            scheduler: SchedulerConfig {
                refresh_interval: settings.sync.refresh_interval(),
                enabled: settings.sync.auto_refresh,
            },
        }
    }
}

/// Build the HTTP manifest source described by `settings`.
pub fn http_source(settings: &HakcerSettings) -> Result<Arc<dyn ManifestSource>, SyncError> {
    let source = HttpManifestSource::new(
        settings.sync.manifest_url.clone(),
        settings.sync.timeout(),
        settings.sync.max_manifest_bytes,
    )?;
    Ok(Arc::new(source))
}

/// Everything a surface needs: rules, analysis, refresh and history,
/// wired to one store.
pub struct Engine {
    store: Arc<dyn KvStore>,
    rules: Arc<RuleStore>,
    analyzer: Analyzer,
    sync: Arc<RemoteSync>,
    stats: StatsAggregator,
    scheduler: SchedulerConfig,
}

impl Engine {
    pub async fn open(
        store: Arc<dyn KvStore>,
        source: Arc<dyn ManifestSource>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let rules = Arc::new(RuleStore::load(Arc::clone(&store), config.compile).await?);
        let sync = Arc::new(RemoteSync::new(source, Arc::clone(&rules), config.sync_timeout));
        let stats = StatsAggregator::new(Arc::clone(&store), config.history_max);
        Ok(Self {
            store,
            rules,
            analyzer: Analyzer::new(config.budget, config.estimator),
            sync,
            stats,
            scheduler: config.scheduler,
        })
    }

    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    pub fn sync(&self) -> &RemoteSync {
        &self.sync
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// Analyze against the current catalog snapshot.
    pub fn analyze(&self, text: &str) -> AnalysisResult {
        self.analyzer.analyze(&self.rules.snapshot(), text)
    }

    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<RefreshReport, SyncError> {
        self.sync.refresh(cancel).await
    }

    /// Background refresher for this engine. Disabled unless configured.
    pub fn scheduler(&self) -> Arc<RefreshScheduler> {
        Arc::new(RefreshScheduler::new(
            Arc::clone(&self.sync),
            self.scheduler.clone(),
        ))
    }

    /// Wipe every persisted record and return to the bundled catalog.
    pub async fn reset_all(&self) -> Result<(), EngineError> {
        self.store.clear().await?;
        self.rules.reload().await?;
        info!("all data reset");
        Ok(())
    }
}
