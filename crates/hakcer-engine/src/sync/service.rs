use std::sync::Arc;
use std::time::Duration;

use hakcer_core::{CatalogVersionInfo, RuleVersion};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::SyncError;
use crate::manifest::Manifest;
use crate::rules::RuleStore;
use crate::sync::source::ManifestSource;

/// A successful refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshReport {
    pub version: RuleVersion,
    pub rules_count: usize,
    pub cached_at: Option<String>,
}

impl From<CatalogVersionInfo> for RefreshReport {
    fn from(info: CatalogVersionInfo) -> Self {
        Self {
            version: info.version,
            rules_count: info.rules_count,
            cached_at: info.cached_at,
        }
    }
}

/// Wire shape of a refresh result for UI callers.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RefreshOutcome {
    Success {
        success: bool,
        version: RuleVersion,
        #[serde(rename = "rulesCount")]
        rules_count: usize,
    },
    Failure {
        success: bool,
        error: String,
    },
}

impl From<&Result<RefreshReport, SyncError>> for RefreshOutcome {
    fn from(result: &Result<RefreshReport, SyncError>) -> Self {
        match result {
            Ok(report) => Self::Success {
                success: true,
                version: report.version.clone(),
                rules_count: report.rules_count,
            },
            Err(e) => Self::Failure {
                success: false,
                error: e.to_string(),
            },
        }
    }
}

/// Replaces the built-in rules with a newer remote manifest.
pub struct RemoteSync {
    source: Arc<dyn ManifestSource>,
    rules: Arc<RuleStore>,
    timeout: Duration,
}

impl RemoteSync {
    pub fn new(source: Arc<dyn ManifestSource>, rules: Arc<RuleStore>, timeout: Duration) -> Self {
        Self {
            source,
            rules,
            timeout,
        }
    }

    /// Fetch, validate and install the remote manifest.
    ///
    /// Any failure leaves the current catalog and its cache untouched.
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<RefreshReport, SyncError> {
        let source = self.source.describe();
        let result = self.try_refresh(cancel).await;
        match &result {
            Ok(report) => info!(
                source = %source,
                version = %report.version,
                rules = report.rules_count,
                "rule catalog refreshed"
            ),
            Err(e) => warn!(
                source = %source,
                kind = e.error_kind(),
                error = %e,
                "rule catalog refresh failed"
            ),
        }
        result
    }

    async fn try_refresh(&self, cancel: &CancellationToken) -> Result<RefreshReport, SyncError> {
        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            fetched = tokio::time::timeout(self.timeout, self.source.fetch()) => {
                fetched.map_err(|_| SyncError::Timeout(self.timeout))??
            }
        };

        let manifest = Manifest::parse(&body)?.validate(self.rules.compile_options())?;
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let info = self.rules.install_manifest(manifest).await?;
        Ok(info.into())
    }

    /// Version metadata of the catalog currently in use.
    pub fn last_update_info(&self) -> CatalogVersionInfo {
        self.rules.version_info()
    }
}
